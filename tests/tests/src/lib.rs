#[cfg(test)]
pub mod plugin_tests;
#[cfg(test)]
pub mod utils;

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static INIT: Once = Once::new();

#[cfg(test)]
fn init() {
    // ignore error
    INIT.call_once(|| {
        use lnspv_common::logger;

        logger::init("trace").expect("initializing logger for the first time");
    });
}
