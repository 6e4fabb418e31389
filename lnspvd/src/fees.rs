//! Fee estimation through an Esplora compatible fee oracle.
//!
//! The oracle answers `GET {api}/fee-estimates` with an object mapping
//! a confirmation target (in blocks) to a fee rate in sat/vB, e.g.
//! `{"2": 20.1, "3": 18.0, "5": 12.5, "144": 1.0}`. Only four buckets
//! are used, every other key is ignored.
use std::fmt;

use reqwest::blocking::Client;

use lnspv_common::conf::SpvConf;
use lnspv_common::error::{self, BackendError, BackendResult};
use lnspv_common::json;
use lnspv_common::model::EstimatedFees;

/// Confirmation targets the fee purposes are derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    Slow,
    Normal,
    Urgent,
    VeryUrgent,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [
        Urgency::Slow,
        Urgency::Normal,
        Urgency::Urgent,
        Urgency::VeryUrgent,
    ];

    /// Key of the bucket inside the oracle answer.
    pub fn target(&self) -> &'static str {
        match self {
            Urgency::Slow => "144",
            Urgency::Normal => "5",
            Urgency::Urgent => "3",
            Urgency::VeryUrgent => "2",
        }
    }
}

/// What the lightning node is going to pay the fee for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeePurpose {
    Opening,
    MutualClose,
    UnilateralClose,
    DelayedToUs,
    HtlcResolution,
    Penalty,
    MinAcceptable,
    MaxAcceptable,
}

impl FeePurpose {
    pub fn urgency(&self) -> Urgency {
        match self {
            FeePurpose::Opening | FeePurpose::MutualClose | FeePurpose::DelayedToUs => {
                Urgency::Normal
            }
            FeePurpose::HtlcResolution | FeePurpose::Penalty => Urgency::Urgent,
            FeePurpose::UnilateralClose | FeePurpose::MaxAcceptable => Urgency::VeryUrgent,
            FeePurpose::MinAcceptable => Urgency::Slow,
        }
    }
}

/// The four oracle buckets, already converted to sat/kvB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeBuckets {
    pub slow: u64,
    pub normal: u64,
    pub urgent: u64,
    pub very_urgent: u64,
}

impl FeeBuckets {
    /// Validate the oracle answer, every bucket is checked before any
    /// of them is used and all the problems are reported together.
    pub fn parse(value: &json::Value) -> BackendResult<Self> {
        let Some(buckets) = value.as_object() else {
            return Err(BackendError::Parse(error::anyhow!(
                "expected a JSON object, got `{value}`"
            )));
        };
        let mut rates = [0u64; 4];
        let mut problems = Vec::new();
        for (idx, urgency) in Urgency::ALL.iter().enumerate() {
            let key = urgency.target();
            match buckets.get(key) {
                None => problems.push(format!("`{key}` is missing")),
                Some(rate) => match rate.as_f64() {
                    Some(rate) if rate.is_finite() && rate >= 0.0 => {
                        // sat/vB -> sat/kvB, the fraction of sat is dropped
                        rates[idx] = (rate * 1000.0) as u64;
                    }
                    _ => problems.push(format!("`{key}` is not a valid fee rate: {rate}")),
                },
            }
        }
        if !problems.is_empty() {
            return Err(BackendError::Parse(error::anyhow!(
                "invalid fee estimates: {}",
                problems.join(", ")
            )));
        }
        let [slow, normal, urgent, very_urgent] = rates;
        Ok(Self {
            slow,
            normal,
            urgent,
            very_urgent,
        })
    }

    pub fn rate(&self, urgency: Urgency) -> u64 {
        match urgency {
            Urgency::Slow => self.slow,
            Urgency::Normal => self.normal,
            Urgency::Urgent => self.urgent,
            Urgency::VeryUrgent => self.very_urgent,
        }
    }

    pub fn fee_for(&self, purpose: FeePurpose) -> u64 {
        self.rate(purpose.urgency())
    }
}

impl From<FeeBuckets> for EstimatedFees {
    fn from(buckets: FeeBuckets) -> Self {
        EstimatedFees {
            opening: buckets.fee_for(FeePurpose::Opening),
            mutual_close: buckets.fee_for(FeePurpose::MutualClose),
            unilateral_close: buckets.fee_for(FeePurpose::UnilateralClose),
            delayed_to_us: buckets.fee_for(FeePurpose::DelayedToUs),
            htlc_resolution: buckets.fee_for(FeePurpose::HtlcResolution),
            penalty: buckets.fee_for(FeePurpose::Penalty),
            min_acceptable: buckets.fee_for(FeePurpose::MinAcceptable),
            max_acceptable: buckets.fee_for(FeePurpose::MaxAcceptable),
        }
    }
}

/// HTTP client of the fee oracle. Nothing is cached, every estimation
/// hits the oracle.
pub struct FeeOracle {
    url: String,
    client: Client,
}

impl fmt::Debug for FeeOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeeOracle").field("url", &self.url).finish()
    }
}

impl FeeOracle {
    pub fn new(conf: &SpvConf) -> BackendResult<Self> {
        if conf.fee_api.is_empty() {
            return Err(BackendError::Configuration(error::anyhow!(
                "must include an Esplora fee API host"
            )));
        }
        let client = Client::builder()
            .build()
            .map_err(|err| BackendError::Configuration(error::anyhow!("{err}")))?;
        Ok(Self {
            url: format!("{}/fee-estimates", conf.fee_api_url()),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fetch(&self) -> BackendResult<FeeBuckets> {
        log::debug!(target: "fees", "fetching fee estimates from `{}`", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| {
                BackendError::Remote(error::anyhow!("could not fetch fee API: {err}"))
            })?;
        let body = response.text().map_err(|err| {
            BackendError::Remote(error::anyhow!("could not read API results: {err}"))
        })?;
        let value: json::Value = json::from_str(&body).map_err(|err| {
            BackendError::Parse(error::anyhow!("invalid result json format: {err}"))
        })?;
        let buckets = FeeBuckets::parse(&value)?;
        log::trace!(target: "fees", "fee buckets {:?}", buckets);
        Ok(buckets)
    }

    pub fn estimate_fees(&self) -> BackendResult<EstimatedFees> {
        Ok(self.fetch()?.into())
    }
}

#[cfg(test)]
mod tests {
    use lnspv_common::json::json;

    use super::*;

    fn conf(host: &str) -> SpvConf {
        let dir = tempfile::tempdir().unwrap();
        SpvConf::new("testnet", &dir.path().to_string_lossy(), host).unwrap()
    }

    #[test]
    fn purposes_follow_their_bucket() {
        let buckets = FeeBuckets {
            slow: 1_000,
            normal: 5_000,
            urgent: 10_000,
            very_urgent: 20_000,
        };
        let fees: EstimatedFees = buckets.into();
        assert_eq!(
            fees,
            EstimatedFees {
                opening: 5_000,
                mutual_close: 5_000,
                unilateral_close: 20_000,
                delayed_to_us: 5_000,
                htlc_resolution: 10_000,
                penalty: 10_000,
                min_acceptable: 1_000,
                max_acceptable: 20_000,
            }
        );
    }

    #[test]
    fn monotonic_buckets_give_ordered_fees() {
        let samples = [
            (1.0, 1.0, 1.0, 1.0),
            (1.0, 2.5, 7.25, 30.0),
            (0.0, 0.0, 3.0, 3.0),
            (12.0, 12.5, 13.0, 150.0),
        ];
        for (slow, normal, urgent, very_urgent) in samples {
            let value = json!({
                "1": very_urgent * 2.0,
                "2": very_urgent,
                "3": urgent,
                "5": normal,
                "144": slow,
                "1008": slow / 2.0,
            });
            let fees: EstimatedFees = FeeBuckets::parse(&value).unwrap().into();
            assert!(fees.min_acceptable <= fees.opening);
            assert!(fees.opening == fees.mutual_close && fees.mutual_close == fees.delayed_to_us);
            assert!(fees.delayed_to_us <= fees.htlc_resolution);
            assert_eq!(fees.htlc_resolution, fees.penalty);
            assert!(fees.htlc_resolution <= fees.max_acceptable);
            assert_eq!(fees.unilateral_close, fees.max_acceptable);
        }
    }

    #[test]
    fn rates_are_converted_to_kvb() {
        let value = json!({"2": 20.5, "3": 10, "5": 3.25, "144": 1.5});
        let buckets = FeeBuckets::parse(&value).unwrap();
        assert_eq!(buckets.very_urgent, 20_500);
        assert_eq!(buckets.urgent, 10_000);
        assert_eq!(buckets.normal, 3_250);
        assert_eq!(buckets.slow, 1_500);
    }

    #[test]
    fn fractions_of_sat_are_truncated() {
        let value = json!({"2": 2.0009, "3": 1.0005, "5": 1.9999, "144": 0.2539});
        let buckets = FeeBuckets::parse(&value).unwrap();
        assert_eq!(buckets.very_urgent, 2_000);
        assert_eq!(buckets.urgent, 1_000);
        assert_eq!(buckets.normal, 1_999);
        assert_eq!(buckets.slow, 253);
    }

    #[test]
    fn every_bad_bucket_is_reported() {
        let value = json!({"2": "fast", "3": null, "144": -1.0});
        let err = FeeBuckets::parse(&value).unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)), "{err}");
        let msg = err.to_string();
        assert!(msg.contains("`2` is not a valid fee rate"), "{msg}");
        assert!(msg.contains("`3` is not a valid fee rate"), "{msg}");
        assert!(msg.contains("`5` is missing"), "{msg}");
        assert!(msg.contains("`144` is not a valid fee rate"), "{msg}");
    }

    #[test]
    fn not_an_object() {
        let err = FeeBuckets::parse(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn oracle_needs_a_host() {
        let err = FeeOracle::new(&SpvConf::default()).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[test]
    fn oracle_url_per_network() {
        let oracle = FeeOracle::new(&conf("blockstream.info")).unwrap();
        assert_eq!(
            oracle.url(),
            "https://blockstream.info/testnet/api/fee-estimates"
        );
    }

    #[test]
    fn every_estimate_hits_the_oracle() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/testnet/api/fee-estimates")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"1": 30.2, "2": 25.0, "3": 18.5, "5": 10.0, "144": 1.5}"#)
            .expect(2)
            .create();

        let oracle = FeeOracle::new(&conf(&server.url())).unwrap();
        let first = oracle.estimate_fees().unwrap();
        let second = oracle.estimate_fees().unwrap();
        mock.assert();
        assert_eq!(first, second);
        assert_eq!(first.opening, 10_000);
        assert_eq!(first.unilateral_close, 25_000);
        assert_eq!(first.penalty, 18_500);
        assert_eq!(first.min_acceptable, 1_500);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/testnet/api/fee-estimates")
            .with_status(200)
            .with_body("{not json")
            .create();

        let oracle = FeeOracle::new(&conf(&server.url())).unwrap();
        let err = oracle.estimate_fees().unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)), "{err}");
    }

    #[test]
    fn missing_bucket_is_a_parse_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/testnet/api/fee-estimates")
            .with_status(200)
            .with_body(r#"{"2": 25.0, "3": 18.5, "5": 10.0}"#)
            .create();

        let oracle = FeeOracle::new(&conf(&server.url())).unwrap();
        let err = oracle.estimate_fees().unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)), "{err}");
        assert!(err.to_string().contains("`144` is missing"));
    }

    #[test]
    fn server_error_is_a_remote_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/testnet/api/fee-estimates")
            .with_status(503)
            .create();

        let oracle = FeeOracle::new(&conf(&server.url())).unwrap();
        assert!(matches!(
            oracle.estimate_fees(),
            Err(BackendError::Remote(_))
        ));
    }

    #[test]
    fn unreachable_oracle_is_a_remote_error() {
        // nothing listens on the discard port
        let oracle = FeeOracle::new(&conf("http://127.0.0.1:9")).unwrap();
        assert!(matches!(
            oracle.estimate_fees(),
            Err(BackendError::Remote(_))
        ));
    }
}
