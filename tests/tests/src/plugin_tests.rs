//! The backend plugin driven like the host drives it.
use std::sync::Arc;

use ntest::timeout;

use lnspv_common::backend::{Amount, OutPoint, ScriptBuf, TxOut};
use lnspv_common::bitcoin::consensus::encode::serialize_hex;
use lnspv_common::json;
use lnspv_common::jsonrpc::{INVALID_PARAMS, METHOD_NOT_FOUND, NOT_INITIALIZED};
use lnspv_common::model::response;
use lnspv_common::model::{ChainInfo, EstimatedFees};
use lnspv_testing::{chain, raw_transaction_hex, unknown_txid, MockChainClient};
use lnspvd::jsonrpc::{PluginState, METHODS};

use crate::init;
use crate::utils::{call, fee_oracle, init_plugin, FEE_ESTIMATES};

fn p2wpkh() -> ScriptBuf {
    let mut script = vec![0x00, 0x14];
    script.extend_from_slice(&[0x42; 20]);
    ScriptBuf::from_bytes(script)
}

#[test]
#[timeout(10000)]
fn serve_the_backend_methods() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let oracle = fee_oracle(&mut server, 200, FEE_ESTIMATES);

    let outpoint = OutPoint::new(unknown_txid(), 1);
    let client = Arc::new(
        MockChainClient::new(chain(6))
            .with_best_height(4)
            .with_utxo(
                outpoint,
                TxOut {
                    value: Amount::from_sat(250_000),
                    script_pubkey: p2wpkh(),
                },
            ),
    );
    let mut state = PluginState::default();
    init_plugin(&mut state, client.clone(), dir.path(), &server.url(), "testnet").unwrap();
    assert!(state.is_initialized());
    assert_eq!(METHODS.len(), 6);

    let info = call(&state, "getchaininfo", json::json!({"last_height": 3})).unwrap();
    let info: ChainInfo = json::from_value(info).unwrap();
    assert_eq!(
        info,
        ChainInfo {
            chain: "test".to_owned(),
            header_count: 5,
            block_count: 4,
            ibd: false,
        }
    );

    let utxo = call(
        &state,
        "getutxout",
        json::json!({"txid": unknown_txid().to_string(), "vout": 1}),
    )
    .unwrap();
    let utxo: response::UtxOut = json::from_value(utxo).unwrap();
    assert_eq!(utxo.amount, "250000000");
    assert_eq!(utxo.script, format!("0014{}", "42".repeat(20)));

    let block = call(&state, "getrawblockbyheight", json::json!({"height": 2})).unwrap();
    let block: response::RawBlock = json::from_value(block).unwrap();
    let expected = client.block(2).unwrap();
    assert_eq!(block.block_hash, expected.block_hash().to_string());
    assert_eq!(block.block, serialize_hex(&expected));

    let fees = call(&state, "estimatefees", json::json!([])).unwrap();
    let fees: EstimatedFees = json::from_value(fees).unwrap();
    oracle.assert();
    assert_eq!(
        fees,
        EstimatedFees {
            opening: 12_000,
            mutual_close: 12_000,
            unilateral_close: 30_500,
            delayed_to_us: 12_000,
            htlc_resolution: 20_250,
            penalty: 20_250,
            min_acceptable: 1_012,
            max_acceptable: 30_500,
        }
    );

    let feerate = call(
        &state,
        "getfeerate",
        json::json!({"blocks": 6, "mode": "CONSERVATIVE"}),
    )
    .unwrap();
    assert_eq!(feerate, json::json!({"feerate": 0}));

    let sent = call(
        &state,
        "sendrawtransaction",
        json::json!({"tx": raw_transaction_hex(), "allowhighfees": false}),
    )
    .unwrap();
    let sent: response::SendRawTransaction = json::from_value(sent).unwrap();
    assert!(sent.success, "{}", sent.errmsg);
    assert_eq!(client.broadcasted().len(), 1);
}

#[test]
#[timeout(10000)]
fn nothing_is_served_before_init() {
    init();
    let client = Arc::new(MockChainClient::default());
    let state = PluginState::default();
    for method in ["getchaininfo", "estimatefees"] {
        let err = call(&state, method, json::json!({})).unwrap_err();
        assert_eq!(err.code, NOT_INITIALIZED);
    }
    assert!(client.calls().is_empty());
}

#[test]
#[timeout(10000)]
fn unsupported_network_stops_the_plugin() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockChainClient::default());
    let mut state = PluginState::default();
    let err = init_plugin(&mut state, client.clone(), dir.path(), "blockstream.info", "regtest")
        .unwrap_err();
    assert_eq!(err.code, -1);
    assert!(err.message.contains("unsupported network: regtest"), "{}", err.message);
    assert!(!state.is_initialized());
    assert!(client.calls().is_empty());

    let err = call(&state, "getchaininfo", json::json!({})).unwrap_err();
    assert_eq!(err.code, NOT_INITIALIZED);
}

#[test]
#[timeout(10000)]
fn fee_api_is_required() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockChainClient::default());
    let mut state = PluginState::default();
    let err = init_plugin(&mut state, client.clone(), dir.path(), "", "bitcoin").unwrap_err();
    assert_eq!(err.code, -1);
    assert!(client.calls().is_empty());
}

#[test]
#[timeout(10000)]
fn no_peers_is_reported_to_the_host() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockChainClient::default().with_peers_after(None));
    let mut state = PluginState::default();
    let err = init_plugin(&mut state, client.clone(), dir.path(), "blockstream.info", "testnet")
        .unwrap_err();
    assert_eq!(err.code, -6);
    assert_eq!(err.message, "could not find peers after 60 attempts");
    assert_eq!(client.peer_polls(), 60);
    assert_eq!(client.current_polls(), 0);
    assert!(!state.is_initialized());
}

#[test]
#[timeout(10000)]
fn init_waits_for_the_chain_to_be_current() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(
        MockChainClient::default()
            .with_peers_after(Some(4))
            .with_current_after(Some(10)),
    );
    let mut state = PluginState::default();
    init_plugin(&mut state, client.clone(), dir.path(), "blockstream.info", "testnet").unwrap();
    assert_eq!(client.peer_polls(), 5);
    // ten polls behind the network, then the one that saw it current
    assert_eq!(client.current_polls(), 11);

    let info = call(&state, "getchaininfo", json::json!({})).unwrap();
    assert_eq!(client.current_polls(), 12);
    let info: ChainInfo = json::from_value(info).unwrap();
    assert!(!info.ibd);
}

#[test]
#[timeout(10000)]
fn query_errors_keep_the_plugin_alive() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockChainClient::new(chain(3)));
    let mut state = PluginState::default();
    init_plugin(&mut state, client.clone(), dir.path(), "blockstream.info", "testnet").unwrap();

    let requests = [
        ("getutxout", json::json!({"txid": "not-a-txid", "vout": 0})),
        ("getutxout", json::json!({"txid": unknown_txid().to_string(), "vout": 0})),
        ("getrawblockbyheight", json::json!({"height": 3})),
        ("getrawblockbyheight", json::json!({"height": "three"})),
        ("getblockcount", json::json!({})),
    ];
    let codes: Vec<_> = requests
        .into_iter()
        .map(|(method, params)| call(&state, method, params).unwrap_err().code)
        .collect();
    assert_eq!(codes, [-2, -3, -3, INVALID_PARAMS, METHOD_NOT_FOUND]);
    assert!(call(&state, "getchaininfo", json::json!({})).is_ok());
    // the malformed txid never reached the chain client
    assert_eq!(client.call_count("get_utxo"), 1);
}

#[test]
#[timeout(10000)]
fn refused_transactions_are_not_errors() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockChainClient::default());
    let mut state = PluginState::default();
    init_plugin(&mut state, client.clone(), dir.path(), "blockstream.info", "testnet").unwrap();

    let sent = call(&state, "sendrawtransaction", json::json!({"tx": "0200zz"})).unwrap();
    let sent: response::SendRawTransaction = json::from_value(sent).unwrap();
    assert!(!sent.success);
    assert!(sent.errmsg.starts_with("invalid input"), "{}", sent.errmsg);
    assert!(client.broadcasted().is_empty());
}

#[test]
#[timeout(10000)]
fn fee_oracle_failures() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let _oracle = fee_oracle(&mut server, 200, r#"{"2": 10.0, "3": "fast"}"#);

    let mut state = PluginState::default();
    let client = Arc::new(MockChainClient::default());
    init_plugin(&mut state, client, dir.path(), &server.url(), "testnet").unwrap();
    let err = call(&state, "estimatefees", json::json!({})).unwrap_err();
    assert_eq!(err.code, -5);
    assert!(err.message.contains("`5` is missing"), "{}", err.message);
    assert!(err.message.contains("`144` is missing"), "{}", err.message);

    let mut server = mockito::Server::new();
    let _oracle = fee_oracle(&mut server, 500, "");
    let mut state = PluginState::default();
    let client = Arc::new(MockChainClient::default());
    init_plugin(&mut state, client, dir.path(), &server.url(), "testnet").unwrap();
    let err = call(&state, "estimatefees", json::json!({})).unwrap_err();
    assert_eq!(err.code, -4);
}
