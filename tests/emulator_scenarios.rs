use plutus_orders_rs::config::Config;
use plutus_orders_rs::ledger::{Ledger, UtxoSource};
use plutus_orders_rs::models::{LimitOrderDatum, OrderKind, Redeemer, Token, TxOutput, Value};
use plutus_orders_rs::scenarios::{self, Harness, SCENARIOS};
use plutus_orders_rs::strategy::limit_order;
use plutus_orders_rs::{SettlementError, TxBuilder};

const START_MS: u64 = 1_700_000_000_000;

fn config() -> Config {
    Config {
        emulator_start_ms: Some(START_MS),
        ..Config::default()
    }
}

fn settlement_error(e: &anyhow::Error) -> &SettlementError {
    e.downcast_ref::<SettlementError>()
        .unwrap_or_else(|| panic!("expected a settlement error, got {:#}", e))
}

#[tokio::test]
async fn test_every_scenario_settles() {
    for name in SCENARIOS {
        let steps = scenarios::run(name, &config(), None)
            .await
            .unwrap_or_else(|e| panic!("{} failed: {:#}", name, e));
        assert!(!steps.is_empty(), "{} submitted nothing", name);
        for step in &steps {
            assert_eq!(step.tx_hash.len(), 64);
            assert!(step.record.fees > 0);
        }
    }
}

#[tokio::test]
async fn test_unknown_scenario() {
    assert!(scenarios::run("nope", &config(), None).await.is_err());
}

#[tokio::test]
async fn test_limit_order_moves_assets_between_owner_and_filler() {
    let steps = scenarios::run("limit_order", &config(), None).await.unwrap();
    // mint, place, partial fill, final fill
    assert_eq!(steps.len(), 4);
    let partial = &steps[2].record;
    assert_eq!(partial.details.redeemers.len(), 1);
    assert!(matches!(
        partial.details.redeemers[0].redeemer,
        Redeemer::LimitFill { partial: true, .. }
    ));
    let bob = &partial.balance["Bob"];
    assert!(bob.iter().any(|d| d.asset.ends_with("50495a414441") && d.value == 20));
}

#[tokio::test]
async fn test_double_spend_is_rejected() {
    let mut h = Harness::new(&config(), None).unwrap();
    let alice = h.alice.clone();
    let wallet = h.utxos(&alice).await.unwrap();

    let pay = TxOutput::new(&h.bob.address, Value::lovelace(5_000_000));
    let builder = TxBuilder::new().spend(&wallet).pay(pay.clone());
    h.submit("first", builder, &alice, &[&alice]).await.unwrap();

    let replay = TxBuilder::new().spend(&wallet).pay(pay);
    let err = h.submit("replay", replay, &alice, &[&alice]).await.unwrap_err();
    let err = settlement_error(&err);
    assert!(matches!(err, SettlementError::ValidationRejected(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_witness_is_rejected() {
    let mut h = Harness::new(&config(), None).unwrap();
    let (alice, bob) = (h.alice.clone(), h.bob.clone());
    let builder = TxBuilder::new().spend(&h.utxos(&alice).await.unwrap());
    let err = h.submit("unsigned", builder, &alice, &[&bob]).await.unwrap_err();
    assert!(matches!(
        settlement_error(&err),
        SettlementError::ValidationRejected(_)
    ));
}

#[tokio::test]
async fn test_wrong_input_index_leaves_ledger_untouched() {
    let mut h = Harness::new(&config(), None).unwrap();
    let pizada = h.mint_pizada(100).await.unwrap();
    let script = h.script(OrderKind::LimitOrder.validator_title());
    let address = h.address_of(&script, "LimitOrderContract").unwrap();
    let (alice, bob) = (h.alice.clone(), h.bob.clone());

    let datum = LimitOrderDatum {
        owner: alice.key_hash.clone(),
        sell_asset: pizada,
        buy_asset: Token::Lovelace,
        sell_amount: 42,
        buy_amount: 420_000_000,
        from_utxo: None,
    };
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await.unwrap())
        .pay(limit_order::place(&address, datum).unwrap());
    h.submit("place", builder, &alice, &[&alice]).await.unwrap();

    let order = h.utxos_at(&address).await.unwrap().remove(0);
    let wallet = h.utxos(&bob).await.unwrap();
    let settlement = limit_order::settle(&order, 42, false, &h.fill_context(&wallet, 0)).unwrap();
    let (mut tx, _) = TxBuilder::new()
        .spend(&wallet)
        .settle(settlement)
        .unwrap()
        .complete(&bob.address)
        .unwrap();

    let claimed = tx.script_spends[0].redeemer.index_input().unwrap();
    tx.script_spends[0].redeemer = Redeemer::LimitFill {
        index_input: (claimed + 1) % tx.inputs.len() as u64,
        index_output: 0,
        partial: false,
    };

    let before = h.ledger.utxo_count().await;
    let bob_before = h.utxos(&bob).await.unwrap();
    let err = h.ledger.submit(&tx, &bob.witness()).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationRejected(_)));
    assert_eq!(h.ledger.utxo_count().await, before);
    assert_eq!(h.utxos(&bob).await.unwrap(), bob_before);
    assert_eq!(h.ledger.utxos_at(&address).await.unwrap(), vec![order]);
}

#[tokio::test]
async fn test_sliding_order_pays_for_the_validity_window() {
    let steps = scenarios::run("sliding_order", &config(), None).await.unwrap();
    let fill = &steps.last().unwrap().record;
    let alice = &fill.balance["Alice"];
    let lovelace = alice
        .iter()
        .find(|d| d.asset == "lovelace")
        .map(|d| d.value)
        .unwrap();
    // one block of twenty seconds off 420 ada, ten more for the validity
    // window, plus the order's own min-ada deposit
    assert_eq!(lovelace, 412_000_000);
}
