use num_bigint::{BigInt, BigUint};
use pmr_reconcile::*;

fn trade(
    market: &str,
    wallet: &str,
    action: TradeAction,
    side: OutcomeSide,
    amount: u64,
    block_number: i64,
    insertion_id: i64,
) -> TradeRecord {
    TradeRecord {
        market_address: market.to_string(),
        wallet_address: wallet.to_string(),
        action,
        side,
        amount: BigUint::from(amount),
        block_number,
        insertion_id,
    }
}

#[test]
fn scenario_replay_twice_is_identical() {
    let trades = vec![
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::Yes, 10, 5, 1),
        trade("0xm2", "0xw1", TradeAction::Buy, OutcomeSide::No, 3, 5, 2),
        trade("0xm1", "0xw2", TradeAction::Sell, OutcomeSide::Yes, 4, 6, 3),
    ];

    assert_eq!(replay(trades.clone()), replay(trades));
}

#[test]
fn scenario_storage_arrival_order_is_irrelevant() {
    // Same multiset presented in a different vec order: replay sorts by the
    // explicit (block_number, insertion_id) key, so the result is identical.
    let ordered = vec![
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::Yes, 10, 1, 1),
        trade("0xm1", "0xw1", TradeAction::Sell, OutcomeSide::Yes, 3, 2, 2),
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::No, 5, 3, 3),
    ];
    let mut shuffled = ordered.clone();
    shuffled.reverse();

    assert_eq!(replay(ordered), replay(shuffled));
}

#[test]
fn scenario_key_isolation() {
    // Trades on (M1,W1) never leak into (M2,W1) or (M1,W2).
    let trades = vec![
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::Yes, 100, 1, 1),
        trade("0xm2", "0xw1", TradeAction::Buy, OutcomeSide::Yes, 7, 2, 2),
        trade("0xm1", "0xw2", TradeAction::Buy, OutcomeSide::Yes, 1, 3, 3),
    ];

    let positions = replay(trades);
    assert_eq!(positions.len(), 3);
    assert_eq!(
        positions[&PositionKey::new("0xm1", "0xw1")].yes_shares,
        BigInt::from(100)
    );
    assert_eq!(
        positions[&PositionKey::new("0xm2", "0xw1")].yes_shares,
        BigInt::from(7)
    );
    assert_eq!(
        positions[&PositionKey::new("0xm1", "0xw2")].yes_shares,
        BigInt::from(1)
    );
}

#[test]
fn scenario_mixed_case_addresses_fold_into_one_position() {
    let trades = vec![
        trade("0xAbCd", "0xEf01", TradeAction::Buy, OutcomeSide::Yes, 6, 1, 1),
        trade("0xabcd", "0xEF01", TradeAction::Buy, OutcomeSide::Yes, 4, 2, 2),
    ];

    let positions = replay(trades);
    assert_eq!(positions.len(), 1);
    assert_eq!(
        positions[&PositionKey::new("0xabcd", "0xef01")].yes_shares,
        BigInt::from(10)
    );
}

#[test]
fn scenario_empty_ledger_derives_empty_map() {
    assert!(replay(Vec::new()).is_empty());
}
