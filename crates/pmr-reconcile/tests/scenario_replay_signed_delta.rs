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
fn scenario_buy_sell_buy_derives_expected_position() {
    // BUY 10 YES, SELL 3 YES, BUY 5 NO => {yes: 7, no: 5}
    let trades = vec![
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::Yes, 10, 1, 1),
        trade("0xm1", "0xw1", TradeAction::Sell, OutcomeSide::Yes, 3, 2, 2),
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::No, 5, 3, 3),
    ];

    let positions = replay(trades);
    assert_eq!(positions.len(), 1);

    let state = &positions[&PositionKey::new("0xm1", "0xw1")];
    assert_eq!(state.yes_shares, BigInt::from(7));
    assert_eq!(state.no_shares, BigInt::from(5));
}

#[test]
fn scenario_net_zero_law() {
    let trades = vec![
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::Yes, 42, 1, 1),
        trade("0xm1", "0xw1", TradeAction::Sell, OutcomeSide::Yes, 42, 2, 2),
    ];

    let positions = replay(trades);
    let state = &positions[&PositionKey::new("0xm1", "0xw1")];
    assert_eq!(state.yes_shares, BigInt::from(0));
    assert_eq!(state.no_shares, BigInt::from(0));
}

#[test]
fn scenario_oversold_ledger_derives_negative_balance() {
    // Balances are signed; the engine reports what the ledger says, it does
    // not clamp.
    let trades = vec![
        trade("0xm1", "0xw1", TradeAction::Sell, OutcomeSide::No, 9, 1, 1),
        trade("0xm1", "0xw1", TradeAction::Buy, OutcomeSide::No, 4, 2, 2),
    ];

    let positions = replay(trades);
    let state = &positions[&PositionKey::new("0xm1", "0xw1")];
    assert_eq!(state.no_shares, BigInt::from(-5));
}

#[test]
fn scenario_large_amounts_stay_exact() {
    // 2^200 shares round-trips without precision loss.
    let big = BigUint::from(2u32).pow(200);
    let trades = vec![TradeRecord {
        market_address: "0xm1".to_string(),
        wallet_address: "0xw1".to_string(),
        action: TradeAction::Buy,
        side: OutcomeSide::Yes,
        amount: big.clone(),
        block_number: 1,
        insertion_id: 1,
    }];

    let positions = replay(trades);
    let state = &positions[&PositionKey::new("0xm1", "0xw1")];
    assert_eq!(state.yes_shares, BigInt::from(big));
}
