//! Integration tests for strategy reports: profit locking, fees and refunds.

mod common;

use common::*;
use strata_contracts::Fee;
use strata_protocol::config::{MAX_PROFIT_UNLOCK_TIME, SECS_PER_WEEK, SECS_PER_YEAR};
use strata_protocol::{VaultError, VaultEvent};

fn last_report(h: &Harness) -> VaultEvent {
    h.vault
        .events()
        .iter()
        .rev()
        .find(|e| matches!(e, VaultEvent::StrategyReported { .. }))
        .cloned()
        .expect("a StrategyReported event")
}

// ---------------------------------------------------------------------------
// Profit unlocking
// ---------------------------------------------------------------------------

#[test]
fn profit_unlocks_linearly_over_the_window() {
    let mut h = harness();
    let alice = user("alice");
    let shares = h.deposit(&alice, 1_000 * WAD);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000 * WAD);

    s.simulate_gain(100 * WAD).unwrap();
    assert_eq!(h.report(&s), (100 * WAD, 0));
    assert_eq!(h.pps(), WAD);
    assert_eq!(h.vault.total_assets(), 1_100 * WAD);
    assert_eq!(h.vault.balance_of(&h.vault.address()), 100 * WAD);
    assert_eq!(h.vault.full_profit_unlock_date(), GENESIS + SECS_PER_WEEK);

    h.clock.advance(SECS_PER_WEEK / 2);
    let halfway = h.pps();
    assert!(halfway > WAD && halfway < WAD + WAD / 10);
    // 1100 / 1050 to within rounding of the unlock rate.
    let expected = 1_100 * WAD / 1_050;
    assert!(halfway.abs_diff(expected) <= 1_000);

    h.clock.advance(SECS_PER_WEEK / 2);
    assert_eq!(h.pps(), WAD + WAD / 10);
    assert_eq!(h.vault.unlocked_shares(), 100 * WAD);
    assert_eq!(h.vault.total_supply(), 1_000 * WAD);

    h.allocate(&s, 0);
    let paid = h.vault.redeem(&alice, shares, &alice, &alice).unwrap();
    assert_eq!(paid, 1_100 * WAD);
    assert_eq!(h.vault.total_supply(), 0);
    assert_eq!(h.vault.total_assets(), 0);
    h.assert_books_balance();
}

#[test]
fn depositing_right_before_a_report_does_not_capture_it() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    let alice = user("alice");
    let bob = user("bob");
    h.deposit(&alice, 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);
    s.simulate_gain(100).unwrap();

    let bob_shares = h.deposit(&bob, 1_000);
    h.report(&s);
    // Redeeming straight away returns what bob put in.
    assert_eq!(h.vault.redeem(&bob, bob_shares, &bob, &bob).unwrap(), 1_000);
}

#[test]
fn another_report_restarts_the_window() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);

    s.simulate_gain(100).unwrap();
    h.report(&s);
    h.clock.advance(SECS_PER_WEEK / 2);

    s.simulate_gain(10).unwrap();
    assert_eq!(h.report(&s), (10, 0));
    let now = GENESIS + SECS_PER_WEEK / 2;
    assert_eq!(h.vault.full_profit_unlock_date(), now + SECS_PER_WEEK);
    assert_eq!(h.vault.last_profit_update(), now);
    assert!(h.vault.profit_unlocking_rate() > 0);
    assert_eq!(h.vault.strategies(&strategy_address(&s)).last_report, now);
}

#[test]
fn zero_unlock_time_releases_the_buffer() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);
    s.simulate_gain(100).unwrap();
    h.report(&s);
    assert_eq!(h.pps(), h.unit());

    h.vault.set_profit_max_unlock_time(&h.gov, 0).unwrap();
    assert_eq!(h.vault.balance_of(&h.vault.address()), 0);
    assert_eq!(h.vault.profit_unlocking_rate(), 0);
    assert_eq!(h.vault.full_profit_unlock_date(), 0);
    assert_eq!(h.pps(), h.unit() * 11 / 10);
}

#[test]
fn unlock_time_is_bounded_by_a_year() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    assert_eq!(
        h.vault
            .set_profit_max_unlock_time(&h.gov, MAX_PROFIT_UNLOCK_TIME + 1),
        Err(VaultError::ProfitUnlockTimeTooLong)
    );
    h.vault
        .set_profit_max_unlock_time(&h.gov, MAX_PROFIT_UNLOCK_TIME)
        .unwrap();
    assert_eq!(h.vault.profit_max_unlock_time(), MAX_PROFIT_UNLOCK_TIME);
}

#[test]
fn without_an_unlock_window_profit_is_immediate() {
    let mut h = harness_with(6, 0);
    h.deposit(&user("alice"), 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);
    s.simulate_gain(100).unwrap();
    h.report(&s);

    assert_eq!(h.pps(), h.unit() * 11 / 10);
    assert_eq!(h.vault.balance_of(&h.vault.address()), 0);
    assert_eq!(h.vault.full_profit_unlock_date(), 0);
}

#[test]
fn losses_are_absorbed_by_the_buffer_first() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);
    s.simulate_gain(100).unwrap();
    h.report(&s);

    s.simulate_loss(60).unwrap();
    assert_eq!(h.report(&s), (0, 60));
    assert_eq!(h.pps(), h.unit());
    assert_eq!(h.vault.balance_of(&h.vault.address()), 40);

    // Beyond the buffer the loss reaches holders.
    s.simulate_loss(140).unwrap();
    h.report(&s);
    assert_eq!(h.vault.balance_of(&h.vault.address()), 0);
    assert_eq!(h.pps(), h.unit() * 9 / 10);
    h.assert_books_balance();
}

#[test]
fn report_requires_an_active_strategy_and_the_role() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    let s = h.add_strategy("s");
    assert_eq!(
        h.vault.process_report(&h.gov, &user("ghost")),
        Err(VaultError::InactiveStrategy)
    );
    assert_eq!(
        h.vault.process_report(&user("mallory"), &strategy_address(&s)),
        Err(VaultError::NotAllowed)
    );
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

#[test]
fn fees_are_capped_at_three_quarters_of_the_gain() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 10_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 10_000);
    let accountant = h.install_accountant();
    accountant
        .set_default_fee(
            &h.gov,
            Fee {
                management_fee: 5_000,
                performance_fee: 5_000,
                refund_ratio: 0,
            },
        )
        .unwrap();

    h.clock.advance(SECS_PER_YEAR);
    s.simulate_gain(1_000).unwrap();
    h.report(&s);

    assert_eq!(
        last_report(&h),
        VaultEvent::StrategyReported {
            strategy: strategy_address(&s),
            gain: 1_000,
            loss: 0,
            current_debt: 11_000,
            total_fees: 750,
            total_refunds: 0,
            protocol_fees: 0,
        }
    );
    let json = serde_json::to_value(last_report(&h)).unwrap();
    assert_eq!(json["event"], "StrategyReported");
    assert_eq!(json["totalFees"], 750);
    assert_eq!(h.vault.balance_of(&accountant.address()), 750);
    assert_eq!(h.vault.balance_of(&h.vault.address()), 250);
    assert_eq!(h.pps(), h.unit());

    // Fee shares go to the fee manager on distribution.
    assert_eq!(accountant.distribute(&mut h.vault).unwrap(), 750);
    assert_eq!(h.vault.balance_of(&h.gov), 750);
    assert_eq!(h.vault.balance_of(&accountant.address()), 0);
}

#[test]
fn protocol_fees_are_carved_out_of_accountant_fees() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    let treasury = user("treasury");
    h.factory.set_protocol_fee_recipient(&h.gov, treasury).unwrap();
    h.factory.set_protocol_fee_bps(&h.gov, 1_000).unwrap();

    h.deposit(&user("alice"), 10_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 10_000);
    let accountant = h.install_accountant();
    accountant
        .set_performance_fee(&h.gov, &strategy_address(&s), 1_000)
        .unwrap();

    s.simulate_gain(1_000).unwrap();
    h.report(&s);

    match last_report(&h) {
        VaultEvent::StrategyReported {
            total_fees,
            protocol_fees,
            ..
        } => {
            assert_eq!(total_fees, 100);
            assert_eq!(protocol_fees, 10);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.vault.balance_of(&treasury), 10);
    assert_eq!(h.vault.balance_of(&accountant.address()), 90);
    assert_eq!(h.pps(), h.unit());
}

#[test]
fn custom_protocol_fee_applies_to_one_vault() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    let treasury = user("treasury");
    let vault = h.vault.address();
    h.factory.set_protocol_fee_recipient(&h.gov, treasury).unwrap();
    h.factory.set_custom_protocol_fee_bps(&h.gov, &vault, 5_000).unwrap();

    h.deposit(&user("alice"), 10_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 10_000);
    let accountant = h.install_accountant();
    accountant
        .set_performance_fee(&h.gov, &strategy_address(&s), 1_000)
        .unwrap();
    s.simulate_gain(1_000).unwrap();
    h.report(&s);

    assert_eq!(h.vault.balance_of(&treasury), 50);
    assert_eq!(h.vault.balance_of(&accountant.address()), 50);
}

#[test]
fn management_fee_without_gain_dilutes_holders() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 10_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 10_000);
    let accountant = h.install_accountant();
    accountant
        .set_management_fee(&h.gov, &strategy_address(&s), 100)
        .unwrap();

    h.clock.advance(SECS_PER_YEAR);
    h.report(&s);
    // 1% a year on 10_000.
    assert_eq!(h.vault.balance_of(&accountant.address()), 100);
    assert!(h.pps() < h.unit());
    match last_report(&h) {
        VaultEvent::StrategyReported { total_fees, .. } => assert_eq!(total_fees, 99),
        other => panic!("unexpected event {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Refunds
// ---------------------------------------------------------------------------

#[test]
fn full_refund_keeps_the_share_price() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);
    let accountant = h.install_accountant();
    accountant
        .set_refund_ratio(&h.gov, &strategy_address(&s), 10_000)
        .unwrap();
    h.ledger.write().mint(&accountant.address(), 1_000).unwrap();

    s.simulate_loss(100).unwrap();
    assert_eq!(h.report(&s), (0, 100));

    assert_eq!(h.pps(), h.unit());
    assert_eq!(h.asset_balance(&accountant.address()), 900);
    assert_eq!(h.vault.total_idle(), 100);
    match last_report(&h) {
        VaultEvent::StrategyReported { total_refunds, .. } => assert_eq!(total_refunds, 100),
        other => panic!("unexpected event {other:?}"),
    }
    h.assert_books_balance();
}

#[test]
fn partial_refund_softens_the_loss() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);
    let accountant = h.install_accountant();
    accountant
        .set_refund_ratio(&h.gov, &strategy_address(&s), 4_000)
        .unwrap();
    h.ledger.write().mint(&accountant.address(), 1_000).unwrap();

    s.simulate_loss(100).unwrap();
    h.report(&s);
    assert_eq!(h.pps(), h.unit() * 94 / 100);
    assert_eq!(h.vault.total_assets(), 940);
}

#[test]
fn refund_is_limited_by_the_accountant_balance() {
    let mut h = harness_with(6, SECS_PER_WEEK);
    h.deposit(&user("alice"), 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 1_000);
    let accountant = h.install_accountant();
    accountant
        .set_refund_ratio(&h.gov, &strategy_address(&s), 10_000)
        .unwrap();
    h.ledger.write().mint(&accountant.address(), 30).unwrap();

    s.simulate_loss(100).unwrap();
    h.report(&s);
    assert_eq!(h.asset_balance(&accountant.address()), 0);
    assert_eq!(h.vault.total_assets(), 930);
}
