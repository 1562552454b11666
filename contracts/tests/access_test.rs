//! Integration tests for roles, the role manager handoff and shutdown.

mod common;

use std::sync::Arc;

use common::*;
use strata_contracts::StaticDepositLimit;
use strata_protocol::config::SECS_PER_WEEK;
use strata_protocol::{ErrorKind, Roles, VaultConfig, VaultError, VaultEvent};

fn small() -> Harness {
    harness_with(6, SECS_PER_WEEK)
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[test]
fn role_manager_starts_with_every_role() {
    let h = small();
    assert_eq!(h.vault.role_manager(), h.gov);
    assert_eq!(h.vault.roles(&h.gov), Roles::all());
    assert!(h.vault.roles(&user("alice")).is_empty());
}

#[test]
fn roles_are_set_added_and_removed() {
    let mut h = small();
    let keeper = user("keeper");

    h.vault.set_role(&h.gov, &keeper, Roles::REPORTING_MANAGER).unwrap();
    h.vault.add_role(&h.gov, &keeper, Roles::DEBT_MANAGER).unwrap();
    assert_eq!(
        h.vault.roles(&keeper),
        Roles::REPORTING_MANAGER | Roles::DEBT_MANAGER
    );

    h.vault.remove_role(&h.gov, &keeper, Roles::REPORTING_MANAGER).unwrap();
    assert_eq!(h.vault.roles(&keeper), Roles::DEBT_MANAGER);

    h.vault.set_role(&h.gov, &keeper, Roles::empty()).unwrap();
    assert!(h.vault.roles(&keeper).is_empty());
    assert_eq!(
        h.vault.events().last(),
        Some(&VaultEvent::RoleSet {
            account: keeper,
            role: Roles::empty(),
        })
    );
}

#[test]
fn only_the_role_manager_assigns_roles() {
    let mut h = small();
    let mallory = user("mallory");
    let err = h.vault.set_role(&mallory, &mallory, Roles::all()).unwrap_err();
    assert_eq!(err, VaultError::NotRoleManager);
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(h.vault.roles(&mallory).is_empty());
}

#[test]
fn each_entry_point_demands_its_own_role() {
    let mut h = small();
    let keeper = user("keeper");
    h.vault.set_role(&h.gov, &keeper, Roles::REPORTING_MANAGER).unwrap();
    let s = h.add_strategy("s");
    let addr = strategy_address(&s);

    assert!(h.vault.process_report(&keeper, &addr).is_ok());
    let denied = [
        h.vault.update_debt(&keeper, &addr, 1, None).map(|_| ()),
        h.vault.revoke_strategy(&keeper, &addr),
        h.vault.set_minimum_total_idle(&keeper, 1),
        h.vault.set_default_queue(&keeper, Vec::new()),
        h.vault.set_deposit_limit(&keeper, 1, false),
        h.vault.shutdown_vault(&keeper),
    ];
    for result in denied {
        let err = result.unwrap_err();
        assert_eq!(err, VaultError::NotAllowed);
        assert_eq!(err.to_string(), "not allowed");
    }
}

#[test]
fn role_manager_handoff_takes_two_steps() {
    let mut h = small();
    let next = user("next");

    assert_eq!(
        h.vault.transfer_role_manager(&next, &next),
        Err(VaultError::NotRoleManager)
    );
    h.vault.transfer_role_manager(&h.gov, &next).unwrap();
    assert_eq!(h.vault.future_role_manager(), next);
    assert_eq!(h.vault.role_manager(), h.gov);

    assert_eq!(h.vault.accept_role_manager(&h.gov), Err(VaultError::CannotSelfAccept));
    assert_eq!(
        h.vault.accept_role_manager(&user("mallory")),
        Err(VaultError::NotFutureRoleManager)
    );

    h.vault.accept_role_manager(&next).unwrap();
    assert_eq!(h.vault.role_manager(), next);
    assert!(h.vault.future_role_manager().is_zero());
    assert_eq!(
        h.vault.events().last(),
        Some(&VaultEvent::UpdateRoleManager { role_manager: next })
    );

    // Capabilities do not move with the role manager.
    assert_eq!(h.vault.roles(&h.gov), Roles::all());
    assert!(h.vault.roles(&next).is_empty());
    assert_eq!(
        h.vault.set_role(&h.gov, &next, Roles::all()),
        Err(VaultError::NotRoleManager)
    );
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[test]
fn shutdown_stops_deposits_but_not_exits() {
    let mut h = small();
    let alice = user("alice");
    let shares = h.deposit(&alice, 1_000);
    let s = h.add_strategy("s");
    h.allocate(&s, 600);

    let emergency = user("emergency");
    h.vault
        .set_role(&h.gov, &emergency, Roles::EMERGENCY_MANAGER)
        .unwrap();
    h.vault.shutdown_vault(&emergency).unwrap();

    assert!(h.vault.is_shutdown());
    assert_eq!(h.vault.deposit_limit(), 0);
    assert_eq!(h.vault.max_deposit(&alice), 0);
    assert_eq!(h.vault.events().last(), Some(&VaultEvent::Shutdown));

    h.fund(&alice, 10);
    let err = h.vault.deposit(&alice, 10, &alice).unwrap_err();
    assert_eq!(err, VaultError::Shutdown);
    assert_eq!(err.to_string(), "vault is shutdown");

    assert_eq!(
        h.vault.set_deposit_limit(&h.gov, 1_000, true),
        Err(VaultError::Shutdown)
    );
    let module = Arc::new(StaticDepositLimit::new("limit", 1_000));
    assert_eq!(
        h.vault.set_deposit_limit_module(&h.gov, Some(module), true),
        Err(VaultError::Shutdown)
    );

    // The emergency manager can now unwind debt, and only downward.
    assert!(h.vault.roles(&emergency).contains(Roles::DEBT_MANAGER));
    let addr = strategy_address(&s);
    assert_eq!(h.vault.update_debt(&emergency, &addr, 1_000, None), Ok(0));
    assert_eq!(h.vault.total_idle(), 1_000);

    assert_eq!(h.vault.shutdown_vault(&emergency), Err(VaultError::AlreadyShutdown));

    assert_eq!(h.vault.redeem(&alice, shares, &alice, &alice), Ok(1_000));
    assert_eq!(h.asset_balance(&alice), 1_010);
}

#[test]
fn shutdown_drops_the_deposit_limit_module() {
    let mut h = small();
    let module = Arc::new(StaticDepositLimit::new("limit", 5_000));
    h.vault
        .set_deposit_limit_module(&h.gov, Some(module), false)
        .unwrap();
    h.vault.shutdown_vault(&h.gov).unwrap();
    assert!(h.vault.deposit_limit_module().is_zero());
    assert_eq!(h.vault.max_deposit(&user("alice")), 0);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn setters_emit_their_events() {
    let mut h = small();
    h.vault.take_events();
    h.vault.set_minimum_total_idle(&h.gov, 50).unwrap();
    h.vault.set_use_default_queue(&h.gov, true).unwrap();
    h.vault.set_profit_max_unlock_time(&h.gov, 3_600).unwrap();
    h.vault.set_accountant(&h.gov, None).unwrap();

    assert_eq!(
        h.vault.take_events(),
        vec![
            VaultEvent::UpdateMinimumTotalIdle {
                minimum_total_idle: 50,
            },
            VaultEvent::UpdateUseDefaultQueue {
                use_default_queue: true,
            },
            VaultEvent::UpdateProfitMaxUnlockTime {
                profit_max_unlock_time: 3_600,
            },
            VaultEvent::UpdateAccountant {
                accountant: strata_protocol::Address::ZERO,
            },
        ]
    );
    assert_eq!(h.vault.minimum_total_idle(), 50);
    assert!(h.vault.use_default_queue());
    assert_eq!(h.vault.profit_max_unlock_time(), 3_600);
}

#[test]
fn config_loads_from_json() {
    let h = small();
    let manager = user("manager");
    let raw = format!(
        r#"{{
            "name": "Strata Staked USDS",
            "symbol": "ssUSDS",
            "roleManager": "{manager}",
            "profitMaxUnlockTime": 86400
        }}"#
    );
    let config = VaultConfig::from_json(&raw).unwrap();
    assert_eq!(config.role_manager, manager);
    assert_eq!(config.role_manager_roles, Roles::all());

    let vault = h
        .factory
        .deploy_new_vault(&manager, h.ledger.clone(), h.clock.clone(), config)
        .unwrap();
    assert_eq!(vault.symbol(), "ssUSDS");
    assert_eq!(vault.profit_max_unlock_time(), 86_400);
    assert_eq!(vault.deposit_limit(), 0);
    assert_eq!(vault.roles(&manager), Roles::all());
}

#[test]
fn config_rejects_bad_input() {
    assert!(matches!(
        VaultConfig::from_json("{\"name\": \"x\"}"),
        Err(VaultError::InvalidConfig(_))
    ));

    let raw = format!(
        r#"{{"name": "x", "symbol": "x", "roleManager": "{}", "profitMaxUnlockTime": 0}}"#,
        strata_protocol::Address::ZERO
    );
    assert!(matches!(
        VaultConfig::from_json(&raw),
        Err(VaultError::ZeroAddress { .. })
    ));
}
