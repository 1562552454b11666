//! Shared fixtures for the vault integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use strata_contracts::{FeeAccountant, MockStrategy, VaultFactory};
use strata_protocol::logging::try_init_test_logging;
use strata_protocol::{Address, AssetLedger, ManualClock, SharedLedger, Vault, VaultConfig};

/// Start of every test clock.
pub const GENESIS: u64 = 1_700_000_000;

/// One whole unit of an 18-decimal asset.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// A deployed vault with everything around it.
pub struct Harness {
    pub ledger: SharedLedger,
    pub clock: Arc<ManualClock>,
    pub factory: Arc<VaultFactory>,
    pub vault: Vault,
    pub gov: Address,
}

/// An 18-decimal vault with a one-week unlock window.
pub fn harness() -> Harness {
    harness_with(18, strata_protocol::config::SECS_PER_WEEK)
}

/// A vault over an asset with `decimals` and the given unlock window. The
/// governance account holds every role and the deposit limit is lifted.
pub fn harness_with(decimals: u8, profit_max_unlock_time: u64) -> Harness {
    try_init_test_logging();
    let ledger = AssetLedger::new("USDS", decimals).shared();
    let clock = Arc::new(ManualClock::new(GENESIS));
    let gov = Address::from_label("gov");
    let factory = VaultFactory::new("Strata Factory", gov);

    let config = VaultConfig::new("Strata USDS", "sUSDS", gov)
        .with_profit_max_unlock_time(profit_max_unlock_time);
    let mut vault = factory
        .deploy_new_vault(&gov, ledger.clone(), clock.clone(), config)
        .expect("deploy vault");
    vault
        .set_deposit_limit(&gov, u128::MAX, false)
        .expect("lift deposit limit");

    Harness {
        ledger,
        clock,
        factory,
        vault,
        gov,
    }
}

pub fn user(label: &str) -> Address {
    Address::from_label(label)
}

impl Harness {
    /// Mints `amount` of the asset to `who` and approves the vault for it.
    pub fn fund(&self, who: &Address, amount: u128) {
        let mut ledger = self.ledger.write();
        ledger.mint(who, amount).expect("mint");
        let vault = self.vault.address();
        let allowance = ledger.allowance(who, &vault);
        ledger.approve(who, &vault, allowance + amount);
    }

    /// Funds `who` and deposits `amount` for them. Returns the shares.
    pub fn deposit(&mut self, who: &Address, amount: u128) -> u128 {
        self.fund(who, amount);
        self.vault.deposit(who, amount, who).expect("deposit")
    }

    /// Registers a fresh uncapped strategy named `label`.
    pub fn add_strategy(&mut self, label: &str) -> Arc<MockStrategy> {
        let strategy = Arc::new(MockStrategy::new(label, &self.ledger));
        self.vault
            .add_strategy(&self.gov, strategy.clone(), true)
            .expect("add strategy");
        self.vault
            .update_max_debt_for_strategy(&self.gov, &strategy_address(&strategy), u128::MAX)
            .expect("max debt");
        strategy
    }

    /// Moves `strategy`'s debt to `target`.
    pub fn allocate(&mut self, strategy: &Arc<MockStrategy>, target: u128) -> u128 {
        self.vault
            .update_debt(&self.gov, &strategy_address(strategy), target, None)
            .expect("update debt")
    }

    /// Reports `strategy`.
    pub fn report(&mut self, strategy: &Arc<MockStrategy>) -> (u128, u128) {
        self.vault
            .process_report(&self.gov, &strategy_address(strategy))
            .expect("process report")
    }

    /// Creates an accountant managed by governance and installs it.
    pub fn install_accountant(&mut self) -> Arc<FeeAccountant> {
        let accountant = Arc::new(FeeAccountant::new("accountant", &self.ledger, self.gov));
        self.vault
            .set_accountant(&self.gov, Some(accountant.clone()))
            .expect("set accountant");
        accountant
    }

    pub fn asset_balance(&self, who: &Address) -> u128 {
        self.ledger.read().balance_of(who)
    }

    /// Price per share scaled to the asset's decimals.
    pub fn pps(&self) -> u128 {
        self.vault.price_per_share().expect("price per share")
    }

    /// One whole share in base units.
    pub fn unit(&self) -> u128 {
        10u128.pow(u32::from(self.vault.decimals()))
    }

    /// The two accounting identities every state must satisfy.
    pub fn assert_books_balance(&self) {
        let vault = &self.vault;
        assert_eq!(vault.total_idle() + vault.total_debt(), vault.total_assets());
        assert_eq!(vault.total_idle(), self.asset_balance(&vault.address()));
    }
}

pub fn strategy_address(strategy: &Arc<MockStrategy>) -> Address {
    use strata_protocol::Strategy;
    strategy.address()
}
