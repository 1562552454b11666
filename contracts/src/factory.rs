//! # Vault Factory
//!
//! Deploys vaults and serves as their protocol fee source.
//!
//! ## Deployment
//!
//! A vault's address is derived from the factory, the deployer, the asset,
//! the name and the symbol, so the same deployer cannot create the same
//! vault twice. Once the factory is shut down it deploys nothing further;
//! vaults already deployed are unaffected.
//!
//! ## Protocol Fees
//!
//! Governance sets a default fee rate and recipient for every vault this
//! factory deployed, and may override the rate per vault. The recipient is
//! always the default one. A rate can only be set while a recipient exists.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use strata_protocol::config::{API_VERSION, MAX_PROTOCOL_FEE_BPS};
use strata_protocol::error::VaultError;
use strata_protocol::roles::RoleManagerHandoff;
use strata_protocol::{
    Address, Clock, ProtocolFeeConfig, ProtocolFeeSource, SharedLedger, Vault, VaultConfig, VaultEnv,
};
use thiserror::Error;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from factory governance and deployment.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The caller is not governance.
    #[error("not governance")]
    NotGovernance,

    /// Only the nominated successor may accept governance.
    #[error("not pending governance")]
    NotPendingGovernance,

    /// The factory no longer deploys vaults.
    #[error("factory is shutdown")]
    Shutdown,

    /// A vault with these inputs already exists.
    #[error("vault already deployed")]
    AlreadyDeployed,

    /// Fee rate above [`MAX_PROTOCOL_FEE_BPS`].
    #[error("fee too high")]
    FeeTooHigh,

    /// A rate was set before any recipient.
    #[error("no recipient")]
    NoRecipient,

    /// The fee recipient cannot be the zero address.
    #[error("protocol fee recipient cannot be zero address")]
    ZeroRecipient,

    /// The new vault rejected its configuration.
    #[error(transparent)]
    Vault(#[from] VaultError),
}

#[derive(Debug, Default)]
struct FactoryState {
    shutdown: bool,
    default_fee: ProtocolFeeConfig,
    custom_fees: HashMap<Address, u16>,
    deployed: HashSet<Address>,
}

/// Deploys vaults and charges protocol fees on them.
#[derive(Debug)]
pub struct VaultFactory {
    address: Address,
    name: String,
    governance: RwLock<RoleManagerHandoff>,
    state: RwLock<FactoryState>,
}

impl VaultFactory {
    /// Creates a factory governed by `governance`.
    pub fn new(name: impl Into<String>, governance: Address) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            address: Address::derive(&[b"factory", name.as_bytes(), governance.as_bytes()]),
            name,
            governance: RwLock::new(RoleManagerHandoff::new(governance)),
            state: RwLock::new(FactoryState::default()),
        })
    }

    /// The factory's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The factory's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accounting API version of the vaults it deploys.
    pub fn api_version(&self) -> &'static str {
        API_VERSION
    }

    /// Current governance.
    pub fn governance(&self) -> Address {
        self.governance.read().current()
    }

    /// Nominated governance, or zero.
    pub fn pending_governance(&self) -> Address {
        self.governance.read().pending()
    }

    /// Whether deployments are closed.
    pub fn is_shutdown(&self) -> bool {
        self.state.read().shutdown
    }

    /// Whether `vault` was deployed here.
    pub fn is_deployed(&self, vault: &Address) -> bool {
        self.state.read().deployed.contains(vault)
    }

    /// The default fee configuration.
    pub fn default_protocol_fee_config(&self) -> ProtocolFeeConfig {
        self.state.read().default_fee
    }

    fn require_governance(&self, caller: &Address) -> Result<(), FactoryError> {
        if *caller == self.governance() {
            Ok(())
        } else {
            Err(FactoryError::NotGovernance)
        }
    }

    // -----------------------------------------------------------------------
    // Deployment
    // -----------------------------------------------------------------------

    /// The address `deployer` would get for a vault with these inputs.
    pub fn vault_address(&self, deployer: &Address, asset: &Address, name: &str, symbol: &str) -> Address {
        Address::derive(&[
            self.address.as_bytes(),
            deployer.as_bytes(),
            asset.as_bytes(),
            name.as_bytes(),
            symbol.as_bytes(),
        ])
    }

    /// Deploys a vault for `ledger`'s asset. Its protocol fees are looked
    /// up on this factory.
    pub fn deploy_new_vault(
        self: &Arc<Self>,
        deployer: &Address,
        ledger: SharedLedger,
        clock: Arc<dyn Clock>,
        config: VaultConfig,
    ) -> Result<Vault, FactoryError> {
        if self.is_shutdown() {
            return Err(FactoryError::Shutdown);
        }
        let asset = ledger.read().address();
        let address = self.vault_address(deployer, &asset, &config.name, &config.symbol);
        if self.is_deployed(&address) {
            return Err(FactoryError::AlreadyDeployed);
        }

        let protocol_fees: Arc<dyn ProtocolFeeSource> = self.clone();
        let vault = Vault::initialize(
            VaultEnv {
                address,
                ledger,
                clock,
                protocol_fees,
            },
            config,
        )?;
        self.state.write().deployed.insert(address);

        info!(factory = %self.address, vault = %address, %asset, deployer = %deployer, "vault deployed");
        Ok(vault)
    }

    // -----------------------------------------------------------------------
    // Protocol Fees
    // -----------------------------------------------------------------------

    /// Sets the default protocol fee rate.
    pub fn set_protocol_fee_bps(&self, caller: &Address, fee_bps: u16) -> Result<(), FactoryError> {
        self.require_governance(caller)?;
        if fee_bps > MAX_PROTOCOL_FEE_BPS {
            return Err(FactoryError::FeeTooHigh);
        }
        let mut state = self.state.write();
        if state.default_fee.fee_recipient.is_zero() {
            return Err(FactoryError::NoRecipient);
        }
        state.default_fee.fee_bps = fee_bps;
        info!(factory = %self.address, fee_bps, "protocol fee updated");
        Ok(())
    }

    /// Sets where protocol fees go.
    pub fn set_protocol_fee_recipient(&self, caller: &Address, recipient: Address) -> Result<(), FactoryError> {
        self.require_governance(caller)?;
        if recipient.is_zero() {
            return Err(FactoryError::ZeroRecipient);
        }
        self.state.write().default_fee.fee_recipient = recipient;
        info!(factory = %self.address, %recipient, "protocol fee recipient updated");
        Ok(())
    }

    /// Overrides the rate for one vault.
    pub fn set_custom_protocol_fee_bps(
        &self,
        caller: &Address,
        vault: &Address,
        fee_bps: u16,
    ) -> Result<(), FactoryError> {
        self.require_governance(caller)?;
        if fee_bps > MAX_PROTOCOL_FEE_BPS {
            return Err(FactoryError::FeeTooHigh);
        }
        let mut state = self.state.write();
        if state.default_fee.fee_recipient.is_zero() {
            return Err(FactoryError::NoRecipient);
        }
        state.custom_fees.insert(*vault, fee_bps);
        info!(factory = %self.address, %vault, fee_bps, "custom protocol fee set");
        Ok(())
    }

    /// Drops a vault's override, returning it to the default rate.
    pub fn remove_custom_protocol_fee(&self, caller: &Address, vault: &Address) -> Result<(), FactoryError> {
        self.require_governance(caller)?;
        self.state.write().custom_fees.remove(vault);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Governance
    // -----------------------------------------------------------------------

    /// Stops all future deployments.
    pub fn shutdown_factory(&self, caller: &Address) -> Result<(), FactoryError> {
        self.require_governance(caller)?;
        self.state.write().shutdown = true;
        warn!(factory = %self.address, "factory shut down");
        Ok(())
    }

    /// Nominates `next` as governance.
    pub fn transfer_governance(&self, caller: &Address, next: Address) -> Result<(), FactoryError> {
        self.governance
            .write()
            .nominate(caller, next)
            .map_err(|_| FactoryError::NotGovernance)
    }

    /// Completes a governance handoff.
    pub fn accept_governance(&self, caller: &Address) -> Result<(), FactoryError> {
        let governance = self
            .governance
            .write()
            .accept(caller)
            .map_err(|_| FactoryError::NotPendingGovernance)?;
        info!(factory = %self.address, %governance, "governance changed");
        Ok(())
    }
}

impl ProtocolFeeSource for VaultFactory {
    fn protocol_fee_config(&self, vault: &Address) -> ProtocolFeeConfig {
        let state = self.state.read();
        match state.custom_fees.get(vault) {
            Some(&fee_bps) => ProtocolFeeConfig {
                fee_bps,
                fee_recipient: state.default_fee.fee_recipient,
            },
            None => state.default_fee,
        }
    }
}
