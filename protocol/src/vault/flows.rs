//! Deposits and exits.
//!
//! Exits burn the owner's shares up front, then source any shortfall of
//! idle assets from strategies in queue order. A strategy carrying an
//! unrealised loss charges the exiting owner their pro-rata share of it,
//! so early leavers cannot push the loss onto those who stay.

use tracing::debug;

use super::debt::check_max_loss;
use super::Vault;
use crate::address::Address;
use crate::config::MAX_BPS;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::math::{self, mul_div, Rounding};

/// Loss tolerance and liquidity sources for an exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitOptions {
    /// Largest tolerated loss in basis points of the assets requested.
    /// `None` accepts any loss.
    pub max_loss: Option<u16>,
    /// Strategies to pull from, in order, instead of the default queue.
    /// Ignored while the vault enforces its default queue.
    pub strategies: Vec<Address>,
}

impl ExitOptions {
    /// No loss tolerated. The default for `withdraw`.
    pub fn strict() -> Self {
        Self {
            max_loss: Some(0),
            strategies: Vec::new(),
        }
    }

    /// Any loss accepted. The default for `redeem`.
    pub fn lenient() -> Self {
        Self::default()
    }

    /// Sets the loss tolerance.
    pub fn with_max_loss(mut self, max_loss: u16) -> Self {
        self.max_loss = Some(max_loss);
        self
    }

    /// Pulls from `strategies` instead of the default queue.
    pub fn with_strategies(mut self, strategies: Vec<Address>) -> Self {
        self.strategies = strategies;
        self
    }
}

impl Vault {
    // -----------------------------------------------------------------------
    // Limits
    // -----------------------------------------------------------------------

    /// Assets `receiver` may deposit right now.
    pub fn max_deposit(&self, receiver: &Address) -> u128 {
        if receiver.is_zero() || *receiver == self.address || self.state.shutdown {
            return 0;
        }
        if let Some(module) = &self.state.deposit_limit_module {
            return module.available_deposit_limit(receiver);
        }
        self.state.deposit_limit.saturating_sub(self.total_assets())
    }

    /// Shares `receiver` may mint right now.
    pub fn max_mint(&self, receiver: &Address) -> Result<u128, VaultError> {
        self.convert_to_shares(self.max_deposit(receiver))
    }

    /// Assets `owner` could withdraw right now with the given options.
    pub fn max_withdraw(&self, owner: &Address, opts: &ExitOptions) -> Result<u128, VaultError> {
        check_max_loss(opts.max_loss)?;
        let max_assets = self.convert_to_assets(self.state.shares.balance_of(owner))?;

        if let Some(module) = &self.state.withdraw_limit_module {
            let max_loss = opts.max_loss.unwrap_or(MAX_BPS as u16);
            let limit = module.available_withdraw_limit(owner, max_loss, &opts.strategies);
            return Ok(limit.min(max_assets));
        }

        let idle = self.state.total_idle;
        if max_assets <= idle {
            return Ok(max_assets);
        }

        let mut have = idle;
        let mut loss = 0u128;
        for strategy in self.exit_queue(&opts.strategies) {
            let params = self.state.registry.params(&strategy);
            if !params.is_active() {
                return Err(VaultError::InactiveStrategy);
            }
            let handle = self.state.registry.handle(&strategy)?;
            let mut to_withdraw = (max_assets - have).min(params.current_debt);
            let mut unrealised = self.unrealised_loss_share(handle.as_ref(), params.current_debt, to_withdraw)?;
            let limit = handle.max_withdraw(&self.address);
            if limit < to_withdraw - unrealised {
                unrealised = mul_div(unrealised, limit, to_withdraw - unrealised, Rounding::Down)?;
                to_withdraw = limit + unrealised;
            }
            if to_withdraw == 0 {
                continue;
            }
            if unrealised > 0 {
                if let Some(bps) = opts.max_loss {
                    let tolerated = mul_div(have + to_withdraw, u128::from(bps), MAX_BPS, Rounding::Down)?;
                    if loss + unrealised > tolerated {
                        break;
                    }
                }
            }
            have += to_withdraw;
            if have >= max_assets {
                break;
            }
            loss += unrealised;
        }
        Ok(have.min(max_assets))
    }

    /// Shares `owner` could redeem right now with the given options.
    pub fn max_redeem(&self, owner: &Address, opts: &ExitOptions) -> Result<u128, VaultError> {
        let assets = self.max_withdraw(owner, opts)?;
        let shares = self.convert_to_shares(assets)?;
        Ok(shares.min(self.state.shares.balance_of(owner)))
    }

    fn exit_queue(&self, requested: &[Address]) -> Vec<Address> {
        if requested.is_empty() || self.state.use_default_queue {
            self.default_queue()
        } else {
            requested.to_vec()
        }
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Deposits `assets` from `caller` and mints shares to `receiver`.
    /// `caller` must have approved the vault on the asset ledger.
    pub fn deposit(&mut self, caller: &Address, assets: u128, receiver: &Address) -> Result<u128, VaultError> {
        let (caller, receiver) = (*caller, *receiver);
        self.atomically("deposit", move |vault| {
            vault.release_unlocked()?;
            vault.deposit_assets(&caller, assets, &receiver)
        })
    }

    /// Mints exactly enough shares for `receiver` to cover `shares`,
    /// pulling the required assets from `caller`. Returns the assets spent.
    pub fn mint(&mut self, caller: &Address, shares: u128, receiver: &Address) -> Result<u128, VaultError> {
        let (caller, receiver) = (*caller, *receiver);
        self.atomically("mint", move |vault| {
            vault.release_unlocked()?;
            let assets = vault.preview_mint(shares)?;
            vault.deposit_assets(&caller, assets, &receiver)?;
            Ok(assets)
        })
    }

    fn deposit_assets(&mut self, caller: &Address, assets: u128, receiver: &Address) -> Result<u128, VaultError> {
        if self.state.shutdown {
            return Err(VaultError::Shutdown);
        }
        if assets > self.max_deposit(receiver) {
            return Err(VaultError::ExceedDepositLimit);
        }

        let vault = self.address;
        self.ledger.write().transfer_from(&vault, caller, &vault, assets)?;
        self.state.total_idle = math::add(self.state.total_idle, assets, "total idle")?;

        let shares = self.issue_shares_for_amount(assets, receiver)?;
        if shares == 0 {
            return Err(VaultError::CannotMintZero);
        }
        self.emit(VaultEvent::Deposit {
            sender: *caller,
            owner: *receiver,
            assets,
            shares,
        });
        debug!(vault = %self.address, %receiver, assets, shares, "deposit");
        Ok(shares)
    }

    // -----------------------------------------------------------------------
    // Exits
    // -----------------------------------------------------------------------

    /// Withdraws `assets` for `owner` to `receiver` with no loss tolerated.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        assets: u128,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u128, VaultError> {
        self.withdraw_with(caller, assets, receiver, owner, ExitOptions::strict())
    }

    /// Withdraws `assets` for `owner` to `receiver`. Returns the shares
    /// burned.
    pub fn withdraw_with(
        &mut self,
        caller: &Address,
        assets: u128,
        receiver: &Address,
        owner: &Address,
        opts: ExitOptions,
    ) -> Result<u128, VaultError> {
        let (caller, receiver, owner) = (*caller, *receiver, *owner);
        self.atomically("withdraw", move |vault| {
            vault.release_unlocked()?;
            let shares = vault.preview_withdraw(assets)?;
            vault.redeem_shares(&caller, &receiver, &owner, assets, shares, &opts)?;
            Ok(shares)
        })
    }

    /// Redeems `shares` of `owner` to `receiver`, accepting any loss.
    pub fn redeem(
        &mut self,
        caller: &Address,
        shares: u128,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u128, VaultError> {
        self.redeem_with(caller, shares, receiver, owner, ExitOptions::lenient())
    }

    /// Redeems `shares` of `owner` to `receiver`. Returns the assets paid.
    pub fn redeem_with(
        &mut self,
        caller: &Address,
        shares: u128,
        receiver: &Address,
        owner: &Address,
        opts: ExitOptions,
    ) -> Result<u128, VaultError> {
        let (caller, receiver, owner) = (*caller, *receiver, *owner);
        self.atomically("redeem", move |vault| {
            vault.release_unlocked()?;
            let assets = vault.preview_redeem(shares)?;
            vault.redeem_shares(&caller, &receiver, &owner, assets, shares, &opts)
        })
    }

    fn redeem_shares(
        &mut self,
        caller: &Address,
        receiver: &Address,
        owner: &Address,
        assets: u128,
        shares: u128,
        opts: &ExitOptions,
    ) -> Result<u128, VaultError> {
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress { what: "receiver" });
        }
        check_max_loss(opts.max_loss)?;
        if self.state.withdraw_limit_module.is_some() && assets > self.max_withdraw(owner, opts)? {
            return Err(VaultError::ExceedWithdrawLimit);
        }
        if shares == 0 {
            return Err(VaultError::NoSharesToRedeem);
        }
        if assets == 0 {
            return Err(VaultError::NoAssetsToWithdraw);
        }
        if self.state.shares.balance_of(owner) < shares {
            return Err(VaultError::InsufficientShares);
        }
        if caller != owner {
            self.state.shares.spend_allowance(owner, caller, shares)?;
        }
        self.burn_shares(owner, shares)?;

        let mut requested = assets;
        let mut idle = self.state.total_idle;
        if requested > idle {
            let mut needed = requested - idle;
            let mut previous_balance = self.asset_balance();

            for strategy in self.exit_queue(&opts.strategies) {
                let params = self.state.registry.params(&strategy);
                if !params.is_active() {
                    return Err(VaultError::InactiveStrategy);
                }
                let handle = self.state.registry.handle(&strategy)?;
                let current_debt = params.current_debt;

                let mut to_withdraw = needed.min(current_debt);
                let limit = handle.max_withdraw(&self.address);
                let mut loss_share = self.unrealised_loss_share(handle.as_ref(), current_debt, to_withdraw)?;
                if loss_share > 0 {
                    if limit < to_withdraw - loss_share {
                        // Only charge the loss on what can actually leave.
                        loss_share = mul_div(loss_share, limit, to_withdraw - loss_share, Rounding::Down)?;
                        to_withdraw = limit + loss_share;
                    }
                    to_withdraw -= loss_share;
                    requested -= loss_share;
                    needed -= loss_share;
                    self.state.total_debt -= loss_share;
                }

                to_withdraw = to_withdraw.min(limit);
                if to_withdraw == 0 {
                    if loss_share > 0 {
                        let new_debt = current_debt - loss_share;
                        self.record_strategy_debt(&strategy, current_debt, new_debt)?;
                    }
                    continue;
                }

                handle.withdraw(to_withdraw, &self.address, &self.address)?;
                let post_balance = self.asset_balance();
                let withdrawn = post_balance.saturating_sub(previous_balance);

                let mut loss = 0;
                if withdrawn > to_withdraw {
                    // Surplus is kept, but never credited beyond the debt.
                    to_withdraw = withdrawn.min(current_debt - loss_share);
                } else if withdrawn < to_withdraw {
                    loss = to_withdraw - withdrawn;
                }

                idle = math::add(idle, to_withdraw - loss, "total idle")?;
                requested -= loss;
                self.state.total_debt -= to_withdraw;
                let new_debt = current_debt - (to_withdraw + loss_share);
                self.record_strategy_debt(&strategy, current_debt, new_debt)?;

                if requested <= idle {
                    break;
                }
                previous_balance = post_balance;
                needed = needed.saturating_sub(to_withdraw);
            }

            if idle < requested {
                return Err(VaultError::InsufficientAssets);
            }
        }

        if assets > requested {
            if let Some(bps) = opts.max_loss {
                let tolerated = mul_div(assets, u128::from(bps), MAX_BPS, Rounding::Down)?;
                if assets - requested > tolerated {
                    return Err(VaultError::TooMuchLoss);
                }
            }
        }

        self.state.total_idle = idle - requested;
        let vault = self.address;
        self.ledger.write().transfer(&vault, receiver, requested)?;

        self.emit(VaultEvent::Withdraw {
            sender: *caller,
            receiver: *receiver,
            owner: *owner,
            assets: requested,
            shares,
        });
        debug!(vault = %self.address, %owner, assets = requested, shares, "withdraw");
        Ok(requested)
    }

    fn record_strategy_debt(&mut self, strategy: &Address, current_debt: u128, new_debt: u128) -> Result<(), VaultError> {
        self.state.registry.params_mut(strategy)?.current_debt = new_debt;
        self.emit(VaultEvent::DebtUpdated {
            strategy: *strategy,
            current_debt,
            new_debt,
        });
        Ok(())
    }
}
