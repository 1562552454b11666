//! Checked `u128` arithmetic for vault accounting.
//!
//! Share/asset products routinely exceed `u128` for 18-decimal assets, so
//! [`mul_div`] widens to 256 bits before dividing. The result must fit back
//! into `u128` or the call fails with [`VaultError::Overflow`].

use alloy_primitives::U256;

use crate::error::VaultError;

/// Rounding direction for fixed-point division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Truncate toward zero. Favors the vault when paying out.
    Down,
    /// Round away from zero. Favors the vault when charging.
    Up,
}

/// Computes `a * b / denominator` with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, VaultError> {
    if denominator == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let numerator = U256::from(a) * U256::from(b);
    let denominator = U256::from(denominator);
    let mut quotient = numerator / denominator;
    if rounding == Rounding::Up && !(numerator % denominator).is_zero() {
        quotient += U256::from(1u8);
    }
    u128::try_from(quotient).map_err(|_| VaultError::Overflow { context: "mul_div" })
}

/// `a + b`, failing on overflow.
pub fn add(a: u128, b: u128, context: &'static str) -> Result<u128, VaultError> {
    a.checked_add(b).ok_or(VaultError::Overflow { context })
}

/// `a - b`, failing on underflow.
pub fn sub(a: u128, b: u128, context: &'static str) -> Result<u128, VaultError> {
    a.checked_sub(b).ok_or(VaultError::Overflow { context })
}
