use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monetary value normalized to 8 fractional digits.
///
/// All engine arithmetic on balances is exact; the only rounding anywhere is
/// the truncation (round-toward-zero) applied when a value enters this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

/// Error parsing an [`Amount`] from text.
#[derive(Debug, Error)]
pub enum AmountParseError {
    #[error("not a decimal number: {0}")]
    Invalid(#[from] rust_decimal::Error),

    #[error("too many fractional digits: scale {0} exceeds {max}", max = Amount::SCALE)]
    WrongScale(u32),
}

impl Amount {
    /// Fixed number of fractional digits carried by every amount.
    pub const SCALE: u32 = 8;

    /// Normalize a decimal to the engine scale, truncating toward zero.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value.trunc_with_scale(Self::SCALE);
        normalized.rescale(Self::SCALE);
        Amount(normalized)
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Decimal::ZERO
    }

    /// Multiply by a dimensionless factor, truncating the product back to scale.
    /// Returns `None` on overflow.
    pub fn checked_mul(&self, factor: Decimal) -> Option<Amount> {
        self.0.checked_mul(factor).map(Self::new)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Stored at scale 8, so Decimal prints the full fractional part.
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    /// Strict boundary parse: inputs with more than 8 fractional digits are
    /// rejected rather than silently truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)?;
        if value.scale() > Self::SCALE {
            return Err(AmountParseError::WrongScale(value.scale()));
        }
        Ok(Self::new(value))
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}
