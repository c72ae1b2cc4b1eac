//! Identifiers and fixed-point quantities shared across the engine
//!
//! Amounts and percentages are integers end to end. An `Amount` counts the
//! smallest currency unit; a `BasisPoints` counts 1/10 000 of the whole.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Seconds since the Unix epoch, as reported by a [`crate::Clock`]
pub type Timestamp = u64;

/// Address of an external account, as authenticated by the wallet collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account id from any string-like address
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self(address.into())
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// The raw id
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Platform-assigned DAO identifier
    DaoId
);
numeric_id!(
    /// Platform-unique proposal identifier
    ProposalId
);
numeric_id!(
    /// Platform-unique task identifier
    TaskId
);

/// Number of decimal places of the native currency unit
pub const NATIVE_DECIMALS: u32 = 8;

/// Smallest units per whole native unit
pub const UNITS_PER_NATIVE: u64 = 100_000_000;

/// A non-negative amount in the smallest currency unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Convert a whole-unit decimal (e.g. `0.01`) into smallest units.
    ///
    /// Fails if the value is negative, has more precision than the currency
    /// supports, or does not fit.
    pub fn from_native(value: Decimal) -> Result<Amount> {
        if value.is_sign_negative() {
            return Err(Error::validation(format!("negative amount: {}", value)));
        }
        let scaled = value
            .checked_mul(Decimal::from(UNITS_PER_NATIVE))
            .ok_or_else(|| Error::validation(format!("amount out of range: {}", value)))?;
        if scaled.fract() != Decimal::ZERO {
            return Err(Error::validation(format!(
                "amount {} has more than {} decimal places",
                value, NATIVE_DECIMALS
            )));
        }
        scaled
            .to_u64()
            .map(Amount)
            .ok_or_else(|| Error::validation(format!("amount out of range: {}", value)))
    }

    /// Parse a whole-unit decimal string such as `"0.01"`
    pub fn parse_native(s: &str) -> Result<Amount> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| Error::validation(format!("invalid amount '{}': {}", s, e)))?;
        Self::from_native(value)
    }

    /// The amount in whole native units
    pub fn to_native(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.0 as i128, NATIVE_DECIMALS).normalize()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fraction in units of 1/10 000.
///
/// Vote tallies are sums of voting-power snapshots and are also expressed in
/// basis points; a tally may exceed [`BasisPoints::MAX`] when stake moved
/// between votes, so the backing integer is wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisPoints(u64);

impl BasisPoints {
    pub const ZERO: BasisPoints = BasisPoints(0);
    /// 100%
    pub const MAX: BasisPoints = BasisPoints(10_000);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether this is a valid share of a whole (at most 100%)
    pub const fn is_fraction(&self) -> bool {
        self.0 <= Self::MAX.0
    }

    pub fn saturating_add(self, other: BasisPoints) -> BasisPoints {
        BasisPoints(self.0.saturating_add(other.0))
    }

    pub fn checked_add(self, other: BasisPoints) -> Option<BasisPoints> {
        self.0.checked_add(other.0).map(BasisPoints)
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
