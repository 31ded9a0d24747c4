//! Arbitrary-precision monetary quantities.
//!
//! Spec reference: §3 — "Integer monetary quantities are arbitrary-precision
//! unsigned (bigint)"; §6 — "monetary amounts are strings" on the wire.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An arbitrary-precision unsigned quantity, serialized as a decimal
/// string so JSON consumers never lose precision to an `f64`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitAmount(pub BigUint);

impl UnitAmount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn from_u64(v: u64) -> Self {
        Self(BigUint::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }
}

impl fmt::Display for UnitAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnitAmount {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(BigUint::from_str(s)?))
    }
}

impl Serialize for UnitAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnitAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BigUint::from_str(&raw)
            .map(UnitAmount)
            .map_err(|e| D::Error::custom(format!("invalid bigint amount {raw:?}: {e}")))
    }
}

/// `"" ` is the native-token (lovelace) unit; any other value is a Cardano
/// multi-asset unit (`policyId ++ assetNameHex`).
pub type Unit = String;

pub fn is_lovelace_unit(unit: &str) -> bool {
    unit.is_empty()
}

/// Lovelace-denominated quantity — used for fee ledgers
/// (`totalSellerCardanoFees`, `totalBuyerCardanoFees`,
/// `collateralReturnLovelace`), always native-token, never a multi-asset
/// unit.
pub type Lovelace = UnitAmount;

/// A single `(unit, amount)` pair as it appears in `RequestedFunds`,
/// `PaidFunds`, `WithdrawnForSeller`, and `WithdrawnForBuyer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitValue {
    pub unit: Unit,
    pub amount: UnitAmount,
}

impl UnitValue {
    pub fn lovelace(amount: u64) -> Self {
        Self {
            unit: String::new(),
            amount: UnitAmount::from_u64(amount),
        }
    }
}

/// 1..=7 entries per §3's `RequestedFunds` invariant. The bound is enforced
/// at construction so a `Vec<UnitValue>` can never silently violate it once
/// wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestedFunds(Vec<UnitValue>);

#[derive(Debug, thiserror::Error)]
pub enum RequestedFundsError {
    #[error("RequestedFunds must have between 1 and 7 entries, got {0}")]
    WrongArity(usize),
}

impl RequestedFunds {
    pub fn new(entries: Vec<UnitValue>) -> Result<Self, RequestedFundsError> {
        if entries.is_empty() || entries.len() > 7 {
            return Err(RequestedFundsError::WrongArity(entries.len()));
        }
        Ok(Self(entries))
    }

    pub fn as_slice(&self) -> &[UnitValue] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<UnitValue> {
        self.0
    }
}
