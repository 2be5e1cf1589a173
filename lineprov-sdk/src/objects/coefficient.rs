//! Fixed-point odds coefficient.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Number of fractional digits every coefficient carries.
pub const COEFFICIENT_SCALE: u32 = 2;

/// Odds coefficient of an event.
///
/// Always strictly greater than `1.00` and stored with exactly two
/// fractional digits. Inputs carrying more precision are rejected rather
/// than rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coefficient(Decimal);

/// Reasons a coefficient can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoefficientError {
    #[error("coefficient must be greater than 1.00, got {0}")]
    TooSmall(Decimal),
    #[error("coefficient must have at most {COEFFICIENT_SCALE} decimal places, got {0}")]
    TooPrecise(Decimal),
    #[error("invalid decimal: {0}")]
    Parse(String),
}

impl Coefficient {
    /// Validate and normalize a decimal into a coefficient.
    pub fn new(value: Decimal) -> Result<Self, CoefficientError> {
        let normalized = value.normalize();
        if normalized.scale() > COEFFICIENT_SCALE {
            return Err(CoefficientError::TooPrecise(value));
        }
        if normalized <= Decimal::ONE {
            return Err(CoefficientError::TooSmall(value));
        }
        let mut fixed = normalized;
        fixed.rescale(COEFFICIENT_SCALE);
        Ok(Self(fixed))
    }

    /// The underlying decimal, always at scale 2.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Coefficient {
    type Error = CoefficientError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Coefficient::new(value)
    }
}

impl FromStr for Coefficient {
    type Err = CoefficientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| CoefficientError::Parse(e.to_string()))?;
        Coefficient::new(value)
    }
}

impl From<Coefficient> for Decimal {
    fn from(value: Coefficient) -> Self {
        value.0
    }
}

impl std::fmt::Display for Coefficient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Coefficient {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Coefficient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(CoefficientVisitor)
    }
}

/// Accepts both JSON strings (`"2.50"`) and numbers (`2.5`).
struct CoefficientVisitor;

impl serde::de::Visitor<'_> for CoefficientVisitor {
    type Value = Coefficient;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a decimal greater than 1 with at most two fractional digits")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Coefficient, E> {
        Coefficient::from_str(v).map_err(E::custom)
    }

    // f64 Display is the shortest round-tripping representation, so `1.01`
    // is read back as exactly 1.01.
    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Coefficient, E> {
        if !v.is_finite() {
            return Err(E::custom("coefficient must be finite"));
        }
        Coefficient::from_str(&v.to_string()).map_err(E::custom)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Coefficient, E> {
        Coefficient::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Coefficient, E> {
        Coefficient::new(Decimal::from(v)).map_err(E::custom)
    }
}
