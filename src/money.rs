//! Fixed-point amounts for denomination counts and monetary sums.
//!
//! Counts arrive from the wire as decimal strings; keeping them in
//! `rust_decimal::Decimal` avoids binary-float drift across the many small
//! debits a long trading session accumulates.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

// newtype wrapper over Decimal because Decimal doesn't implement minicbor traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn parse(s: &str) -> Result<Self, rust_decimal::Error> {
        Decimal::from_str(s).map(Self)
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn abs_diff(self, other: Self) -> Self {
        Self((self.0 - other.0).abs())
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(self, other: Self) -> Option<Self> {
        self.0.checked_mul(other.0).map(Self)
    }

    /// Round to `digits` significant digits. None when the amount cannot be
    /// represented at that precision.
    pub fn round_sf(self, digits: u32) -> Option<Self> {
        self.0.round_sf(digits).map(Self)
    }

    /// Fixed decimal places for display.
    pub fn to_display(self, decimals: u32) -> String {
        format!("{:.*}", decimals as usize, self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

// Encoded as a decimal string so stored counts stay readable and scale-exact.
impl<C> minicbor::Encode<C> for Amount {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Amount {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let raw = d.str()?;

        Decimal::from_str(raw)
            .map(Amount)
            .map_err(|e| minicbor::decode::Error::message(format!("bad decimal string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_encoding() {
        let original = Amount::parse("1234.5678").unwrap();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Amount = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn scale_insensitive_equality() {
        assert_eq!(Amount::parse("500").unwrap(), Amount::parse("500.00").unwrap());
    }

    #[test]
    fn display_decimals() {
        let a = Amount::parse("1.5").unwrap();
        assert_eq!(a.to_display(2), "1.50");
        assert_eq!(a.to_display(8), "1.50000000");
    }
}
