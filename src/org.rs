//! Organization-owned records the float engine reads but never writes:
//! repositories (tills and vaults), currencies and their denominations.
//! Admin CRUD maintains these; here they are plain stored inputs.

use crate::money::Amount;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    #[n(0)]
    Fiat,
    #[n(1)]
    Crypto,
    #[n(2)]
    Metal,
}

impl CurrencyKind {
    /// Display precision: 2 decimal places for fiat and metal, 8 for crypto.
    pub fn display_decimals(self) -> u32 {
        match self {
            CurrencyKind::Crypto => 8,
            CurrencyKind::Fiat | CurrencyKind::Metal => 2,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Denomination {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub value: Amount,
    #[n(2)]
    pub accepted: bool,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    #[n(0)]
    pub ticker: String,
    #[n(1)]
    pub org_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub kind: CurrencyKind,
    #[n(4)]
    pub denominations: Vec<Denomination>,
}

impl Currency {
    pub fn denomination(&self, id: &str) -> Option<&Denomination> {
        self.denominations.iter().find(|d| d.id == id)
    }
}

// a till, vault, or virtual wallet belonging to an organization
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub org_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub tickers: Vec<String>,
    #[n(4)]
    pub float_count_required: bool,
    #[n(5)]
    pub active: bool,
}
