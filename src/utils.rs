//! Identifier minting for ledger records

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique time-ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn session_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("sess_")
}

pub fn swap_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("swap_")
}

pub fn transfer_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("xfer_")
}
