//! Wallet-connected contract plumbing for the Educhain test network.

pub mod abi;
pub mod contract;
pub mod events;
pub mod rpc;
pub mod wallet;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pkg::internal::failure::{Failure, Outcome};

/// Native token amounts in the smallest unit (18 decimals).
pub type Wei = u128;

pub const NATIVE_DECIMALS: usize = 18;
pub const NATIVE_SYMBOL: &str = "EDU";

fn decode_fixed<const N: usize>(s: &str, what: &str) -> Outcome<[u8; N]> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw)
        .map_err(|e| Failure::InvalidArgument(format!("{} {}: {}", what, s, e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        Failure::InvalidArgument(format!("{} must be {} bytes, got {}", what, N, b.len()))
    })
}

/// A 20 byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = Failure;

    fn from_str(s: &str) -> Outcome<Self> {
        Ok(Address(decode_fixed(s.trim(), "address")?))
    }
}

impl TryFrom<String> for Address {
    type Error = Failure;

    fn try_from(value: String) -> Outcome<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A 32 byte word: transaction hashes and log topics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct H256(pub [u8; 32]);

pub type TxHash = H256;

impl FromStr for H256 {
    type Err = Failure;

    fn from_str(s: &str) -> Outcome<Self> {
        Ok(H256(decode_fixed(s.trim(), "hash")?))
    }
}

impl TryFrom<String> for H256 {
    type Error = Failure;

    fn try_from(value: String) -> Outcome<Self> {
        value.parse()
    }
}

impl From<H256> for String {
    fn from(value: H256) -> Self {
        value.to_string()
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Arbitrary length byte payload, `0x` hex on the wire.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexBytes(pub Vec<u8>);

impl TryFrom<String> for HexBytes {
    type Error = Failure;

    fn try_from(value: String) -> Outcome<Self> {
        let raw = value.strip_prefix("0x").unwrap_or(&value);
        hex::decode(raw)
            .map(HexBytes)
            .map_err(|e| Failure::InvalidArgument(format!("hex payload: {}", e)))
    }
}

impl From<HexBytes> for String {
    fn from(value: HexBytes) -> Self {
        format!("0x{}", hex::encode(value.0))
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Parses a decimal ether-style amount ("0.00001") into wei.
pub fn parse_ether(amount: &str) -> Outcome<Wei> {
    let invalid = || Failure::InvalidArgument(format!("amount {:?}", amount));
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > NATIVE_DECIMALS
        || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    let scale = 10u128.pow(NATIVE_DECIMALS as u32);
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = NATIVE_DECIMALS)
            .parse()
            .map_err(|_| invalid())?
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)
}

/// Contract addresses the service talks to.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contracts {
    pub profile: Address,
    pub posting: Address,
    pub project: Address,
}

/// Value attached to each of the payable calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fees {
    pub create_profile: Wei,
    pub complete_posting: Wei,
    pub complete_project: Wei,
}

impl Default for Fees {
    fn default() -> Self {
        Fees {
            create_profile: 1_000_000_000_000_000,
            complete_posting: 10_000_000_000_000,
            complete_project: 10_000_000_000_000,
        }
    }
}
