//! Ledger and transaction types plus signing errors.

use alloy::primitives::U256;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the two independent chains the proxy tracks nonces for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerName {
    Home,
    Side,
}

impl LedgerName {
    /// Both ledgers, in sync order.
    pub const ALL: [LedgerName; 2] = [LedgerName::Home, LedgerName::Side];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerName::Home => "home",
            LedgerName::Side => "side",
        }
    }
}

impl fmt::Display for LedgerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a `chain` value is not a known ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ledger {0:?}, expected \"home\" or \"side\"")]
pub struct UnknownLedger(pub String);

impl FromStr for LedgerName {
    type Err = UnknownLedger;

    /// Exact, case-sensitive match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(LedgerName::Home),
            "side" => Ok(LedgerName::Side),
            other => Err(UnknownLedger(other.to_string())),
        }
    }
}

/// An unsigned transaction as described by the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionDescriptor {
    #[serde(rename = "chainId")]
    pub chain_id: u64,

    /// Hex call data, `0x` prefix optional.
    #[serde(default)]
    pub data: String,

    #[serde(rename = "gas")]
    pub gas_limit: u64,

    #[serde(rename = "gasPrice", deserialize_with = "deserialize_quantity")]
    pub gas_price: U256,

    #[serde(deserialize_with = "deserialize_quantity")]
    pub value: U256,

    pub nonce: u64,

    pub to: String,
}

/// The `result` of an unsigned-transaction fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct UnsignedTransactions {
    pub transactions: Vec<TransactionDescriptor>,
}

/// Signed wire transactions submitted back upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTransactions {
    pub transactions: Vec<String>,
}

/// Accepts a JSON integer of any size or a decimal / `0x`-hex string.
///
/// Numbers are read from their literal text so values past `u64` keep full
/// precision.
fn deserialize_quantity<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    parse_quantity_literal(raw.get()).map_err(de::Error::custom)
}

fn parse_quantity_literal(literal: &str) -> Result<U256, String> {
    let literal = literal.trim();
    if literal.starts_with('"') {
        let text: String = serde_json::from_str(literal).map_err(|e| e.to_string())?;
        return parse_quantity(&text);
    }
    if literal.starts_with('-') {
        return Err(format!("negative quantity {literal}"));
    }
    U256::from_str_radix(literal, 10).map_err(|e| format!("invalid quantity {literal}: {e}"))
}

fn parse_quantity(s: &str) -> Result<U256, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|e| format!("invalid quantity {s:?}: {e}"))
}

/// Errors raised while turning descriptors into signed transactions.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Private key could not be parsed.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Descriptor payload is not valid hex.
    #[error("transaction {index}: malformed payload: {reason}")]
    MalformedPayload { index: usize, reason: String },

    /// Recipient is not a 20-byte hex address.
    #[error("transaction {index}: invalid recipient {to:?}")]
    InvalidRecipient { index: usize, to: String },

    /// Legacy transactions carry a 128-bit gas price.
    #[error("transaction {index}: gas price exceeds 128 bits")]
    GasPriceOverflow { index: usize },

    /// The signer rejected the transaction hash.
    #[error("transaction {index}: signing failed: {source}")]
    Signature {
        index: usize,
        #[source]
        source: alloy::signers::Error,
    },
}

pub type SigningResult<T> = Result<T, SigningError>;
