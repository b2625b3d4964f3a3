//! Key management and legacy transaction signing.
//!
//! # Security
//! - The private key comes from config or an environment variable
//! - Keys are never logged or serialized

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::hex;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::blockchain::types::{SigningError, SigningResult, TransactionDescriptor};

/// Environment variable that overrides the configured private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "SIGNING_PROXY_PRIVATE_KEY";

/// Holds the proxy's single signing key.
#[derive(Clone)]
pub struct Signer {
    key: PrivateKeySigner,
}

impl Signer {
    /// Create a signer from a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> SigningResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let key: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| SigningError::InvalidKey(format!("{e}")))?;

        tracing::info!(address = %key.address(), "Signer initialized");

        Ok(Self { key })
    }

    /// Load the key from `SIGNING_PROXY_PRIVATE_KEY`, falling back to `configured`.
    pub fn from_env_or(configured: &str) -> SigningResult<Self> {
        match std::env::var(PRIVATE_KEY_ENV_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::from_private_key(&key),
            _ => Self::from_private_key(configured),
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// Checksum-cased account address, as sent upstream.
    pub fn account(&self) -> String {
        self.address().to_checksum(None)
    }

    /// Sign every descriptor in order.
    ///
    /// Each transaction is bound to its own `chainId` (EIP-155). Output is the
    /// lower-case hex of the RLP encoding, without prefix. Fails on the first
    /// bad descriptor and returns nothing in that case.
    pub fn sign(&self, descriptors: &[TransactionDescriptor]) -> SigningResult<Vec<String>> {
        descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| self.sign_one(index, descriptor))
            .collect()
    }

    fn sign_one(&self, index: usize, descriptor: &TransactionDescriptor) -> SigningResult<String> {
        let input = decode_payload(&descriptor.data).map_err(|e| {
            SigningError::MalformedPayload {
                index,
                reason: e.to_string(),
            }
        })?;

        let to: Address = descriptor
            .to
            .trim()
            .parse()
            .map_err(|_| SigningError::InvalidRecipient {
                index,
                to: descriptor.to.clone(),
            })?;

        if descriptor.gas_price > U256::from(u128::MAX) {
            return Err(SigningError::GasPriceOverflow { index });
        }

        let tx = TxLegacy {
            chain_id: Some(descriptor.chain_id),
            nonce: descriptor.nonce,
            gas_price: descriptor.gas_price.to::<u128>(),
            gas_limit: descriptor.gas_limit,
            to: TxKind::Call(to),
            value: descriptor.value,
            input: Bytes::from(input),
        };

        let signature = self
            .key
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|source| SigningError::Signature { index, source })?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(hex::encode(envelope.encoded_2718()))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Decode a hex payload, tolerating an optional `0x` prefix.
pub fn decode_payload(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let data = data.trim();
    hex::decode(data.strip_prefix("0x").unwrap_or(data))
}
