//! In-process signing of legacy (EIP-155) transactions with the oracle key.

use crate::abi::keccak256;
use crate::ledger::{LedgerError, LedgerResult, SignedTransaction};
use alloy::primitives::{Address, B256};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

/// Unsigned legacy transaction fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u64,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn from_bytes(secret: &[u8; 32]) -> LedgerResult<Self> {
        let key = SigningKey::from_bytes(secret.into())
            .map_err(|e| LedgerError::Signing(format!("invalid signing key: {}", e)))?;
        let point = key.verifying_key().as_affine().to_encoded_point(false);
        // Address is the last 20 bytes of keccak256 over the uncompressed point without its tag.
        let hash = keccak256(&point.as_bytes()[1..]);
        let address = Address::from_slice(&hash[12..]);
        Ok(Self { key, address })
    }

    /// Parse a 32-byte hex private key (with or without `0x`).
    pub fn from_hex(secret: &str) -> LedgerResult<Self> {
        let s = secret.trim();
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| LedgerError::Signing(format!("private key is not hex: {}", e)))?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| {
                LedgerError::Signing(format!("private key must be 32 bytes, got {}", bytes.len()))
            })?;
        Self::from_bytes(&secret)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_legacy(&self, tx: &LegacyTransaction) -> LedgerResult<SignedTransaction> {
        let unsigned = rlp_encode_unsigned_legacy(tx);
        let (signature, recovery_id) = self
            .key
            .sign_digest_recoverable(Keccak256::new_with_prefix(unsigned))
            .map_err(|e| LedgerError::Signing(format!("sign failed: {}", e)))?;

        let v: u64 = tx
            .chain_id
            .checked_mul(2)
            .and_then(|x| x.checked_add(35))
            .and_then(|x| x.checked_add(u64::from(recovery_id.to_byte())))
            .ok_or_else(|| LedgerError::Signing("v overflow".into()))?;

        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes[..].split_at(32);

        let mut signed = RlpStream::new();
        signed.begin_list(9);
        append_legacy_body(&mut signed, tx);
        signed.append(&v);
        signed.append(&trim_leading_zeros(r));
        signed.append(&trim_leading_zeros(s));
        let raw = signed.out().to_vec();
        let hash = B256::from(keccak256(&raw));
        Ok(SignedTransaction {
            raw,
            hash,
            nonce: tx.nonce,
        })
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn append_legacy_body(s: &mut RlpStream, tx: &LegacyTransaction) {
    s.append(&tx.nonce);
    s.append(&tx.gas_price);
    s.append(&tx.gas_limit);
    let to_slice: &[u8] = tx.to.as_slice();
    s.append(&to_slice);
    s.append(&tx.value);
    let data: &[u8] = &tx.data;
    s.append(&data);
}

/// EIP-155 unsigned payload: [nonce, gas_price, gas_limit, to, value, data, chain_id, 0, 0].
fn rlp_encode_unsigned_legacy(tx: &LegacyTransaction) -> Vec<u8> {
    let mut s = RlpStream::new();
    s.begin_list(9);
    append_legacy_body(&mut s, tx);
    s.append(&tx.chain_id);
    s.append(&0u8);
    s.append(&0u8);
    s.out().to_vec()
}

/// Trim leading zero bytes for RLP integer encoding. All-zero input yields an empty slice (0x80).
fn trim_leading_zeros(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|x| *x != 0).unwrap_or(b.len());
    &b[start..]
}
