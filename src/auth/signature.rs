//! Wallet signature verification
//!
//! Recovers the signer of an EIP-191 `personal_sign` message.

use crate::chain::types::parse_hex_bytes;
use crate::chain::{keccak256, Address};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),

    #[error("could not recover signer: {0}")]
    Recovery(String),
}

/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message.as_bytes());
    keccak256(data)
}

/// Address of the key that produced `signature` (r || s || v) over `message`
pub fn recover_address(message: &str, signature: &str) -> Result<Address, SignatureError> {
    let bytes = parse_hex_bytes(signature).map_err(|_| SignatureError::InvalidHex)?;
    if bytes.len() != 65 {
        return Err(SignatureError::InvalidLength(bytes.len()));
    }

    let sig = Signature::from_slice(&bytes[..64])
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    // wallets emit v as 27/28
    let v = bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(SignatureError::InvalidRecoveryId(v))?;

    let key = VerifyingKey::recover_from_prehash(&personal_message_hash(message), &sig, recovery_id)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    Ok(address_of(&key))
}

/// Last 20 bytes of the keccak hash of the uncompressed public key
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = PublicKey::from(key).to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}
