//! Primitive EVM value types
//!
//! `Address` and `U256` with the textual forms the JSON-RPC node and the
//! dashboard exchange: `0x`-prefixed hex for addresses, decimal for ids.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseValueError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("invalid uint256: {0}")]
    Uint(String),

    #[error("invalid hex data: {0}")]
    Hex(String),
}

/// 20-byte account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lower-case `0x` form, the normalized key used for user records
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ParseValueError::Address(s.to_string()))?;

        if digits.len() != 40 {
            return Err(ParseValueError::Address(s.to_string()));
        }

        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| ParseValueError::Address(s.to_string()))?;
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lower_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_lower_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_lower_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Unsigned 256-bit integer, four little-endian 64-bit limbs
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256([u64; 4]);

impl U256 {
    pub const ZERO: U256 = U256([0; 4]);

    pub fn from_u64(value: u64) -> Self {
        U256([value, 0, 0, 0])
    }

    pub fn from_u128(value: u128) -> Self {
        U256([value as u64, (value >> 64) as u64, 0, 0])
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let start = (3 - i) * 8;
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[start..start + 8]);
            *limb = u64::from_be_bytes(chunk);
        }
        U256(limbs)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.0.iter().enumerate() {
            let start = (3 - i) * 8;
            out[start..start + 8].copy_from_slice(&limb.to_be_bytes());
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|l| *l == 0)
    }

    /// Value as u64 when it fits
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[1..].iter().all(|l| *l == 0) {
            Some(self.0[0])
        } else {
            None
        }
    }

    /// Parse a decimal string such as the ids the Governor renders
    pub fn from_dec_str(s: &str) -> Result<Self, ParseValueError> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseValueError::Uint(s.to_string()));
        }

        let mut value = U256::ZERO;
        for b in s.bytes() {
            value = value
                .checked_mul_add(10, u64::from(b - b'0'))
                .ok_or_else(|| ParseValueError::Uint(s.to_string()))?;
        }
        Ok(value)
    }

    /// Parse a `0x`-prefixed hex quantity (JSON-RPC style, no padding required)
    pub fn from_hex_str(s: &str) -> Result<Self, ParseValueError> {
        let digits = s
            .trim()
            .strip_prefix("0x")
            .ok_or_else(|| ParseValueError::Uint(s.to_string()))?;

        if digits.is_empty() || digits.len() > 64 {
            return Err(ParseValueError::Uint(s.to_string()));
        }

        let padded = format!("{:0>64}", digits);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes)
            .map_err(|_| ParseValueError::Uint(s.to_string()))?;
        Ok(U256::from_be_bytes(bytes))
    }

    /// Minimal `0x` hex quantity as JSON-RPC expects it
    pub fn to_hex_quantity(&self) -> String {
        let encoded = hex::encode(self.to_be_bytes());
        let trimmed = encoded.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }

    fn checked_mul_add(&self, mul: u64, add: u64) -> Option<Self> {
        let mut out = [0u64; 4];
        let mut carry = u128::from(add);
        for (i, limb) in self.0.iter().enumerate() {
            let cur = u128::from(*limb) * u128::from(mul) + carry;
            out[i] = cur as u64;
            carry = cur >> 64;
        }
        if carry != 0 {
            None
        } else {
            Some(U256(out))
        }
    }

    fn div_rem_small(&self, divisor: u64) -> (Self, u64) {
        let mut out = [0u64; 4];
        let mut rem: u128 = 0;
        for i in (0..4).rev() {
            let cur = (rem << 64) | u128::from(self.0[i]);
            out[i] = (cur / u128::from(divisor)) as u64;
            rem = cur % u128::from(divisor);
        }
        (U256(out), rem as u64)
    }
}

impl Ord for U256 {
    /// Numeric order, most significant limb first
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }

        let mut digits = Vec::with_capacity(78);
        let mut value = *self;
        while !value.is_zero() {
            let (quotient, rem) = value.div_rem_small(10);
            digits.push(b'0' + rem as u8);
            value = quotient;
        }
        digits.reverse();
        // digits are ASCII by construction
        f.write_str(&String::from_utf8_lossy(&digits))
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

impl FromStr for U256 {
    type Err = ParseValueError;

    /// Accepts decimal or `0x` hex
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().starts_with("0x") {
            U256::from_hex_str(s)
        } else {
            U256::from_dec_str(s)
        }
    }
}

impl From<u64> for U256 {
    fn from(value: u64) -> Self {
        U256::from_u64(value)
    }
}

impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Number(n) => Ok(U256::from_u64(n)),
        }
    }
}

/// Decode `0x`-prefixed hex bytes; `0x` alone is empty calldata
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, ParseValueError> {
    let digits = s
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| ParseValueError::Hex(s.to_string()))?;
    hex::decode(digits).map_err(|_| ParseValueError::Hex(s.to_string()))
}

pub fn to_hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
