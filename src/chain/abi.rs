//! Minimal Solidity ABI codec
//!
//! Covers the argument and return shapes of the Governor, Votes token and
//! Timelock calls this service makes. Head/tail layout per the Solidity ABI
//! specification: static values occupy one 32-byte word in the head, dynamic
//! values are referenced by an offset into the tail.

use super::keccak256;
use super::types::{Address, U256};
use thiserror::Error;

const WORD: usize = 32;

/// Selector of the standard `Error(string)` revert payload
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Selector of the compiler's `Panic(uint256)` revert payload
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Custom errors raised by the OpenZeppelin 5 Governor, Timelock and Votes
/// contracts, reported by name when they come back as revert data
const CUSTOM_ERRORS: &[&str] = &[
    "GovernorInvalidProposalLength(uint256,uint256,uint256)",
    "GovernorAlreadyCastVote(address)",
    "GovernorDisabledDeposit()",
    "GovernorOnlyProposer(address)",
    "GovernorOnlyExecutor(address)",
    "GovernorNonexistentProposal(uint256)",
    "GovernorUnexpectedProposalState(uint256,uint8,bytes32)",
    "GovernorInvalidVotingPeriod(uint256)",
    "GovernorInsufficientProposerVotes(address,uint256,uint256)",
    "GovernorRestrictedProposer(address)",
    "GovernorInvalidVoteType()",
    "GovernorInvalidVoteParams()",
    "GovernorQueueNotImplemented()",
    "GovernorNotQueuedProposal(uint256)",
    "GovernorAlreadyQueuedProposal(uint256)",
    "GovernorInvalidSignature(address)",
    "GovernorUnableToCancel(uint256,address)",
    "TimelockInvalidOperationLength(uint256,uint256,uint256)",
    "TimelockInsufficientDelay(uint256,uint256)",
    "TimelockUnexpectedOperationState(bytes32,bytes32)",
    "TimelockUnexecutedPredecessor(bytes32)",
    "TimelockUnauthorizedCaller(address)",
    "AccessControlUnauthorizedAccount(address,bytes32)",
    "AccessControlBadConfirmation()",
    "ERC5805FutureLookup(uint256,uint48)",
    "VotesExpiredSignature(uint256)",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data too short: need {needed} bytes, have {available}")]
    OutOfBounds { needed: usize, available: usize },

    #[error("offset or length does not fit in usize")]
    Overflow,

    #[error("invalid utf-8 in string value")]
    InvalidUtf8,

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// A single ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    Bool(bool),
    FixedBytes32([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::Bytes(_) | Token::String(_) | Token::Array(_))
    }
}

/// First four bytes of `keccak256(signature)`
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for `signature` applied to `args`
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode(args));
    out
}

/// `abi.encode(tokens...)`
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend(uint_word((head_len + tail.len()) as u64));
            tail.extend(encode_dynamic(token));
        } else {
            head.extend(encode_static(token));
        }
    }

    head.extend(tail);
    head
}

fn encode_static(token: &Token) -> [u8; 32] {
    let mut word = [0u8; 32];
    match token {
        Token::Address(addr) => word[12..].copy_from_slice(addr.as_bytes()),
        Token::Uint(value) => word = value.to_be_bytes(),
        Token::Bool(flag) => word[31] = u8::from(*flag),
        Token::FixedBytes32(bytes) => word = *bytes,
        // dynamic tokens never reach here
        Token::Bytes(_) | Token::String(_) | Token::Array(_) => {}
    }
    word
}

fn encode_dynamic(token: &Token) -> Vec<u8> {
    match token {
        Token::Bytes(bytes) => encode_bytes(bytes),
        Token::String(s) => encode_bytes(s.as_bytes()),
        Token::Array(items) => {
            let mut out = uint_word(items.len() as u64).to_vec();
            out.extend(encode(items));
            out
        }
        other => encode_static(other).to_vec(),
    }
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = uint_word(bytes.len() as u64).to_vec();
    out.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

fn uint_word(value: u64) -> [u8; 32] {
    U256::from_u64(value).to_be_bytes()
}

/// Random-access reader over ABI-encoded return data
pub struct AbiReader<'a> {
    data: &'a [u8],
}

impl<'a> AbiReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], AbiError> {
        let end = start.checked_add(len).ok_or(AbiError::Overflow)?;
        self.data.get(start..end).ok_or(AbiError::OutOfBounds {
            needed: end,
            available: self.data.len(),
        })
    }

    fn word(&self, pos: usize) -> Result<[u8; 32], AbiError> {
        let mut word = [0u8; 32];
        word.copy_from_slice(self.slice(pos, WORD)?);
        Ok(word)
    }

    fn head(index: usize) -> Result<usize, AbiError> {
        index.checked_mul(WORD).ok_or(AbiError::Overflow)
    }

    fn usize_at(&self, pos: usize) -> Result<usize, AbiError> {
        U256::from_be_bytes(self.word(pos)?)
            .to_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or(AbiError::Overflow)
    }

    /// `uint256` in head slot `index`
    pub fn uint(&self, index: usize) -> Result<U256, AbiError> {
        Ok(U256::from_be_bytes(self.word(Self::head(index)?)?))
    }

    pub fn bool(&self, index: usize) -> Result<bool, AbiError> {
        Ok(!self.uint(index)?.is_zero())
    }

    pub fn address(&self, index: usize) -> Result<Address, AbiError> {
        Ok(address_from_word(&self.word(Self::head(index)?)?))
    }

    pub fn bytes32(&self, index: usize) -> Result<[u8; 32], AbiError> {
        self.word(Self::head(index)?)
    }

    /// `string` referenced from head slot `index`
    pub fn string(&self, index: usize) -> Result<String, AbiError> {
        let bytes = self.bytes(index)?;
        String::from_utf8(bytes).map_err(|_| AbiError::InvalidUtf8)
    }

    /// `bytes` referenced from head slot `index`
    pub fn bytes(&self, index: usize) -> Result<Vec<u8>, AbiError> {
        let pos = self.usize_at(Self::head(index)?)?;
        self.bytes_at(pos)
    }

    fn bytes_at(&self, pos: usize) -> Result<Vec<u8>, AbiError> {
        let len = self.usize_at(pos)?;
        let start = pos.checked_add(WORD).ok_or(AbiError::Overflow)?;
        Ok(self.slice(start, len)?.to_vec())
    }

    pub fn address_array(&self, index: usize) -> Result<Vec<Address>, AbiError> {
        self.static_array(index, |word| address_from_word(&word))
    }

    pub fn uint_array(&self, index: usize) -> Result<Vec<U256>, AbiError> {
        self.static_array(index, U256::from_be_bytes)
    }

    fn static_array<T>(
        &self,
        index: usize,
        convert: impl Fn([u8; 32]) -> T,
    ) -> Result<Vec<T>, AbiError> {
        let pos = self.usize_at(Self::head(index)?)?;
        let len = self.usize_at(pos)?;
        let base = pos.checked_add(WORD).ok_or(AbiError::Overflow)?;
        (0..len)
            .map(|i| {
                let at = base
                    .checked_add(Self::head(i)?)
                    .ok_or(AbiError::Overflow)?;
                self.word(at).map(&convert)
            })
            .collect()
    }

    /// `bytes[]` referenced from head slot `index`
    pub fn bytes_array(&self, index: usize) -> Result<Vec<Vec<u8>>, AbiError> {
        let pos = self.usize_at(Self::head(index)?)?;
        let len = self.usize_at(pos)?;
        let base = pos.checked_add(WORD).ok_or(AbiError::Overflow)?;
        (0..len)
            .map(|i| {
                let slot = base
                    .checked_add(Self::head(i)?)
                    .ok_or(AbiError::Overflow)?;
                let offset = self.usize_at(slot)?;
                self.bytes_at(base.checked_add(offset).ok_or(AbiError::Overflow)?)
            })
            .collect()
    }
}

fn address_from_word(word: &[u8; 32]) -> Address {
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    Address(out)
}

/// Human-readable reason of a revert payload: the message of
/// `Error(string)`, the code of `Panic(uint256)`, or the name of a known
/// custom error
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let (head, args) = data.split_first_chunk::<4>()?;
    if *head == ERROR_STRING_SELECTOR {
        return AbiReader::new(args).string(0).ok();
    }
    if *head == PANIC_SELECTOR {
        let code = AbiReader::new(args).uint(0).ok()?;
        return Some(format!("Panic({})", code.to_hex_quantity()));
    }
    CUSTOM_ERRORS
        .iter()
        .find(|signature| selector(signature) == *head)
        .and_then(|signature| signature.split('(').next())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("Error(string)")), "08c379a0");
    }

    #[test]
    fn test_encode_static_arguments() {
        let addr: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let data = encode_call(
            "transfer(address,uint256)",
            &[Token::Address(addr), Token::Uint(U256::from_u64(5))],
        );

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(data[4 + 31], 0xaa);
        assert_eq!(data[4 + 63], 5);
    }

    #[test]
    fn test_encode_string_layout() {
        let encoded = encode(&[Token::String("hi".to_string())]);

        // offset, length, padded data
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 0x20);
        assert_eq!(encoded[63], 2);
        assert_eq!(&encoded[64..66], b"hi");
        assert!(encoded[66..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_reader_decodes_proposal_details_shape() {
        let target: Address = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse().unwrap();
        let encoded = encode(&[
            Token::Array(vec![Token::Address(target)]),
            Token::Array(vec![Token::Uint(U256::from_u64(7))]),
            Token::Array(vec![Token::Bytes(vec![]), Token::Bytes(vec![1, 2, 3])]),
            Token::FixedBytes32([9u8; 32]),
        ]);

        let reader = AbiReader::new(&encoded);
        assert_eq!(reader.address_array(0).unwrap(), vec![target]);
        assert_eq!(reader.uint_array(1).unwrap(), vec![U256::from_u64(7)]);
        assert_eq!(reader.bytes_array(2).unwrap(), vec![vec![], vec![1, 2, 3]]);
        assert_eq!(reader.bytes32(3).unwrap(), [9u8; 32]);
    }

    #[test]
    fn test_revert_reason_names_custom_errors() {
        let data = encode_call(
            "GovernorNonexistentProposal(uint256)",
            &[Token::Uint(U256::from_u64(42))],
        );
        assert_eq!(
            decode_revert_reason(&data).as_deref(),
            Some("GovernorNonexistentProposal")
        );

        let data = encode_call(
            "GovernorInsufficientProposerVotes(address,uint256,uint256)",
            &[
                Token::Address(Address::ZERO),
                Token::Uint(U256::ZERO),
                Token::Uint(U256::from_u64(1)),
            ],
        );
        assert_eq!(
            decode_revert_reason(&data).as_deref(),
            Some("GovernorInsufficientProposerVotes")
        );

        let panic = encode_call("Panic(uint256)", &[Token::Uint(U256::from_u64(0x32))]);
        assert_eq!(decode_revert_reason(&panic).as_deref(), Some("Panic(0x32)"));

        assert_eq!(decode_revert_reason(&selector("Unknown()")), None);
        assert_eq!(decode_revert_reason(&[0x01, 0x02]), None);
    }

    #[test]
    fn test_bytes_array_rejects_huge_offsets() {
        // one-element bytes[] whose element offset is u64::MAX
        let mut data = Vec::new();
        data.extend(uint_word(0x20));
        data.extend(uint_word(1));
        data.extend(uint_word(u64::MAX));

        let reader = AbiReader::new(&data);
        assert_eq!(reader.bytes_array(0), Err(AbiError::Overflow));
    }

    #[test]
    fn test_reader_reports_short_data() {
        let reader = AbiReader::new(&[0u8; 10]);
        assert!(matches!(reader.uint(0), Err(AbiError::OutOfBounds { .. })));
    }

    #[test]
    fn test_decode_revert_reason() {
        let mut payload = ERROR_STRING_SELECTOR.to_vec();
        payload.extend(encode(&[Token::String(
            "Governor: proposer votes below proposal threshold".to_string(),
        )]));

        assert_eq!(
            decode_revert_reason(&payload).as_deref(),
            Some("Governor: proposer votes below proposal threshold")
        );
        assert_eq!(decode_revert_reason(&[1, 2, 3, 4]), None);
    }
}
