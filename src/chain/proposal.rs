//! Proposal parameters and the deterministic proposal identifier
//!
//! A Governor proposal is identified by
//! `uint256(keccak256(abi.encode(targets, values, calldatas, descriptionHash)))`.
//! Everything that feeds that hash lives here so the identifier read and the
//! `propose` transaction are always built from the same values.

use super::abi::{encode, Token};
use super::keccak256;
use super::types::{parse_hex_bytes, to_hex_bytes, Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("proposal must contain at least one action")]
    Empty,

    #[error("targets, values and calldatas must have the same length ({targets}, {values}, {calldatas})")]
    LengthMismatch {
        targets: usize,
        values: usize,
        calldatas: usize,
    },

    #[error("{0}")]
    Parse(String),
}

/// The executable part of a proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalActions {
    pub targets: Vec<Address>,
    pub values: Vec<U256>,
    pub calldatas: Vec<Vec<u8>>,
}

impl ProposalActions {
    /// Single no-op call to the proposer with zero value and empty calldata,
    /// the default "signalling" proposal of the dashboard
    pub fn signal(proposer: Address) -> Self {
        Self {
            targets: vec![proposer],
            values: vec![U256::ZERO],
            calldatas: vec![Vec::new()],
        }
    }

    pub fn new(
        targets: Vec<Address>,
        values: Vec<U256>,
        calldatas: Vec<Vec<u8>>,
    ) -> Result<Self, ActionError> {
        let actions = Self {
            targets,
            values,
            calldatas,
        };
        actions.validate()?;
        Ok(actions)
    }

    pub fn validate(&self) -> Result<(), ActionError> {
        if self.targets.is_empty() {
            return Err(ActionError::Empty);
        }
        if self.targets.len() != self.values.len() || self.targets.len() != self.calldatas.len() {
            return Err(ActionError::LengthMismatch {
                targets: self.targets.len(),
                values: self.values.len(),
                calldatas: self.calldatas.len(),
            });
        }
        Ok(())
    }

    pub fn targets_token(&self) -> Token {
        Token::Array(self.targets.iter().copied().map(Token::Address).collect())
    }

    pub fn values_token(&self) -> Token {
        Token::Array(self.values.iter().copied().map(Token::Uint).collect())
    }

    pub fn calldatas_token(&self) -> Token {
        Token::Array(self.calldatas.iter().cloned().map(Token::Bytes).collect())
    }
}

/// Wire form of proposal actions: hex addresses, decimal values, hex calldata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionsPayload {
    pub targets: Vec<String>,
    pub values: Vec<String>,
    pub calldatas: Vec<String>,
}

impl TryFrom<&ActionsPayload> for ProposalActions {
    type Error = ActionError;

    fn try_from(payload: &ActionsPayload) -> Result<Self, Self::Error> {
        let targets = payload
            .targets
            .iter()
            .map(|t| t.parse::<Address>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ActionError::Parse(e.to_string()))?;
        let values = payload
            .values
            .iter()
            .map(|v| v.parse::<U256>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ActionError::Parse(e.to_string()))?;
        let calldatas = payload
            .calldatas
            .iter()
            .map(|c| parse_hex_bytes(c))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ActionError::Parse(e.to_string()))?;

        ProposalActions::new(targets, values, calldatas)
    }
}

impl From<&ProposalActions> for ActionsPayload {
    fn from(actions: &ProposalActions) -> Self {
        Self {
            targets: actions.targets.iter().map(|t| t.to_lower_hex()).collect(),
            values: actions.values.iter().map(|v| v.to_string()).collect(),
            calldatas: actions.calldatas.iter().map(|c| to_hex_bytes(c)).collect(),
        }
    }
}

/// Description string submitted on-chain: title and body separated by a blank line
pub fn combined_description(title: &str, description: &str) -> String {
    format!("{}\n\n{}", title.trim(), description.trim())
}

pub fn description_hash(description: &str) -> [u8; 32] {
    keccak256(description.as_bytes())
}

/// Local equivalent of the Governor's `hashProposal`
pub fn hash_proposal(actions: &ProposalActions, description_hash: [u8; 32]) -> U256 {
    let encoded = encode(&[
        actions.targets_token(),
        actions.values_token(),
        actions.calldatas_token(),
        Token::FixedBytes32(description_hash),
    ]);
    U256::from_be_bytes(keccak256(&encoded))
}
