//! On-chain governance access
//!
//! The Governor, Votes token and Timelock contracts are consumed through
//! ABI-encoded JSON-RPC calls. Nothing here reimplements their semantics.

pub mod abi;
mod governor;
#[cfg(test)]
pub mod mock;
mod proposal;
mod rpc;
pub mod types;

pub use governor::{
    ensure_timelock_roles, ContractAddresses, GovernanceChain, ProposalDetails, ProposalState,
    ProposalVotes, RpcGovernance, TxConfirmation, VoteType,
};
pub use proposal::{
    combined_description, description_hash, hash_proposal, ActionError, ActionsPayload,
    ProposalActions,
};
pub use rpc::JsonRpcClient;
pub use types::{Address, U256};

use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Failure talking to the node or the contracts
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("RPC request timed out")]
    Timeout,

    #[error("RPC error {code}: {message}{}", fmt_reason(.reason))]
    Rpc {
        code: i64,
        message: String,
        reason: Option<String>,
    },

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    #[error("transaction {tx_hash} was not confirmed in time")]
    ConfirmationTimeout { tx_hash: String },

    #[error("failed to decode chain response: {0}")]
    Decode(String),
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(" ({})", r))
        .unwrap_or_default()
}

impl From<abi::AbiError> for ChainError {
    fn from(e: abi::AbiError) -> Self {
        ChainError::Decode(e.to_string())
    }
}

pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    hasher.finalize().into()
}
