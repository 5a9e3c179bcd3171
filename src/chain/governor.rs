//! Governor, Votes token and Timelock access
//!
//! [`GovernanceChain`] is the seam between the service and the chain. The
//! production implementation, [`RpcGovernance`], ABI-encodes calls and sends
//! them over JSON-RPC; tests substitute an in-memory contract.

use super::abi::{encode_call, AbiReader, Token};
use super::keccak256;
use super::proposal::ProposalActions;
use super::rpc::{JsonRpcClient, TransactionReceipt};
use super::types::{Address, U256};
use super::ChainError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Governor proposal lifecycle as returned by `state(uint256)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalState {
    Pending,
    Active,
    Canceled,
    Defeated,
    Succeeded,
    Queued,
    Expired,
    Executed,
}

impl ProposalState {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => ProposalState::Pending,
            1 => ProposalState::Active,
            2 => ProposalState::Canceled,
            3 => ProposalState::Defeated,
            4 => ProposalState::Succeeded,
            5 => ProposalState::Queued,
            6 => ProposalState::Expired,
            7 => ProposalState::Executed,
            _ => return None,
        })
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProposalState::Pending => "PENDING",
            ProposalState::Active => "ACTIVE",
            ProposalState::Canceled => "CANCELED",
            ProposalState::Defeated => "DEFEATED",
            ProposalState::Succeeded => "SUCCEEDED",
            ProposalState::Queued => "QUEUED",
            ProposalState::Expired => "EXPIRED",
            ProposalState::Executed => "EXECUTED",
        }
    }
}

/// Vote support values of `castVote(uint256,uint8)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoteType {
    Against = 0,
    For = 1,
    Abstain = 2,
}

impl VoteType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(VoteType::Against),
            1 => Some(VoteType::For),
            2 => Some(VoteType::Abstain),
            _ => None,
        }
    }
}

/// Tally from `proposalVotes(uint256)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProposalVotes {
    pub against_votes: U256,
    pub for_votes: U256,
    pub abstain_votes: U256,
}

/// Stored parameters from `proposalDetailsAt(uint256)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDetails {
    pub proposal_id: U256,
    pub actions: ProposalActions,
    pub description_hash: [u8; 32],
}

/// Confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxConfirmation {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Contract addresses of one governance deployment
#[derive(Debug, Clone, Copy)]
pub struct ContractAddresses {
    pub governor: Address,
    pub token: Address,
    pub timelock: Address,
}

pub fn proposer_role() -> [u8; 32] {
    keccak256(b"PROPOSER_ROLE")
}

pub fn executor_role() -> [u8; 32] {
    keccak256(b"EXECUTOR_ROLE")
}

#[async_trait]
pub trait GovernanceChain: Send + Sync {
    fn contracts(&self) -> ContractAddresses;

    // Governor reads
    async fn proposal_id(
        &self,
        actions: &ProposalActions,
        description_hash: [u8; 32],
    ) -> Result<U256, ChainError>;
    async fn state(&self, proposal_id: U256) -> Result<ProposalState, ChainError>;
    async fn proposal_votes(&self, proposal_id: U256) -> Result<ProposalVotes, ChainError>;
    async fn proposal_snapshot(&self, proposal_id: U256) -> Result<U256, ChainError>;
    async fn proposal_deadline(&self, proposal_id: U256) -> Result<U256, ChainError>;
    async fn quorum(&self, timepoint: U256) -> Result<U256, ChainError>;
    async fn has_voted(&self, proposal_id: U256, account: Address) -> Result<bool, ChainError>;
    async fn proposal_count(&self) -> Result<u64, ChainError>;
    async fn proposal_details_at(&self, index: u64) -> Result<ProposalDetails, ChainError>;

    // Governor writes; each returns the transaction hash
    async fn propose(
        &self,
        from: Address,
        actions: &ProposalActions,
        description: &str,
    ) -> Result<String, ChainError>;
    async fn cast_vote(
        &self,
        from: Address,
        proposal_id: U256,
        support: VoteType,
    ) -> Result<String, ChainError>;
    async fn queue(&self, from: Address, proposal_id: U256) -> Result<String, ChainError>;
    async fn execute(&self, from: Address, proposal_id: U256) -> Result<String, ChainError>;

    /// Block until the transaction is mined; a reverted transaction is an error
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError>;

    // Votes token
    async fn balance_of(&self, account: Address) -> Result<U256, ChainError>;
    async fn get_votes(&self, account: Address) -> Result<U256, ChainError>;
    async fn get_past_votes(&self, account: Address, timepoint: U256) -> Result<U256, ChainError>;
    async fn token_symbol(&self) -> Result<String, ChainError>;
    async fn delegate(&self, from: Address, delegatee: Address) -> Result<String, ChainError>;

    // Timelock
    async fn has_role(&self, role: [u8; 32], account: Address) -> Result<bool, ChainError>;
    async fn grant_role(
        &self,
        from: Address,
        role: [u8; 32],
        account: Address,
    ) -> Result<String, ChainError>;
}

/// Governance contracts reached through a JSON-RPC node
pub struct RpcGovernance {
    rpc: JsonRpcClient,
    contracts: ContractAddresses,
    poll_interval: Duration,
    max_polls: u32,
}

impl RpcGovernance {
    pub fn new(
        rpc: JsonRpcClient,
        contracts: ContractAddresses,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Self {
        Self {
            rpc,
            contracts,
            poll_interval,
            max_polls,
        }
    }

    async fn read(&self, to: Address, signature: &str, args: &[Token]) -> Result<Vec<u8>, ChainError> {
        debug!(%to, signature, "contract read");
        self.rpc.call(to, &encode_call(signature, args)).await
    }

    async fn read_uint(&self, to: Address, signature: &str, args: &[Token]) -> Result<U256, ChainError> {
        let data = self.read(to, signature, args).await?;
        Ok(AbiReader::new(&data).uint(0)?)
    }

    async fn write(
        &self,
        from: Address,
        to: Address,
        signature: &str,
        args: &[Token],
    ) -> Result<String, ChainError> {
        let tx_hash = self
            .rpc
            .send_transaction(from, to, &encode_call(signature, args))
            .await?;
        info!(%from, %to, signature, tx_hash = %tx_hash, "transaction sent");
        Ok(tx_hash)
    }
}

#[async_trait]
impl GovernanceChain for RpcGovernance {
    fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    async fn proposal_id(
        &self,
        actions: &ProposalActions,
        description_hash: [u8; 32],
    ) -> Result<U256, ChainError> {
        self.read_uint(
            self.contracts.governor,
            "getProposalId(address[],uint256[],bytes[],bytes32)",
            &[
                actions.targets_token(),
                actions.values_token(),
                actions.calldatas_token(),
                Token::FixedBytes32(description_hash),
            ],
        )
        .await
    }

    async fn state(&self, proposal_id: U256) -> Result<ProposalState, ChainError> {
        let raw = self
            .read_uint(self.contracts.governor, "state(uint256)", &[Token::Uint(proposal_id)])
            .await?;
        raw.to_u64()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(ProposalState::from_u8)
            .ok_or_else(|| ChainError::Decode(format!("unknown proposal state {}", raw)))
    }

    async fn proposal_votes(&self, proposal_id: U256) -> Result<ProposalVotes, ChainError> {
        let data = self
            .read(self.contracts.governor, "proposalVotes(uint256)", &[Token::Uint(proposal_id)])
            .await?;
        let reader = AbiReader::new(&data);
        Ok(ProposalVotes {
            against_votes: reader.uint(0)?,
            for_votes: reader.uint(1)?,
            abstain_votes: reader.uint(2)?,
        })
    }

    async fn proposal_snapshot(&self, proposal_id: U256) -> Result<U256, ChainError> {
        self.read_uint(self.contracts.governor, "proposalSnapshot(uint256)", &[Token::Uint(proposal_id)])
            .await
    }

    async fn proposal_deadline(&self, proposal_id: U256) -> Result<U256, ChainError> {
        self.read_uint(self.contracts.governor, "proposalDeadline(uint256)", &[Token::Uint(proposal_id)])
            .await
    }

    async fn quorum(&self, timepoint: U256) -> Result<U256, ChainError> {
        self.read_uint(self.contracts.governor, "quorum(uint256)", &[Token::Uint(timepoint)])
            .await
    }

    async fn has_voted(&self, proposal_id: U256, account: Address) -> Result<bool, ChainError> {
        let data = self
            .read(
                self.contracts.governor,
                "hasVoted(uint256,address)",
                &[Token::Uint(proposal_id), Token::Address(account)],
            )
            .await?;
        Ok(AbiReader::new(&data).bool(0)?)
    }

    async fn proposal_count(&self) -> Result<u64, ChainError> {
        let count = self
            .read_uint(self.contracts.governor, "proposalCount()", &[])
            .await?;
        count
            .to_u64()
            .ok_or_else(|| ChainError::Decode(format!("proposal count out of range: {}", count)))
    }

    async fn proposal_details_at(&self, index: u64) -> Result<ProposalDetails, ChainError> {
        let data = self
            .read(
                self.contracts.governor,
                "proposalDetailsAt(uint256)",
                &[Token::Uint(U256::from_u64(index))],
            )
            .await?;
        let reader = AbiReader::new(&data);
        // returns (uint256 proposalId, address[] targets, uint256[] values, bytes[] calldatas, bytes32 descriptionHash)
        let actions = ProposalActions {
            targets: reader.address_array(1)?,
            values: reader.uint_array(2)?,
            calldatas: reader.bytes_array(3)?,
        };
        Ok(ProposalDetails {
            proposal_id: reader.uint(0)?,
            actions,
            description_hash: reader.bytes32(4)?,
        })
    }

    async fn propose(
        &self,
        from: Address,
        actions: &ProposalActions,
        description: &str,
    ) -> Result<String, ChainError> {
        self.write(
            from,
            self.contracts.governor,
            "propose(address[],uint256[],bytes[],string)",
            &[
                actions.targets_token(),
                actions.values_token(),
                actions.calldatas_token(),
                Token::String(description.to_string()),
            ],
        )
        .await
    }

    async fn cast_vote(
        &self,
        from: Address,
        proposal_id: U256,
        support: VoteType,
    ) -> Result<String, ChainError> {
        self.write(
            from,
            self.contracts.governor,
            "castVote(uint256,uint8)",
            &[
                Token::Uint(proposal_id),
                Token::Uint(U256::from_u64(support as u64)),
            ],
        )
        .await
    }

    async fn queue(&self, from: Address, proposal_id: U256) -> Result<String, ChainError> {
        self.write(from, self.contracts.governor, "queue(uint256)", &[Token::Uint(proposal_id)])
            .await
    }

    async fn execute(&self, from: Address, proposal_id: U256) -> Result<String, ChainError> {
        self.write(from, self.contracts.governor, "execute(uint256)", &[Token::Uint(proposal_id)])
            .await
    }

    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError> {
        for attempt in 0..self.max_polls {
            match self.rpc.transaction_receipt(tx_hash).await? {
                Some(receipt) => return confirmation_from(receipt),
                None => {
                    debug!(tx_hash, attempt, "receipt not available yet");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        warn!(tx_hash, polls = self.max_polls, "transaction not confirmed in time");
        Err(ChainError::ConfirmationTimeout {
            tx_hash: tx_hash.to_string(),
        })
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        self.read_uint(self.contracts.token, "balanceOf(address)", &[Token::Address(account)])
            .await
    }

    async fn get_votes(&self, account: Address) -> Result<U256, ChainError> {
        self.read_uint(self.contracts.token, "getVotes(address)", &[Token::Address(account)])
            .await
    }

    async fn get_past_votes(&self, account: Address, timepoint: U256) -> Result<U256, ChainError> {
        self.read_uint(
            self.contracts.token,
            "getPastVotes(address,uint256)",
            &[Token::Address(account), Token::Uint(timepoint)],
        )
        .await
    }

    async fn token_symbol(&self) -> Result<String, ChainError> {
        let data = self.read(self.contracts.token, "symbol()", &[]).await?;
        Ok(AbiReader::new(&data).string(0)?)
    }

    async fn delegate(&self, from: Address, delegatee: Address) -> Result<String, ChainError> {
        self.write(from, self.contracts.token, "delegate(address)", &[Token::Address(delegatee)])
            .await
    }

    async fn has_role(&self, role: [u8; 32], account: Address) -> Result<bool, ChainError> {
        let data = self
            .read(
                self.contracts.timelock,
                "hasRole(bytes32,address)",
                &[Token::FixedBytes32(role), Token::Address(account)],
            )
            .await?;
        Ok(AbiReader::new(&data).bool(0)?)
    }

    async fn grant_role(
        &self,
        from: Address,
        role: [u8; 32],
        account: Address,
    ) -> Result<String, ChainError> {
        self.write(
            from,
            self.contracts.timelock,
            "grantRole(bytes32,address)",
            &[Token::FixedBytes32(role), Token::Address(account)],
        )
        .await
    }
}

fn confirmation_from(receipt: TransactionReceipt) -> Result<TxConfirmation, ChainError> {
    if !receipt.succeeded() {
        return Err(ChainError::Reverted {
            tx_hash: receipt.transaction_hash,
        });
    }
    Ok(TxConfirmation {
        block_number: receipt.block(),
        tx_hash: receipt.transaction_hash,
    })
}

/// Make sure the Governor can queue and execute through the Timelock,
/// granting whichever role is missing from `admin`
pub async fn ensure_timelock_roles(
    chain: &dyn GovernanceChain,
    admin: Address,
) -> Result<Vec<String>, ChainError> {
    let governor = chain.contracts().governor;
    let mut granted = Vec::new();

    for (name, role) in [("EXECUTOR_ROLE", executor_role()), ("PROPOSER_ROLE", proposer_role())] {
        if chain.has_role(role, governor).await? {
            debug!(role = name, %governor, "timelock role already granted");
            continue;
        }

        let tx_hash = chain.grant_role(admin, role, governor).await?;
        chain.wait_for_confirmation(&tx_hash).await?;
        info!(role = name, %governor, tx_hash = %tx_hash, "timelock role granted");
        granted.push(name.to_string());
    }

    Ok(granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockGovernance;

    #[test]
    fn test_state_codes() {
        assert_eq!(ProposalState::from_u8(0), Some(ProposalState::Pending));
        assert_eq!(ProposalState::from_u8(7), Some(ProposalState::Executed));
        assert_eq!(ProposalState::from_u8(8), None);
        assert_eq!(ProposalState::Queued.label(), "QUEUED");
        assert_eq!(ProposalState::Succeeded.as_u8(), 4);
    }

    #[test]
    fn test_reverted_receipt_is_an_error() {
        let receipt = TransactionReceipt {
            transaction_hash: "0xdead".to_string(),
            block_number: Some("0x2".to_string()),
            status: Some("0x0".to_string()),
        };
        assert!(matches!(
            confirmation_from(receipt),
            Err(ChainError::Reverted { .. })
        ));
    }

    #[tokio::test]
    async fn test_ensure_timelock_roles_grants_only_missing_roles() {
        let chain = MockGovernance::new();
        let admin: Address = "0x00000000000000000000000000000000000000ad".parse().unwrap();
        chain
            .grant_role(admin, executor_role(), chain.contracts().governor)
            .await
            .unwrap();

        let granted = ensure_timelock_roles(&chain, admin).await.unwrap();
        assert_eq!(granted, vec!["PROPOSER_ROLE".to_string()]);

        let again = ensure_timelock_roles(&chain, admin).await.unwrap();
        assert!(again.is_empty());
    }
}
