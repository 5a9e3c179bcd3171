//! In-memory governance contracts for tests
//!
//! Derives proposal ids with the same `hashProposal` encoding the Governor
//! uses, records votes per address and lets tests inject RPC failures and
//! reverted transactions.

use super::governor::{
    ContractAddresses, GovernanceChain, ProposalDetails, ProposalState, ProposalVotes,
    TxConfirmation, VoteType,
};
use super::abi::{encode_call, Token};
use super::proposal::{hash_proposal, ProposalActions};
use super::rpc::revert_error;
use super::{description_hash, Address, ChainError, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

struct MockProposal {
    actions: ProposalActions,
    description_hash: [u8; 32],
    state: ProposalState,
    votes: ProposalVotes,
    voters: HashSet<Address>,
}

#[derive(Default)]
struct MockState {
    proposals: HashMap<U256, MockProposal>,
    order: Vec<U256>,
    roles: HashSet<([u8; 32], Address)>,
    balances: HashMap<Address, U256>,
    delegated: HashSet<Address>,
    failed_txs: HashSet<String>,
}

pub struct MockGovernance {
    contracts: ContractAddresses,
    state: Mutex<MockState>,
    tx_counter: AtomicUsize,
    fail_reads: AtomicBool,
    fail_propose: AtomicBool,
    revert_next: AtomicBool,
    pub propose_calls: AtomicUsize,
    pub vote_calls: AtomicUsize,
}

impl MockGovernance {
    pub fn new() -> Self {
        Self {
            contracts: ContractAddresses {
                governor: address_from_byte(0xc0),
                token: address_from_byte(0xe7),
                timelock: address_from_byte(0x9f),
            },
            state: Mutex::new(MockState::default()),
            tx_counter: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_propose: AtomicBool::new(false),
            revert_next: AtomicBool::new(false),
            propose_calls: AtomicUsize::new(0),
            vote_calls: AtomicUsize::new(0),
        }
    }

    /// Every read call fails as if the node were down
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// `propose` is rejected by the node (wallet rejection, gas estimation revert)
    pub fn fail_propose(&self, fail: bool) {
        self.fail_propose.store(fail, Ordering::SeqCst);
    }

    /// The next write is mined but reverts
    pub fn revert_next(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    pub fn set_state(&self, proposal_id: U256, state: ProposalState) {
        if let Ok(mut guard) = self.state.lock() {
            if let Some(p) = guard.proposals.get_mut(&proposal_id) {
                p.state = state;
            }
        }
    }

    pub fn set_balance(&self, account: Address, balance: U256) {
        if let Ok(mut guard) = self.state.lock() {
            guard.balances.insert(account, balance);
        }
    }

    pub fn exists(&self, proposal_id: U256) -> bool {
        self.state
            .lock()
            .map(|g| g.proposals.contains_key(&proposal_id))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, ChainError> {
        self.state
            .lock()
            .map_err(|e| ChainError::Unavailable(format!("mutex poisoned: {}", e)))
    }

    fn check_reads(&self) -> Result<(), ChainError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("mock node unreachable".to_string()));
        }
        Ok(())
    }

    fn next_tx_hash(&self) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("0x{:064x}", n)
    }

    /// Allocate a tx hash; a pending revert marks it failed and skips `apply`
    fn send(&self, apply: impl FnOnce(&mut MockState) -> Result<(), ChainError>) -> Result<String, ChainError> {
        let tx_hash = self.next_tx_hash();
        let mut guard = self.lock()?;
        if self.revert_next.swap(false, Ordering::SeqCst) {
            guard.failed_txs.insert(tx_hash.clone());
            return Ok(tx_hash);
        }
        apply(&mut guard)?;
        Ok(tx_hash)
    }

    fn proposal<'a>(state: &'a mut MockState, id: &U256) -> Result<&'a mut MockProposal, ChainError> {
        state.proposals.get_mut(id).ok_or_else(|| nonexistent(*id))
    }
}

impl Default for MockGovernance {
    fn default() -> Self {
        Self::new()
    }
}

fn address_from_byte(b: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = b;
    Address(bytes)
}

/// Revert with the custom error `signature`, shaped as a node reports it
fn revert(signature: &str, args: &[Token]) -> ChainError {
    revert_error(&encode_call(signature, args))
}

fn nonexistent(proposal_id: U256) -> ChainError {
    revert("GovernorNonexistentProposal(uint256)", &[Token::Uint(proposal_id)])
}

fn unexpected_state(proposal_id: U256, current: ProposalState) -> ChainError {
    revert(
        "GovernorUnexpectedProposalState(uint256,uint8,bytes32)",
        &[
            Token::Uint(proposal_id),
            Token::Uint(U256::from_u64(u64::from(current.as_u8()))),
            Token::FixedBytes32([0u8; 32]),
        ],
    )
}

#[async_trait]
impl GovernanceChain for MockGovernance {
    fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    async fn proposal_id(
        &self,
        actions: &ProposalActions,
        description_hash: [u8; 32],
    ) -> Result<U256, ChainError> {
        self.check_reads()?;
        Ok(hash_proposal(actions, description_hash))
    }

    async fn state(&self, proposal_id: U256) -> Result<ProposalState, ChainError> {
        self.check_reads()?;
        let mut guard = self.lock()?;
        Ok(Self::proposal(&mut guard, &proposal_id)?.state)
    }

    async fn proposal_votes(&self, proposal_id: U256) -> Result<ProposalVotes, ChainError> {
        self.check_reads()?;
        let mut guard = self.lock()?;
        Ok(Self::proposal(&mut guard, &proposal_id)?.votes)
    }

    async fn proposal_snapshot(&self, proposal_id: U256) -> Result<U256, ChainError> {
        self.check_reads()?;
        let mut guard = self.lock()?;
        Self::proposal(&mut guard, &proposal_id)?;
        Ok(U256::from_u64(10))
    }

    async fn proposal_deadline(&self, proposal_id: U256) -> Result<U256, ChainError> {
        self.check_reads()?;
        let mut guard = self.lock()?;
        Self::proposal(&mut guard, &proposal_id)?;
        Ok(U256::from_u64(60))
    }

    async fn quorum(&self, _timepoint: U256) -> Result<U256, ChainError> {
        self.check_reads()?;
        Ok(U256::from_u64(4))
    }

    async fn has_voted(&self, proposal_id: U256, account: Address) -> Result<bool, ChainError> {
        self.check_reads()?;
        let mut guard = self.lock()?;
        Ok(Self::proposal(&mut guard, &proposal_id)?.voters.contains(&account))
    }

    async fn proposal_count(&self) -> Result<u64, ChainError> {
        self.check_reads()?;
        Ok(self.lock()?.order.len() as u64)
    }

    async fn proposal_details_at(&self, index: u64) -> Result<ProposalDetails, ChainError> {
        self.check_reads()?;
        let guard = self.lock()?;
        let id = guard
            .order
            .get(index as usize)
            .copied()
            .ok_or_else(|| revert("Panic(uint256)", &[Token::Uint(U256::from_u64(0x32))]))?;
        let p = guard
            .proposals
            .get(&id)
            .ok_or_else(|| nonexistent(id))?;
        Ok(ProposalDetails {
            proposal_id: id,
            actions: p.actions.clone(),
            description_hash: p.description_hash,
        })
    }

    async fn propose(
        &self,
        _from: Address,
        actions: &ProposalActions,
        description: &str,
    ) -> Result<String, ChainError> {
        self.propose_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_propose.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc {
                code: 4001,
                message: "User rejected the request".to_string(),
                reason: None,
            });
        }

        let hash = description_hash(description);
        let id = hash_proposal(actions, hash);
        let actions = actions.clone();
        self.send(move |state| {
            if let Some(existing) = state.proposals.get(&id) {
                return Err(unexpected_state(id, existing.state));
            }
            state.order.push(id);
            state.proposals.insert(
                id,
                MockProposal {
                    actions,
                    description_hash: hash,
                    state: ProposalState::Pending,
                    votes: ProposalVotes::default(),
                    voters: HashSet::new(),
                },
            );
            Ok(())
        })
    }

    async fn cast_vote(
        &self,
        from: Address,
        proposal_id: U256,
        support: VoteType,
    ) -> Result<String, ChainError> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        self.send(move |state| {
            let weight = state.balances.get(&from).copied().unwrap_or(U256::from_u64(1));
            let p = Self::proposal(state, &proposal_id)?;
            if p.state != ProposalState::Active {
                return Err(unexpected_state(proposal_id, p.state));
            }
            if !p.voters.insert(from) {
                return Err(revert("GovernorAlreadyCastVote(address)", &[Token::Address(from)]));
            }
            match support {
                VoteType::Against => p.votes.against_votes = weight,
                VoteType::For => p.votes.for_votes = weight,
                VoteType::Abstain => p.votes.abstain_votes = weight,
            }
            Ok(())
        })
    }

    async fn queue(&self, _from: Address, proposal_id: U256) -> Result<String, ChainError> {
        self.send(move |state| {
            let p = Self::proposal(state, &proposal_id)?;
            if p.state != ProposalState::Succeeded {
                return Err(unexpected_state(proposal_id, p.state));
            }
            p.state = ProposalState::Queued;
            Ok(())
        })
    }

    async fn execute(&self, _from: Address, proposal_id: U256) -> Result<String, ChainError> {
        self.send(move |state| {
            let p = Self::proposal(state, &proposal_id)?;
            if p.state != ProposalState::Queued {
                return Err(unexpected_state(proposal_id, p.state));
            }
            p.state = ProposalState::Executed;
            Ok(())
        })
    }

    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError> {
        if self.lock()?.failed_txs.contains(tx_hash) {
            return Err(ChainError::Reverted {
                tx_hash: tx_hash.to_string(),
            });
        }
        Ok(TxConfirmation {
            tx_hash: tx_hash.to_string(),
            block_number: Some(self.tx_counter.load(Ordering::SeqCst) as u64),
        })
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        self.check_reads()?;
        Ok(self.lock()?.balances.get(&account).copied().unwrap_or_default())
    }

    async fn get_votes(&self, account: Address) -> Result<U256, ChainError> {
        self.check_reads()?;
        let guard = self.lock()?;
        if guard.delegated.contains(&account) {
            Ok(guard.balances.get(&account).copied().unwrap_or_default())
        } else {
            Ok(U256::ZERO)
        }
    }

    async fn get_past_votes(&self, account: Address, _timepoint: U256) -> Result<U256, ChainError> {
        self.get_votes(account).await
    }

    async fn token_symbol(&self) -> Result<String, ChainError> {
        self.check_reads()?;
        Ok("MTK".to_string())
    }

    async fn delegate(&self, from: Address, delegatee: Address) -> Result<String, ChainError> {
        self.send(move |state| {
            if from == delegatee {
                state.delegated.insert(from);
            }
            Ok(())
        })
    }

    async fn has_role(&self, role: [u8; 32], account: Address) -> Result<bool, ChainError> {
        self.check_reads()?;
        Ok(self.lock()?.roles.contains(&(role, account)))
    }

    async fn grant_role(
        &self,
        _from: Address,
        role: [u8; 32],
        account: Address,
    ) -> Result<String, ChainError> {
        self.send(move |state| {
            state.roles.insert((role, account));
            Ok(())
        })
    }
}
