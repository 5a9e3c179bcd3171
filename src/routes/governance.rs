//! Governor route handlers
//!
//! Live proposal state and the vote / queue / execute / delegate
//! transactions, sent from the authenticated address.

use super::AppJson;
use crate::auth::AuthUser;
use crate::chain::{
    ActionsPayload, Address, ChainError, ProposalState, ProposalVotes, TxConfirmation, VoteType,
    U256,
};
use crate::error::{conflict_error, not_found_error, validation_error, ApiResult, AppError};
use crate::models::{ApiResponse, CountedResponse};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

/// One proposal as stored by the Governor
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainProposal {
    pub proposal_id: U256,
    pub state: ProposalState,
    pub state_code: u8,
    pub actions: ActionsPayload,
    pub description_hash: String,
    /// Off-chain record with the same id, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Live view of one proposal
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStatus {
    pub proposal_id: U256,
    pub state: ProposalState,
    pub state_code: u8,
    pub votes: ProposalVotes,
    pub snapshot: U256,
    pub deadline: U256,
    pub quorum: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountVote>,
}

/// Participation of the `account` query parameter
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountVote {
    pub address: Address,
    pub has_voted: bool,
    /// Votes at the proposal snapshot
    pub voting_power: U256,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub account: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoteRequest {
    /// 0 = against, 1 = for, 2 = abstain
    #[validate(range(max = 2, message = "support must be 0 (against), 1 (for) or 2 (abstain)"))]
    pub support: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingPower {
    pub address: Address,
    pub balance: U256,
    pub votes: U256,
    pub symbol: String,
    pub delegated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub proposal_id: Option<U256>,
    #[serde(flatten)]
    pub confirmation: TxConfirmation,
}

fn parse_onchain_id(raw: &str) -> ApiResult<U256> {
    U256::from_dec_str(raw).map_err(|_| validation_error("onchainId must be a decimal uint256"))
}

fn parse_address(raw: &str) -> ApiResult<Address> {
    raw.parse()
        .map_err(|_| validation_error("Invalid Ethereum address"))
}

/// Reverts for an unknown proposal id become 404s
fn proposal_read_error(proposal_id: U256) -> impl Fn(ChainError) -> AppError {
    move |e| {
        let unknown = matches!(
            &e,
            ChainError::Rpc { reason: Some(reason), .. } if reason == "GovernorNonexistentProposal"
        );
        if unknown {
            not_found_error(format!("Proposal {} not found on-chain", proposal_id))
        } else {
            AppError::Chain(e)
        }
    }
}

/// GET /api/governance/proposals
pub async fn list_onchain_proposals(
    State(state): State<SharedState>,
) -> ApiResult<Json<CountedResponse<OnchainProposal>>> {
    let count = state.chain.proposal_count().await?;
    debug!(count, "reading on-chain proposals");

    let mut proposals = Vec::with_capacity(count as usize);
    // newest first
    for index in (0..count).rev() {
        let details = state.chain.proposal_details_at(index).await?;
        let proposal_state = state.chain.state(details.proposal_id).await?;
        let title = state
            .proposals
            .find_by_onchain_id(&details.proposal_id.to_string())
            .await?
            .map(|p| p.title);

        proposals.push(OnchainProposal {
            proposal_id: details.proposal_id,
            state: proposal_state,
            state_code: proposal_state.as_u8(),
            actions: ActionsPayload::from(&details.actions),
            description_hash: format!("0x{}", hex::encode(details.description_hash)),
            title,
        });
    }

    Ok(Json(CountedResponse::new(proposals)))
}

/// GET /api/governance/proposals/{onchain_id}
pub async fn get_onchain_proposal(
    State(state): State<SharedState>,
    Path(onchain_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<ApiResponse<ProposalStatus>>> {
    let proposal_id = parse_onchain_id(&onchain_id)?;
    let account = query.account.as_deref().map(parse_address).transpose()?;
    let chain = &state.chain;

    let proposal_state = chain
        .state(proposal_id)
        .await
        .map_err(proposal_read_error(proposal_id))?;
    let (votes, snapshot, deadline) = tokio::try_join!(
        chain.proposal_votes(proposal_id),
        chain.proposal_snapshot(proposal_id),
        chain.proposal_deadline(proposal_id),
    )?;
    let quorum = chain.quorum(snapshot).await?;

    let account = match account {
        Some(address) => {
            let (has_voted, voting_power) = tokio::try_join!(
                chain.has_voted(proposal_id, address),
                chain.get_past_votes(address, snapshot),
            )?;
            Some(AccountVote {
                address,
                has_voted,
                voting_power,
            })
        }
        None => None,
    };

    Ok(Json(ApiResponse::ok(ProposalStatus {
        proposal_id,
        state: proposal_state,
        state_code: proposal_state.as_u8(),
        votes,
        snapshot,
        deadline,
        quorum,
        account,
    })))
}

/// POST /api/governance/proposals/{onchain_id}/vote
///
/// Refuses a second vote from the same address before any transaction is
/// built.
pub async fn cast_vote(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(onchain_id): Path<String>,
    AppJson(payload): AppJson<VoteRequest>,
) -> ApiResult<Json<ApiResponse<TransactionResult>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let proposal_id = parse_onchain_id(&onchain_id)?;
    let support = VoteType::from_u8(payload.support)
        .ok_or_else(|| validation_error("support must be 0, 1 or 2"))?;

    let already_voted = state
        .chain
        .has_voted(proposal_id, caller.address)
        .await
        .map_err(proposal_read_error(proposal_id))?;
    if already_voted {
        return Err(conflict_error("This address has already voted on the proposal"));
    }

    let tx_hash = state
        .chain
        .cast_vote(caller.address, proposal_id, support)
        .await?;
    let confirmation = state.chain.wait_for_confirmation(&tx_hash).await?;
    info!(
        onchain_id = %proposal_id,
        user_id = caller.user_id,
        support = ?support,
        tx_hash = %confirmation.tx_hash,
        "vote cast"
    );

    Ok(Json(ApiResponse::with_message(
        "Vote cast successfully",
        TransactionResult {
            proposal_id: Some(proposal_id),
            confirmation,
        },
    )))
}

/// POST /api/governance/proposals/{onchain_id}/queue
pub async fn queue_proposal(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(onchain_id): Path<String>,
) -> ApiResult<Json<ApiResponse<TransactionResult>>> {
    let proposal_id = parse_onchain_id(&onchain_id)?;
    let tx_hash = state.chain.queue(caller.address, proposal_id).await?;
    let confirmation = state.chain.wait_for_confirmation(&tx_hash).await?;
    info!(onchain_id = %proposal_id, tx_hash = %confirmation.tx_hash, "proposal queued");

    Ok(Json(ApiResponse::with_message(
        "Proposal queued successfully",
        TransactionResult {
            proposal_id: Some(proposal_id),
            confirmation,
        },
    )))
}

/// POST /api/governance/proposals/{onchain_id}/execute
pub async fn execute_proposal(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(onchain_id): Path<String>,
) -> ApiResult<Json<ApiResponse<TransactionResult>>> {
    let proposal_id = parse_onchain_id(&onchain_id)?;
    let tx_hash = state.chain.execute(caller.address, proposal_id).await?;
    let confirmation = state.chain.wait_for_confirmation(&tx_hash).await?;
    info!(onchain_id = %proposal_id, tx_hash = %confirmation.tx_hash, "proposal executed");

    Ok(Json(ApiResponse::with_message(
        "Proposal executed successfully",
        TransactionResult {
            proposal_id: Some(proposal_id),
            confirmation,
        },
    )))
}

/// GET /api/governance/voting-power/{address}
pub async fn voting_power(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> ApiResult<Json<ApiResponse<VotingPower>>> {
    let address = parse_address(&address)?;
    let (balance, votes, symbol) = tokio::try_join!(
        state.chain.balance_of(address),
        state.chain.get_votes(address),
        state.chain.token_symbol(),
    )?;

    Ok(Json(ApiResponse::ok(VotingPower {
        address,
        balance,
        delegated: !votes.is_zero(),
        votes,
        symbol,
    })))
}

/// POST /api/governance/delegate
///
/// Self-delegation, which activates the caller's voting power.
pub async fn delegate(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Json<ApiResponse<TransactionResult>>> {
    let tx_hash = state.chain.delegate(caller.address, caller.address).await?;
    let confirmation = state.chain.wait_for_confirmation(&tx_hash).await?;
    info!(user_id = caller.user_id, tx_hash = %confirmation.tx_hash, "votes delegated");

    Ok(Json(ApiResponse::with_message(
        "Votes delegated successfully",
        TransactionResult {
            proposal_id: None,
            confirmation,
        },
    )))
}
