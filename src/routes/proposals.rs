//! Proposal route handlers
//!
//! Off-chain proposal records plus the on-chain submission endpoints.

use super::{parse_id, AppJson};
use crate::auth::AuthUser;
use crate::chain::{ActionsPayload, ProposalActions};
use crate::error::{not_found_error, validation_error, ApiResult};
use crate::models::{
    canonical_onchain_id, ApiResponse, CreateProposalRequest, MessageResponse, PaginatedResponse,
    Proposal, ProposalChanges, ProposalListQuery, ProposalStats, ResubmitProposalRequest,
    SubmitProposalRequest, UpdateProposalRequest, UpdateVotesRequest,
};
use crate::state::SharedState;
use crate::submission::{SubmissionOutcome, SubmissionRequest};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{debug, info, warn};
use validator::Validate;

fn parse_actions(payload: Option<&ActionsPayload>) -> ApiResult<Option<ProposalActions>> {
    payload
        .map(ProposalActions::try_from)
        .transpose()
        .map_err(|e| validation_error(e.to_string()))
}

fn submission_response(outcome: SubmissionOutcome) -> (StatusCode, Json<ApiResponse<SubmissionOutcome>>) {
    let message = match outcome.warning {
        Some(_) => "Proposal submitted on-chain but not marked published",
        None => "Proposal submitted successfully",
    };
    (
        StatusCode::CREATED,
        Json(ApiResponse::with_message(message, outcome)),
    )
}

/// GET /api/proposals
pub async fn list_proposals(
    State(state): State<SharedState>,
    Query(query): Query<ProposalListQuery>,
) -> ApiResult<Json<PaginatedResponse<Proposal>>> {
    let filter = query.filter()?;
    let page = query.page()?;

    let (proposals, total) = state.proposals.list(&filter, page).await?;
    debug!(count = proposals.len(), total, "listed proposals");
    Ok(Json(PaginatedResponse::new(proposals, page, total)))
}

/// GET /api/proposals/stats
pub async fn proposal_stats(
    State(state): State<SharedState>,
) -> ApiResult<Json<ApiResponse<ProposalStats>>> {
    let stats = state.proposals.stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/proposals/{id}
pub async fn get_proposal(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Proposal>>> {
    let id = parse_id("id", &id)?;
    let proposal = state
        .proposals
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found_error("Proposal not found"))?;
    Ok(Json(ApiResponse::ok(proposal)))
}

/// GET /api/proposals/onchain/{onchain_id}
pub async fn get_proposal_by_onchain_id(
    State(state): State<SharedState>,
    Path(onchain_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Proposal>>> {
    let onchain_id = canonical_onchain_id(&onchain_id)?;
    let proposal = state
        .proposals
        .find_by_onchain_id(&onchain_id)
        .await?
        .ok_or_else(|| not_found_error("Proposal not found"))?;
    Ok(Json(ApiResponse::ok(proposal)))
}

/// GET /api/proposals/user/{user_id}
pub async fn list_user_proposals(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(query): Query<ProposalListQuery>,
) -> ApiResult<Json<PaginatedResponse<Proposal>>> {
    let user_id = parse_id("userId", &user_id)?;
    let mut filter = query.filter()?;
    filter.user_id = Some(user_id);
    let page = query.page()?;

    let (proposals, total) = state.proposals.list(&filter, page).await?;
    debug!(user_id, count = proposals.len(), total, "listed user proposals");
    Ok(Json(PaginatedResponse::new(proposals, page, total)))
}

/// POST /api/proposals
///
/// Records a proposal directly, without touching the chain.
pub async fn create_proposal(
    State(state): State<SharedState>,
    AppJson(payload): AppJson<CreateProposalRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Proposal>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let proposal = state.proposals.insert(payload.try_into()?).await?;
    info!(
        proposal_id = proposal.id,
        onchain_id = %proposal.onchain_id,
        user_id = proposal.user_id,
        "proposal created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Proposal created successfully",
            proposal,
        )),
    ))
}

/// PUT /api/proposals/{id}
pub async fn update_proposal(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateProposalRequest>,
) -> ApiResult<Json<ApiResponse<Proposal>>> {
    let id = parse_id("id", &id)?;
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let changes = ProposalChanges::from(payload);
    let proposal = state
        .proposals
        .update(id, &changes)
        .await?
        .ok_or_else(|| not_found_error("Proposal not found"))?;

    info!(proposal_id = id, onchain_id = %proposal.onchain_id, "proposal updated");
    Ok(Json(ApiResponse::with_message(
        "Proposal updated successfully",
        proposal,
    )))
}

/// PATCH /api/proposals/{id}/votes
pub async fn update_votes(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateVotesRequest>,
) -> ApiResult<Json<ApiResponse<Proposal>>> {
    let id = parse_id("id", &id)?;
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let changes = ProposalChanges::from(payload);
    let proposal = state
        .proposals
        .update(id, &changes)
        .await?
        .ok_or_else(|| not_found_error("Proposal not found"))?;

    info!(
        proposal_id = id,
        for_votes = proposal.for_votes,
        against_votes = proposal.against_votes,
        abstain_votes = proposal.abstain_votes,
        "proposal votes updated"
    );
    Ok(Json(ApiResponse::with_message(
        "Proposal votes updated successfully",
        proposal,
    )))
}

/// DELETE /api/proposals/{id}
pub async fn delete_proposal(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id("id", &id)?;
    if !state.proposals.delete(id).await? {
        return Err(not_found_error("Proposal not found"));
    }
    info!(proposal_id = id, "proposal deleted");
    Ok(Json(MessageResponse::new("Proposal deleted successfully")))
}

/// POST /api/proposals/submit
///
/// Runs the whole pipeline for the authenticated caller: id, draft,
/// `propose`, publish.
pub async fn submit_proposal(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(payload): AppJson<SubmitProposalRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SubmissionOutcome>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let actions = parse_actions(payload.actions.as_ref())?;

    let outcome = state
        .submission()
        .submit(SubmissionRequest {
            proposer: caller.address,
            user_id: caller.user_id,
            title: payload.title,
            description: payload.description,
            actions,
        })
        .await?;

    if let Some(warning) = &outcome.warning {
        warn!(proposal_id = outcome.proposal.id, "{}", warning);
    }
    Ok(submission_response(outcome))
}

/// POST /api/proposals/{id}/submit
///
/// Sends an unpublished draft to the chain again. The body is optional.
pub async fn resubmit_proposal(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ApiResponse<SubmissionOutcome>>)> {
    let id = parse_id("id", &id)?;
    let payload: ResubmitProposalRequest = if body.is_empty() {
        ResubmitProposalRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| validation_error(e.to_string()))?
    };
    let actions = parse_actions(payload.actions.as_ref())?;

    let outcome = state.submission().resubmit(id, caller, actions).await?;
    Ok(submission_response(outcome))
}
