//! Proposal submission pipeline
//!
//! Coordinates the off-chain draft with the on-chain proposal:
//!
//! 1. [`IdentifierCalculator`] asks the Governor for the id the proposal will get
//! 2. [`DraftRecorder`] saves an unpublished draft keyed by that id
//! 3. [`ChainSubmitter`] sends `propose` and waits for the receipt
//! 4. [`PublishReconciler`] marks the draft published
//!
//! Each step gates the next. The identifier and the `propose` call are built
//! from the same [`PreparedProposal`], so the recorded id is the one the
//! Governor assigns.

use crate::auth::AuthUser;
use crate::chain::{
    combined_description, description_hash, Address, ChainError, GovernanceChain,
    ProposalActions, TxConfirmation, U256,
};
use crate::error::{conflict_error, not_found_error, validation_error, AppError};
use crate::models::{NewProposal, Proposal, ProposalChanges};
use crate::store::ProposalStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Arguments of one `propose` call, fixed before anything is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedProposal {
    pub actions: ProposalActions,
    /// `"{title}\n\n{description}"`, the exact on-chain description
    pub description: String,
    pub description_hash: [u8; 32],
    pub proposal_id: U256,
}

/// Derives the on-chain proposal id through the Governor's `getProposalId`
pub struct IdentifierCalculator {
    chain: Arc<dyn GovernanceChain>,
}

impl IdentifierCalculator {
    pub fn new(chain: Arc<dyn GovernanceChain>) -> Self {
        Self { chain }
    }

    pub async fn calculate(
        &self,
        actions: ProposalActions,
        title: &str,
        description: &str,
    ) -> Result<PreparedProposal, AppError> {
        actions
            .validate()
            .map_err(|e| validation_error(e.to_string()))?;

        let description = combined_description(title, description);
        let description_hash = description_hash(&description);
        let proposal_id = self.chain.proposal_id(&actions, description_hash).await?;

        Ok(PreparedProposal {
            actions,
            description,
            description_hash,
            proposal_id,
        })
    }
}

/// Persists the unpublished draft before any transaction is sent
pub struct DraftRecorder {
    proposals: Arc<dyn ProposalStore>,
}

impl DraftRecorder {
    pub fn new(proposals: Arc<dyn ProposalStore>) -> Self {
        Self { proposals }
    }

    /// Fails with `Conflict` if a proposal with this id was already recorded
    pub async fn record(
        &self,
        proposal_id: U256,
        title: &str,
        description: &str,
        user_id: i32,
    ) -> Result<Proposal, AppError> {
        self.proposals
            .insert(NewProposal::draft(
                proposal_id.to_string(),
                title.trim().to_string(),
                description.trim().to_string(),
                user_id,
            ))
            .await
    }
}

/// Sends `propose` and waits until it is mined
pub struct ChainSubmitter {
    chain: Arc<dyn GovernanceChain>,
}

impl ChainSubmitter {
    pub fn new(chain: Arc<dyn GovernanceChain>) -> Self {
        Self { chain }
    }

    pub async fn submit(
        &self,
        from: Address,
        prepared: &PreparedProposal,
    ) -> Result<TxConfirmation, ChainError> {
        let tx_hash = self
            .chain
            .propose(from, &prepared.actions, &prepared.description)
            .await?;
        info!(
            onchain_id = %prepared.proposal_id,
            tx_hash = %tx_hash,
            "propose transaction sent"
        );
        self.chain.wait_for_confirmation(&tx_hash).await
    }
}

/// Flips the draft to published once the proposal is live
pub struct PublishReconciler {
    proposals: Arc<dyn ProposalStore>,
}

impl PublishReconciler {
    pub fn new(proposals: Arc<dyn ProposalStore>) -> Self {
        Self { proposals }
    }

    pub async fn publish(&self, draft_id: i32) -> Result<Proposal, AppError> {
        self.proposals
            .update(draft_id, &ProposalChanges::published())
            .await?
            .ok_or_else(|| not_found_error("Proposal not found"))
    }
}

/// A proposal to run through the whole pipeline
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub proposer: Address,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    /// `None` submits the signalling action
    pub actions: Option<ProposalActions>,
}

/// Result of a submission whose transaction was confirmed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub proposal: Proposal,
    pub onchain_id: String,
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub published: bool,
    /// Set when the proposal is live but the draft could not be marked published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// The four pipeline steps over shared stores and chain
pub struct ProposalSubmission {
    proposals: Arc<dyn ProposalStore>,
    calculator: IdentifierCalculator,
    recorder: DraftRecorder,
    submitter: ChainSubmitter,
    reconciler: PublishReconciler,
}

impl ProposalSubmission {
    pub fn new(proposals: Arc<dyn ProposalStore>, chain: Arc<dyn GovernanceChain>) -> Self {
        Self {
            calculator: IdentifierCalculator::new(chain.clone()),
            recorder: DraftRecorder::new(proposals.clone()),
            submitter: ChainSubmitter::new(chain),
            reconciler: PublishReconciler::new(proposals.clone()),
            proposals,
        }
    }

    /// Identifier → draft → `propose` → publish.
    ///
    /// An identifier or save failure leaves nothing behind. A chain failure
    /// returns [`AppError::ChainSubmission`] and leaves the unpublished draft
    /// for [`Self::resubmit`]. A publish failure is reported as a warning.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionOutcome, AppError> {
        let actions = request
            .actions
            .unwrap_or_else(|| ProposalActions::signal(request.proposer));

        let prepared = self
            .calculator
            .calculate(actions, &request.title, &request.description)
            .await?;
        info!(
            onchain_id = %prepared.proposal_id,
            user_id = request.user_id,
            "proposal id calculated"
        );

        let draft = self
            .recorder
            .record(
                prepared.proposal_id,
                &request.title,
                &request.description,
                request.user_id,
            )
            .await?;
        info!(
            proposal_id = draft.id,
            onchain_id = %draft.onchain_id,
            "draft recorded"
        );

        self.submit_draft(request.proposer, draft, &prepared).await
    }

    /// Send an existing unpublished draft to the chain again.
    ///
    /// The id is recomputed from the stored title and description and must
    /// match the recorded one.
    pub async fn resubmit(
        &self,
        draft_id: i32,
        caller: AuthUser,
        actions: Option<ProposalActions>,
    ) -> Result<SubmissionOutcome, AppError> {
        let draft = self
            .proposals
            .find_by_id(draft_id)
            .await?
            .ok_or_else(|| not_found_error("Proposal not found"))?;

        if draft.user_id != caller.user_id {
            return Err(AppError::Forbidden(
                "Only the proposal owner can resubmit it".to_string(),
            ));
        }
        if draft.published {
            return Err(conflict_error("Proposal is already published"));
        }

        let actions = actions.unwrap_or_else(|| ProposalActions::signal(caller.address));
        let prepared = self
            .calculator
            .calculate(actions, &draft.title, &draft.description)
            .await?;

        if prepared.proposal_id.to_string() != draft.onchain_id {
            warn!(
                proposal_id = draft.id,
                onchain_id = %draft.onchain_id,
                calculated = %prepared.proposal_id,
                "resubmission parameters do not match the recorded id"
            );
            return Err(conflict_error(
                "Proposal parameters do not match the recorded onchain_id",
            ));
        }

        self.submit_draft(caller.address, draft, &prepared).await
    }

    async fn submit_draft(
        &self,
        proposer: Address,
        draft: Proposal,
        prepared: &PreparedProposal,
    ) -> Result<SubmissionOutcome, AppError> {
        let confirmation = match self.submitter.submit(proposer, prepared).await {
            Ok(confirmation) => confirmation,
            Err(source) => {
                error!(
                    proposal_id = draft.id,
                    onchain_id = %draft.onchain_id,
                    "chain submission failed: {}",
                    source
                );
                return Err(AppError::ChainSubmission {
                    draft_id: draft.id,
                    onchain_id: draft.onchain_id,
                    source,
                });
            }
        };
        info!(
            proposal_id = draft.id,
            tx_hash = %confirmation.tx_hash,
            block = ?confirmation.block_number,
            "proposal confirmed on-chain"
        );

        let onchain_id = draft.onchain_id.clone();
        let (proposal, warning) = match self.reconciler.publish(draft.id).await {
            Ok(published) => (published, None),
            Err(e) => {
                warn!(
                    proposal_id = draft.id,
                    onchain_id = %onchain_id,
                    "proposal is live but could not be marked published: {}",
                    e
                );
                (
                    draft,
                    Some(format!(
                        "Proposal is live on-chain but could not be marked published: {}",
                        e
                    )),
                )
            }
        };

        Ok(SubmissionOutcome {
            published: proposal.published,
            proposal,
            onchain_id,
            tx_hash: confirmation.tx_hash,
            block_number: confirmation.block_number,
            warning,
        })
    }
}
