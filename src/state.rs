//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::chain::GovernanceChain;
use crate::config::Settings;
use crate::store::{ProposalStore, UserStore};
use crate::submission::ProposalSubmission;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub proposals: Arc<dyn ProposalStore>,
    pub chain: Arc<dyn GovernanceChain>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        proposals: Arc<dyn ProposalStore>,
        chain: Arc<dyn GovernanceChain>,
        settings: Settings,
    ) -> Self {
        Self {
            users,
            proposals,
            chain,
            settings,
        }
    }

    /// Submission pipeline over this state's stores and chain
    pub fn submission(&self) -> ProposalSubmission {
        ProposalSubmission::new(self.proposals.clone(), self.chain.clone())
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
