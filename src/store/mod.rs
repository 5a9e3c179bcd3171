//! Persistence seams for users and proposals
//!
//! Handlers and the submission pipeline only see these traits. PostgreSQL
//! backs them in production (`crate::db`); the in-memory store backs tests.

#[cfg(test)]
mod memory;

#[cfg(test)]
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{
    NewProposal, PageRequest, Proposal, ProposalChanges, ProposalFilter, ProposalStats, User,
};
use async_trait::async_trait;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Newest first
    async fn list(&self) -> Result<Vec<User>, AppError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError>;
    /// Lookup is case-insensitive
    async fn find_by_address(&self, address: &str) -> Result<Option<User>, AppError>;
    /// Returns the user and whether it was created by this call
    async fn find_or_create(&self, address: &str) -> Result<(User, bool), AppError>;
    async fn update_status(&self, id: i32, status: &str) -> Result<Option<User>, AppError>;
    /// Deleting a user deletes its proposals
    async fn delete(&self, id: i32) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Newest first, with the owning user attached; returns the page and the
    /// total number of matching rows
    async fn list(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<(Vec<Proposal>, i64), AppError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<Proposal>, AppError>;
    async fn find_by_onchain_id(&self, onchain_id: &str) -> Result<Option<Proposal>, AppError>;
    /// Fails with `Conflict` on a duplicate on-chain id and `NotFound` when the
    /// owning user does not exist
    async fn insert(&self, proposal: NewProposal) -> Result<Proposal, AppError>;
    async fn update(&self, id: i32, changes: &ProposalChanges) -> Result<Option<Proposal>, AppError>;
    async fn delete(&self, id: i32) -> Result<bool, AppError>;
    async fn stats(&self) -> Result<ProposalStats, AppError>;
}

pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
