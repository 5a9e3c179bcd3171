//! In-memory user and proposal store
//!
//! Mirrors the PostgreSQL schema: unique addresses, unique on-chain ids,
//! the user foreign key and cascading deletes.

use super::{normalize_address, ProposalStore, UserStore};
use crate::error::{conflict_error, not_found_error, AppError};
use crate::models::{
    NewProposal, PageRequest, Proposal, ProposalChanges, ProposalFilter, ProposalStats, User,
    DEFAULT_USER_STATUS,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: HashMap<i32, User>,
    proposals: HashMap<i32, Proposal>,
}

/// Thread-safe store implementing both [`UserStore`] and [`ProposalStore`]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_user_id: AtomicI32,
    next_proposal_id: AtomicI32,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_user_id: AtomicI32::new(1),
            next_proposal_id: AtomicI32::new(1),
            fail_updates: AtomicBool::new(false),
        }
    }

    /// Make every proposal update fail, as if the database went away
    #[cfg(test)]
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    fn with_user(tables: &Tables, proposal: &Proposal) -> Proposal {
        let mut proposal = proposal.clone();
        proposal.user = tables.users.get(&proposal.user_id).cloned();
        proposal
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list(&self) -> Result<Vec<User>, AppError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_address(&self, address: &str) -> Result<Option<User>, AppError> {
        let address = normalize_address(address);
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.address == address).cloned())
    }

    async fn find_or_create(&self, address: &str) -> Result<(User, bool), AppError> {
        let address = normalize_address(address);
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.values().find(|u| u.address == address) {
            return Ok((user.clone(), false));
        }

        let now = Utc::now();
        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
            address,
            status: DEFAULT_USER_STATUS.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok((user, true))
    }

    async fn update_status(&self, id: i32, status: &str) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.status = status.to_string();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.proposals.retain(|_, p| p.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ProposalStore for MemoryStore {
    async fn list(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<(Vec<Proposal>, i64), AppError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Proposal> = tables
            .proposals
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|p| Self::with_user(&tables, p))
            .collect();
        Ok((items, total))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Proposal>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.proposals.get(&id).map(|p| Self::with_user(&tables, p)))
    }

    async fn find_by_onchain_id(&self, onchain_id: &str) -> Result<Option<Proposal>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .proposals
            .values()
            .find(|p| p.onchain_id == onchain_id)
            .map(|p| Self::with_user(&tables, p)))
    }

    async fn insert(&self, new: NewProposal) -> Result<Proposal, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&new.user_id) {
            return Err(not_found_error("User not found"));
        }
        if tables.proposals.values().any(|p| p.onchain_id == new.onchain_id) {
            return Err(conflict_error("Proposal with this onchain_id already exists"));
        }

        let now = Utc::now();
        let proposal = Proposal {
            id: self.next_proposal_id.fetch_add(1, Ordering::SeqCst),
            onchain_id: new.onchain_id,
            title: new.title,
            description: new.description,
            published: new.published,
            state: new.state,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            user_id: new.user_id,
            user: None,
            created_at: now,
            updated_at: now,
        };
        tables.proposals.insert(proposal.id, proposal.clone());
        Ok(Self::with_user(&tables, &proposal))
    }

    async fn update(&self, id: i32, changes: &ProposalChanges) -> Result<Option<Proposal>, AppError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("proposal store unavailable".to_string()));
        }

        let mut tables = self.tables.write().await;
        let Some(proposal) = tables.proposals.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(proposal);
        proposal.updated_at = Utc::now();
        let updated = proposal.clone();
        Ok(Some(Self::with_user(&tables, &updated)))
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        Ok(self.tables.write().await.proposals.remove(&id).is_some())
    }

    async fn stats(&self) -> Result<ProposalStats, AppError> {
        let tables = self.tables.read().await;
        let mut stats = ProposalStats::default();
        for proposal in tables.proposals.values() {
            stats.total += 1;
            if proposal.published {
                stats.published += 1;
            } else {
                stats.drafts += 1;
            }
            *stats.by_state.entry(proposal.state.to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    async fn store_with_user() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let (user, _) = UserStore::find_or_create(&store, ADDRESS).await.unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn test_find_or_create_normalizes_address() {
        let store = MemoryStore::new();
        let (user, created) = store.find_or_create(ADDRESS).await.unwrap();
        assert!(created);
        assert_eq!(user.address, ADDRESS.to_lowercase());
        assert_eq!(user.status, "active");

        let (again, created) = store.find_or_create(&ADDRESS.to_lowercase()).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, user.id);

        let found = store.find_by_address(ADDRESS).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_onchain_id() {
        let (store, user) = store_with_user().await;
        let draft = NewProposal::draft("42".into(), "Test".into(), "Body".into(), user.id);

        let first = store.insert(draft.clone()).await.unwrap();
        assert!(!first.published);
        assert_eq!(first.user.as_ref().map(|u| u.id), Some(user.id));

        let err = store.insert(draft).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_insert_requires_existing_user() {
        let store = MemoryStore::new();
        let err = store
            .insert(NewProposal::draft("1".into(), "T".into(), "B".into(), 99))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let (store, user) = store_with_user().await;
        for i in 0..5 {
            let mut new = NewProposal::draft(i.to_string(), format!("P{}", i), "B".into(), user.id);
            new.published = i % 2 == 0;
            store.insert(new).await.unwrap();
        }

        let published = ProposalFilter {
            published: Some(true),
            ..Default::default()
        };
        let (items, total) = ProposalStore::list(&store, &published, PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|p| p.published));

        let (last, _) = ProposalStore::list(&store, &published, PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_counts_by_state() {
        let (store, user) = store_with_user().await;
        let mut active = NewProposal::draft("1".into(), "A".into(), "B".into(), user.id);
        active.state = 1;
        active.published = true;
        store.insert(active).await.unwrap();
        store
            .insert(NewProposal::draft("2".into(), "C".into(), "D".into(), user.id))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.drafts, 1);
        assert_eq!(stats.by_state.get("0"), Some(&1));
        assert_eq!(stats.by_state.get("1"), Some(&1));
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() {
        let (store, user) = store_with_user().await;
        let proposal = store
            .insert(NewProposal::draft("7".into(), "T".into(), "B".into(), user.id))
            .await
            .unwrap();

        assert!(UserStore::delete(&store, user.id).await.unwrap());
        assert!(ProposalStore::find_by_id(&store, proposal.id)
            .await
            .unwrap()
            .is_none());
    }
}
