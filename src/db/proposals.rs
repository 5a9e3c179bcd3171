use super::{map_proposal_write_error, queries};
use crate::error::{conflict_error, AppError};
use crate::models::{
    NewProposal, PageRequest, Proposal, ProposalChanges, ProposalFilter, ProposalStats, User,
};
use crate::store::ProposalStore;
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

pub struct PgProposalStore {
    pool: Pool,
}

impl PgProposalStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Proposal columns 0..=11 followed by the joined user columns 12..=16
fn proposal_from_row(row: &Row) -> Proposal {
    let user_id: Option<i32> = row.get(12);
    let user = user_id.map(|id| User {
        id,
        address: row.get(13),
        status: row.get(14),
        created_at: row.get(15),
        updated_at: row.get(16),
    });

    Proposal {
        id: row.get(0),
        onchain_id: row.get(1),
        title: row.get(2),
        description: row.get(3),
        published: row.get(4),
        state: row.get(5),
        for_votes: row.get(6),
        against_votes: row.get(7),
        abstain_votes: row.get(8),
        user_id: row.get(9),
        user,
        created_at: row.get(10),
        updated_at: row.get(11),
    }
}

#[async_trait]
impl ProposalStore for PgProposalStore {
    async fn list(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<(Vec<Proposal>, i64), AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                queries::LIST_PROPOSALS,
                &[
                    &filter.published,
                    &filter.state,
                    &filter.user_id,
                    &page.limit,
                    &page.offset(),
                ],
            )
            .await?;
        let total: i64 = client
            .query_one(
                queries::COUNT_PROPOSALS,
                &[&filter.published, &filter.state, &filter.user_id],
            )
            .await?
            .get(0);

        Ok((rows.iter().map(proposal_from_row).collect(), total))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Proposal>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::GET_PROPOSAL_BY_ID, &[&id]).await?;
        Ok(row.as_ref().map(proposal_from_row))
    }

    async fn find_by_onchain_id(&self, onchain_id: &str) -> Result<Option<Proposal>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::GET_PROPOSAL_BY_ONCHAIN_ID, &[&onchain_id])
            .await?;
        Ok(row.as_ref().map(proposal_from_row))
    }

    async fn insert(&self, proposal: NewProposal) -> Result<Proposal, AppError> {
        let client = self.pool.get().await?;

        let exists: bool = client
            .query_one(queries::PROPOSAL_EXISTS_BY_ONCHAIN_ID, &[&proposal.onchain_id])
            .await?
            .get(0);
        if exists {
            return Err(conflict_error("Proposal with this onchain_id already exists"));
        }

        // the unique index still decides a concurrent insert of the same id
        let row = client
            .query_one(
                queries::INSERT_PROPOSAL,
                &[
                    &proposal.onchain_id,
                    &proposal.title,
                    &proposal.description,
                    &proposal.published,
                    &proposal.state,
                    &proposal.user_id,
                ],
            )
            .await
            .map_err(map_proposal_write_error)?;

        Ok(proposal_from_row(&row))
    }

    async fn update(&self, id: i32, changes: &ProposalChanges) -> Result<Option<Proposal>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                queries::UPDATE_PROPOSAL,
                &[
                    &id,
                    &changes.title,
                    &changes.description,
                    &changes.published,
                    &changes.state,
                    &changes.for_votes,
                    &changes.against_votes,
                    &changes.abstain_votes,
                ],
            )
            .await?;
        Ok(row.as_ref().map(proposal_from_row))
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let deleted = client.execute(queries::DELETE_PROPOSAL, &[&id]).await?;
        Ok(deleted > 0)
    }

    async fn stats(&self) -> Result<ProposalStats, AppError> {
        let client = self.pool.get().await?;
        let totals = client.query_one(queries::PROPOSAL_TOTALS, &[]).await?;
        let by_state = client
            .query(queries::PROPOSAL_COUNT_BY_STATE, &[])
            .await?
            .iter()
            .map(|row| (row.get::<_, i32>(0).to_string(), row.get::<_, i64>(1)))
            .collect();

        Ok(ProposalStats {
            total: totals.get(0),
            published: totals.get(1),
            drafts: totals.get(2),
            by_state,
        })
    }
}
