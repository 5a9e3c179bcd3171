use super::queries;
use crate::error::AppError;
use crate::models::User;
use crate::store::{normalize_address, UserStore};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::debug;

pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0),
        address: row.get(1),
        status: row.get(2),
        created_at: row.get(3),
        updated_at: row.get(4),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self) -> Result<Vec<User>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_USERS, &[]).await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::GET_USER_BY_ID, &[&id]).await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_address(&self, address: &str) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let address = normalize_address(address);
        let row = client
            .query_opt(queries::GET_USER_BY_ADDRESS, &[&address])
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_or_create(&self, address: &str) -> Result<(User, bool), AppError> {
        let client = self.pool.get().await?;
        let address = normalize_address(address);

        if let Some(row) = client
            .query_opt(queries::INSERT_USER_IF_ABSENT, &[&address])
            .await?
        {
            debug!(address = %address, "user created");
            return Ok((user_from_row(&row), true));
        }

        let row = client
            .query_one(queries::GET_USER_BY_ADDRESS, &[&address])
            .await?;
        Ok((user_from_row(&row), false))
    }

    async fn update_status(&self, id: i32, status: &str) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::UPDATE_USER_STATUS, &[&id, &status])
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let deleted = client.execute(queries::DELETE_USER, &[&id]).await?;
        Ok(deleted > 0)
    }
}
