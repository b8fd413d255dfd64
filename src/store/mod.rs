mod accounts;
mod conversations;
mod messages;

use std::sync::Arc;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::AppResult;

pub use messages::ReadScope;

/// Durable side of messaging: accounts, conversations, messages and reader sets.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    // serializes lookup-before-create so one pair never gets two conversations
    create_lock: Arc<Mutex<()>>,
}

impl Store {
    pub async fn connect(database_url: &str) -> anyhow::Result<Store> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Store::migrated(pool).await
    }

    /// A private in-memory database. One connection that never expires, since
    /// every new SQLite memory connection starts out empty.
    pub async fn memory() -> anyhow::Result<Store> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Store::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> anyhow::Result<Store> {
        sqlx::migrate!().run(&pool).await?;
        Ok(Store {
            pool,
            create_lock: Arc::new(Mutex::new(())),
        })
    }
}

pub(crate) fn parse_id(raw: &str) -> AppResult<Uuid> {
    Ok(Uuid::parse_str(raw)?)
}

pub(crate) fn parse_opt_id(raw: Option<String>) -> AppResult<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}
