//! PostgreSQL item store.
//!
//! All sources share two tables, namespaced by a `source` column. Activities
//! are independent rows; the log is read back newest first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventhub_core::config::DbConfig;
use eventhub_core::error::AppError;
use eventhub_core::models::{Activity, Fields, Item, ItemActivities};
use eventhub_core::store::{DbConnection, ItemRepository};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS items (
        source TEXT NOT NULL,
        key TEXT NOT NULL,
        fields JSONB NOT NULL DEFAULT '{}'::jsonb,
        PRIMARY KEY (source, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS item_activities (
        id BIGSERIAL PRIMARY KEY,
        source TEXT NOT NULL,
        key TEXT NOT NULL,
        action TEXT NOT NULL,
        properties JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        FOREIGN KEY (source, key) REFERENCES items (source, key) ON DELETE CASCADE
    )
    "#,
];

/// Connection pool shared by every Postgres repository.
///
/// # Examples
///
/// ```no_run
/// use eventhub_core::config::DbConfig;
/// use eventhub_core::store::DbConnection;
/// use eventhub_db::PgConnection;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = PgConnection::connect("postgresql://localhost/eventhub", &DbConfig::default()).await?;
/// let members = connection.init_repository("members").await?;
/// println!("{} members", members.len().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PgConnection {
    pool: PgPool,
}

impl PgConnection {
    /// Connects and creates the schema if it is missing.
    pub async fn connect(database_url: &str, config: &DbConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(database_url)
            .await?;

        let connection = Self::from_pool(pool);
        connection.ensure_schema().await?;
        info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(connection)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DbConnection for PgConnection {
    async fn init_repository(&self, name: &str) -> Result<Arc<dyn ItemRepository>, AppError> {
        Ok(Arc::new(PgRepository {
            name: name.to_string(),
            pool: self.pool.clone(),
        }))
    }

    async fn close(&self) -> Result<(), AppError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Items of one source stored in PostgreSQL.
pub struct PgRepository {
    name: String,
    pool: PgPool,
}

#[async_trait]
impl ItemRepository for PgRepository {
    fn repo_name(&self) -> &str {
        &self.name
    }

    async fn set_item(&self, item: &Item) -> Result<(), AppError> {
        if item.key.is_empty() {
            return Err(AppError::EmptyKey);
        }
        sqlx::query(
            r#"
            INSERT INTO items (source, key, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (source, key)
            DO UPDATE SET fields = EXCLUDED.fields
            "#,
        )
        .bind(&self.name)
        .bind(&item.key)
        .bind(Json(&item.fields))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, AppError> {
        let row: Option<ItemRow> =
            sqlx::query_as("SELECT key, fields FROM items WHERE source = $1 AND key = $2")
                .bind(&self.name)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Item::from))
    }

    async fn items(&self) -> Result<Vec<Item>, AppError> {
        let rows: Vec<ItemRow> =
            sqlx::query_as("SELECT key, fields FROM items WHERE source = $1 ORDER BY key")
                .bind(&self.name)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn len(&self) -> Result<usize, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items WHERE source = $1")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn get_item_activities(&self, key: &str) -> Result<Option<ItemActivities>, AppError> {
        if self.get_item(key).await?.is_none() {
            return Ok(None);
        }

        let rows: Vec<ActivityRow> = sqlx::query_as(
            r#"
            SELECT action, properties, created_at
            FROM item_activities
            WHERE source = $1 AND key = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(&self.name)
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(ItemActivities {
            key: key.to_string(),
            activities: rows.into_iter().map(Activity::from).collect(),
        }))
    }

    async fn add_item_activity(
        &self,
        key: &str,
        activity: Activity,
    ) -> Result<Option<ItemActivities>, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO item_activities (source, key, action, properties, created_at)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM items WHERE source = $1 AND key = $2)
            "#,
        )
        .bind(&self.name)
        .bind(key)
        .bind(&activity.action)
        .bind(Json(&activity.properties))
        .bind(activity.created)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_item_activities(key).await
    }

    async fn close(&self) -> Result<(), AppError> {
        // the pool belongs to the connection
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    key: String,
    fields: Json<Fields>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            key: row.key,
            fields: row.fields.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    action: String,
    properties: Json<Fields>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Activity::at(row.action, row.properties.0, row.created_at)
    }
}
