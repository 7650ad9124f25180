use async_trait::async_trait;
use linkstore_core::{
    BatchItem, BatchResult, Context, Generator, LinkStorage, OwnerId, OwnerLink, Result,
    ShortCode, StorageError,
};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Schema applied by [`MySqlStorage::migrate`].
pub const SCHEMA: &str = include_str!("../ddl/mysql/short_links.sql");

/// How many generated codes are tried when inserts collide on `short`.
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// MySQL implementation of the storage contract.
///
/// Soft delete is implemented with `is_deleted`. Origins are unique among
/// live rows through the generated `live_origin` column, so deleting a link
/// frees its origin for a new code. Codes are never reused, deleted rows
/// included.
#[derive(Clone)]
pub struct MySqlStorage {
    pool: MySqlPool,
    generator: Arc<dyn Generator>,
}

impl std::fmt::Debug for MySqlStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlStorage")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl MySqlStorage {
    /// Creates a storage from an existing MySQL connection pool.
    ///
    /// The schema is not touched; call [`MySqlStorage::migrate`] if needed.
    pub fn new(pool: MySqlPool, generator: impl Generator) -> Self {
        Self {
            pool,
            generator: Arc::new(generator),
        }
    }

    /// Opens a new MySQL connection pool and makes sure the schema exists.
    pub async fn connect(database_url: &str, generator: impl Generator) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        let storage = Self::new(pool, generator);
        storage.migrate().await?;
        info!("connected to mysql storage");
        Ok(storage)
    }

    /// Creates the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn find_live_code<'e, E>(executor: E, origin: &str) -> Result<Option<ShortCode>>
    where
        E: sqlx::MySqlExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            SELECT short
            FROM short_links
            WHERE live_origin = ?
            LIMIT 1
            "#,
        )
        .bind(origin)
        .fetch_optional(executor)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| row.try_get::<String, _>("short").map(ShortCode::new_unchecked))
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn add_inner(&self, origin: &str, owner: Option<OwnerId>) -> Result<ShortCode> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.generator.generate();

            let result = sqlx::query(INSERT_LINK)
                .bind(code.as_str())
                .bind(origin)
                .bind(owner.map(OwnerId::get))
                .execute(&self.pool)
                .await;

            match result {
                Ok(_) => return Ok(code),
                Err(err) if is_unique_violation(&err) => {
                    if let Some(existing) = Self::find_live_code(&self.pool, origin).await? {
                        debug!(code = %existing, "origin already shortened");
                        return Err(StorageError::Conflict { code: existing });
                    }
                    debug!(code = %code, "generated code already taken, retrying");
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        Err(StorageError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    async fn add_batch_inner(
        &self,
        owner: Option<OwnerId>,
        items: &[BatchItem],
    ) -> Result<Vec<BatchResult>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut results: Vec<BatchResult> = Vec::with_capacity(items.len());

        for item in items {
            match self.insert_in_tx(&mut tx, &item.origin, owner, &results).await {
                Ok(code) => results.push(BatchResult {
                    correlation_id: item.correlation_id.clone(),
                    code,
                }),
                Err(err) => {
                    warn!(
                        correlation_id = %item.correlation_id,
                        error = %err,
                        "link batch failed, rolling back"
                    );
                    tx.rollback().await.map_err(map_sqlx_error)?;
                    return Err(err);
                }
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(results)
    }

    /// Inserts one batch item inside `tx`, regenerating the code on collisions.
    ///
    /// A duplicate key error only rolls back the failed statement, so the
    /// transaction stays usable for the retry.
    async fn insert_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, MySql>,
        origin: &str,
        owner: Option<OwnerId>,
        pending: &[BatchResult],
    ) -> Result<ShortCode> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.generator.generate();

            let result = sqlx::query(INSERT_LINK)
                .bind(code.as_str())
                .bind(origin)
                .bind(owner.map(OwnerId::get))
                .execute(&mut **tx)
                .await;

            match result {
                Ok(_) => return Ok(code),
                Err(err) if is_unique_violation(&err) => {
                    match Self::find_live_code(&mut **tx, origin).await? {
                        Some(existing) if pending.iter().any(|r| r.code == existing) => {
                            return Err(StorageError::InvalidData(format!(
                                "origin {origin} appears more than once in the batch"
                            )));
                        }
                        Some(existing) => return Err(StorageError::Conflict { code: existing }),
                        None => debug!(code = %code, "generated code already taken, retrying"),
                    }
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        Err(StorageError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }
}

const INSERT_LINK: &str = r#"
    INSERT INTO short_links (short, origin, user_id)
    VALUES (?, ?, ?)
"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl LinkStorage for MySqlStorage {
    async fn add(&self, ctx: &Context, origin: &str, owner: Option<OwnerId>) -> Result<ShortCode> {
        trace!(origin = %origin, "adding link");
        ctx.run(self.add_inner(origin, owner)).await
    }

    async fn add_batch(
        &self,
        ctx: &Context,
        owner: Option<OwnerId>,
        items: &[BatchItem],
    ) -> Result<Vec<BatchResult>> {
        trace!(items = items.len(), "adding link batch");
        // dropping an unfinished transaction rolls it back
        ctx.run(self.add_batch_inner(owner, items)).await
    }

    async fn get(&self, ctx: &Context, code: &ShortCode) -> Result<String> {
        let row = ctx
            .run(async {
                sqlx::query(
                    r#"
                    SELECT origin, is_deleted
                    FROM short_links
                    WHERE short = ?
                    LIMIT 1
                    "#,
                )
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)
            })
            .await?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(code.to_string()));
        };

        let origin: String = row.try_get("origin").map_err(map_sqlx_error)?;
        let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;
        if deleted {
            return Err(StorageError::Gone(code.to_string()));
        }
        Ok(origin)
    }

    async fn get_links_by_owner(&self, ctx: &Context, owner: OwnerId) -> Result<Vec<OwnerLink>> {
        let rows = ctx
            .run(async {
                sqlx::query(
                    r#"
                    SELECT short, origin
                    FROM short_links
                    WHERE user_id = ?
                      AND is_deleted = FALSE
                    ORDER BY id
                    "#,
                )
                .bind(owner.get())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
            })
            .await?;

        if rows.is_empty() {
            return Err(StorageError::NoLinksByOwner(owner));
        }

        rows.iter()
            .map(|row| -> Result<OwnerLink> {
                Ok(OwnerLink {
                    code: ShortCode::new_unchecked(
                        row.try_get::<String, _>("short").map_err(map_sqlx_error)?,
                    ),
                    origin: row.try_get("origin").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }

    async fn delete_links(&self, ctx: &Context, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        ctx.check()?;
        if codes.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<'_, MySql> = QueryBuilder::new(
            "UPDATE short_links SET is_deleted = TRUE WHERE is_deleted = FALSE AND user_id = ",
        );
        query.push_bind(owner.get());
        query.push(" AND short IN (");
        let mut separated = query.separated(", ");
        for code in codes {
            separated.push_bind(code.as_str().to_owned());
        }
        separated.push_unseparated(")");

        let result = ctx
            .run(async {
                query
                    .build()
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            })
            .await?;

        debug!(
            owner = %owner,
            requested = codes.len(),
            deleted = result.rows_affected(),
            "soft-deleted links"
        );
        Ok(())
    }

    async fn register_owner(&self, ctx: &Context) -> Result<OwnerId> {
        let result = ctx
            .run(async {
                sqlx::query("INSERT INTO users () VALUES ()")
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            })
            .await?;

        let id = i64::try_from(result.last_insert_id())
            .map_err(|e| StorageError::InvalidData(format!("owner id out of range: {e}")))?;
        debug!(owner = id, "registered owner");
        Ok(OwnerId::new(id))
    }

    async fn ping(&self, ctx: &Context) -> Result<()> {
        ctx.run(async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("mysql storage closed");
        Ok(())
    }
}
