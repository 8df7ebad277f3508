use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod store;

pub use store::{PgRepository, PgTransaction};

pub const ENV_DB_URL: &str = "STRINGS_DATABASE_URL";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connect to Postgres using STRINGS_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, DEFAULT_MAX_CONNECTIONS).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='versioned_thread'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_version_tables: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_version_tables: bool,
}

/// Row counts of the version tables: `(thread versions, string versions)`.
pub async fn version_row_counts(pool: &PgPool) -> Result<(i64, i64)> {
    let (threads, strings): (i64, i64) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        select
          (select count(*) from versioned_thread)::bigint,
          (select count(*) from versioned_string)::bigint
        "#,
    )
    .fetch_one(pool)
    .await
    .context("version_row_counts failed")?;

    Ok((threads, strings))
}

/// Detect a Postgres unique constraint violation by name.
pub(crate) fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // Postgres unique_violation is 23505.
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
