//! Postgres implementation of the engine's persistence contract.
//!
//! Every engine call runs against a single `sqlx::Transaction`. Version rows
//! are only ever inserted. The insert is conditional on no equal-or-newer
//! version being visible, and the `(logical_id, version)` unique constraint
//! catches writers that raced past that check; both surface as
//! `StoreError::VersionConflict`.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use strings_engine::{Repository, StoreError, StringStore, Transaction, VersionedRecordStore};
use strings_schemas::{Thread, ThreadString};
use tracing::debug;
use uuid::Uuid;

use crate::is_unique_constraint_violation;

const THREAD_VERSION_UNIQ: &str = "versioned_thread_logical_version_uniq";
const STRING_VERSION_UNIQ: &str = "versioned_string_logical_version_uniq";

const THREAD_COLUMNS: &str = "vt.id, vt.thread_id, vt.version, vt.name, vt.archived, vt.deleted, vt.date_created";
const STRING_COLUMNS: &str = "vs.id, vs.string_id, vs.thread_id, vs.version, vs.name, vs.string_order, \
     vs.active, vs.archived, vs.deleted, vs.private, vs.date_created";

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PgRepository {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, StoreError> {
        let tx = self.pool.begin().await.context("begin transaction failed")?;
        Ok(PgTransaction { tx })
    }
}

pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

// ---------------------------------------------------------------------------
// Thread versions
// ---------------------------------------------------------------------------

#[async_trait]
impl VersionedRecordStore<Thread> for PgTransaction {
    async fn save(&mut self, record: Thread) -> Result<Thread, StoreError> {
        sqlx::query("insert into thread (id) values ($1) on conflict (id) do nothing")
            .bind(record.thread_id)
            .execute(&mut *self.tx)
            .await
            .context("insert thread failed")?;

        let res = sqlx::query(&format!(
            r#"
            insert into versioned_thread as vt (id, thread_id, version, name, archived, deleted)
            select $1, $2, $3, $4, $5, $6
            where not exists (
                select 1 from versioned_thread
                where thread_id = $2 and version >= $3
            )
            returning {THREAD_COLUMNS}
            "#
        ))
        .bind(record.version_id)
        .bind(record.thread_id)
        .bind(record.version)
        .bind(&record.name)
        .bind(record.archived)
        .bind(record.deleted)
        .fetch_optional(&mut *self.tx)
        .await;

        let conflict = StoreError::VersionConflict {
            logical_id: record.thread_id,
            version: record.version,
        };
        match res {
            Ok(Some(row)) => {
                let saved = thread_from_row(&row).context("decode versioned_thread failed")?;
                debug!(thread_id = %saved.thread_id, version = saved.version, "inserted versioned_thread");
                Ok(saved)
            }
            Ok(None) => Err(conflict),
            Err(e) if is_unique_constraint_violation(&e, THREAD_VERSION_UNIQ) => Err(conflict),
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context("insert versioned_thread failed"),
            )),
        }
    }

    async fn find_latest_by_logical_id(
        &mut self,
        logical_id: Uuid,
    ) -> Result<Option<Thread>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            select {THREAD_COLUMNS}
            from versioned_thread vt
            join (
                select thread_id, max(version) as version
                from versioned_thread
                where thread_id = $1
                group by thread_id
            ) latest on latest.thread_id = vt.thread_id and latest.version = vt.version
            "#
        ))
        .bind(logical_id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("find latest thread failed")?;

        let thread = row
            .map(|r| thread_from_row(&r))
            .transpose()
            .context("decode versioned_thread failed")?;
        Ok(thread)
    }

    async fn find_all_latest(&mut self) -> Result<Vec<Thread>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            select {THREAD_COLUMNS}
            from versioned_thread vt
            join (
                select thread_id, max(version) as version, min(date_created) as first_created
                from versioned_thread
                group by thread_id
            ) latest on latest.thread_id = vt.thread_id and latest.version = vt.version
            order by latest.first_created, vt.thread_id
            "#
        ))
        .fetch_all(&mut *self.tx)
        .await
        .context("find all latest threads failed")?;

        let threads = rows
            .iter()
            .map(thread_from_row)
            .collect::<Result<Vec<_>, _>>()
            .context("decode versioned_thread failed")?;
        Ok(threads)
    }
}

// ---------------------------------------------------------------------------
// String versions
// ---------------------------------------------------------------------------

#[async_trait]
impl VersionedRecordStore<ThreadString> for PgTransaction {
    async fn save(&mut self, record: ThreadString) -> Result<ThreadString, StoreError> {
        sqlx::query("insert into string (id) values ($1) on conflict (id) do nothing")
            .bind(record.string_id)
            .execute(&mut *self.tx)
            .await
            .context("insert string failed")?;

        let res = sqlx::query(&format!(
            r#"
            insert into versioned_string as vs (
              id, string_id, thread_id, version, name, string_order,
              active, archived, deleted, private
            )
            select $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            where not exists (
                select 1 from versioned_string
                where string_id = $2 and version >= $4
            )
            returning {STRING_COLUMNS}
            "#
        ))
        .bind(record.version_id)
        .bind(record.string_id)
        .bind(record.thread_id)
        .bind(record.version)
        .bind(&record.name)
        .bind(record.order)
        .bind(record.active)
        .bind(record.archived)
        .bind(record.deleted)
        .bind(record.private)
        .fetch_optional(&mut *self.tx)
        .await;

        let conflict = StoreError::VersionConflict {
            logical_id: record.string_id,
            version: record.version,
        };
        match res {
            Ok(Some(row)) => {
                let saved = string_from_row(&row).context("decode versioned_string failed")?;
                debug!(string_id = %saved.string_id, version = saved.version, "inserted versioned_string");
                Ok(saved)
            }
            Ok(None) => Err(conflict),
            Err(e) if is_unique_constraint_violation(&e, STRING_VERSION_UNIQ) => Err(conflict),
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context("insert versioned_string failed"),
            )),
        }
    }

    async fn find_latest_by_logical_id(
        &mut self,
        logical_id: Uuid,
    ) -> Result<Option<ThreadString>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            select {STRING_COLUMNS}
            from versioned_string vs
            join (
                select string_id, max(version) as version
                from versioned_string
                where string_id = $1
                group by string_id
            ) latest on latest.string_id = vs.string_id and latest.version = vs.version
            "#
        ))
        .bind(logical_id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("find latest string failed")?;

        let string = row
            .map(|r| string_from_row(&r))
            .transpose()
            .context("decode versioned_string failed")?;
        Ok(string)
    }

    async fn find_all_latest(&mut self) -> Result<Vec<ThreadString>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            select {STRING_COLUMNS}
            from versioned_string vs
            join (
                select string_id, max(version) as version
                from versioned_string
                group by string_id
            ) latest on latest.string_id = vs.string_id and latest.version = vs.version
            order by vs.thread_id, vs.string_order
            "#
        ))
        .fetch_all(&mut *self.tx)
        .await
        .context("find all latest strings failed")?;

        decode_strings(&rows)
    }
}

#[async_trait]
impl StringStore for PgTransaction {
    async fn find_all_latest_by_thread_id(
        &mut self,
        thread_id: Uuid,
    ) -> Result<Vec<ThreadString>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            select {STRING_COLUMNS}
            from versioned_string vs
            join (
                select string_id, max(version) as version
                from versioned_string
                where thread_id = $1
                group by string_id
            ) latest on latest.string_id = vs.string_id and latest.version = vs.version
            order by vs.string_order
            "#
        ))
        .bind(thread_id)
        .fetch_all(&mut *self.tx)
        .await
        .context("find latest strings by thread failed")?;

        decode_strings(&rows)
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.context("commit failed")?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.context("rollback failed")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn thread_from_row(row: &PgRow) -> Result<Thread, sqlx::Error> {
    Ok(Thread {
        version_id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        version: row.try_get("version")?,
        name: row.try_get("name")?,
        archived: row.try_get("archived")?,
        deleted: row.try_get("deleted")?,
        created_at: row.try_get("date_created")?,
        strings: Vec::new(),
    })
}

fn string_from_row(row: &PgRow) -> Result<ThreadString, sqlx::Error> {
    Ok(ThreadString {
        version_id: row.try_get("id")?,
        string_id: row.try_get("string_id")?,
        thread_id: row.try_get("thread_id")?,
        version: row.try_get("version")?,
        name: row.try_get("name")?,
        order: row.try_get("string_order")?,
        active: row.try_get("active")?,
        archived: row.try_get("archived")?,
        deleted: row.try_get("deleted")?,
        private: row.try_get("private")?,
        created_at: row.try_get("date_created")?,
    })
}

fn decode_strings(rows: &[PgRow]) -> Result<Vec<ThreadString>, StoreError> {
    let strings = rows
        .iter()
        .map(string_from_row)
        .collect::<Result<Vec<_>, _>>()
        .context("decode versioned_string failed")?;
    Ok(strings)
}
