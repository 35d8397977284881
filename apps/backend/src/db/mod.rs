//! SQLite cache store
//!
//! One table per cached entity kind. Every row carries a nullable
//! `fetched_at`; freshness is decided by callers with
//! [`wanikani_core::is_fresh`], never here.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{ApiError, Result};
use crate::models::*;
use wanikani_core::CacheKind;

/// Bound parameters per `IN (...)` query, well under SQLite's variable limit.
const ID_CHUNK: usize = 500;

/// Which rows an invalidation applies to.
#[derive(Debug, Clone, Copy)]
pub enum Invalidation<'a> {
    All,
    Ids(&'a [i64]),
}

const SUBJECT_COLUMNS: &str =
    "id, kind, level, characters, meanings, readings, srs_stage, fetched_at";

const DETAIL_COLUMNS: &str = "id, kind, level, characters, meanings, readings, \
     component_subject_ids, amalgamation_subject_ids, meaning_mnemonic, meaning_hint, \
     reading_mnemonic, reading_hint, context_sentences, parts_of_speech, fetched_at";

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite database at `database_url`
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection keeps every query on
    /// the same memory store.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    // === Profile ===

    pub async fn get_profile(&self) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, DbProfile>(
            r#"
            SELECT username, level, max_level, profile_url, fetched_at
            FROM profile
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Profile::from))
    }

    /// Replace the singleton profile row
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profile (id, username, level, max_level, profile_url, fetched_at)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                username = excluded.username,
                level = excluded.level,
                max_level = excluded.max_level,
                profile_url = excluded.profile_url,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&profile.username)
        .bind(profile.level)
        .bind(profile.max_level)
        .bind(&profile.profile_url)
        .bind(profile.fetched_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // === Review Queue ===

    /// All queued reviews, earliest availability first
    pub async fn list_review_queue(&self) -> Result<Vec<ReviewQueueEntry>> {
        let rows = sqlx::query_as::<_, DbReviewEntry>(
            r#"
            SELECT assignment_id, subject_id, subject_type, srs_stage, available_at, fetched_at
            FROM review_queue
            ORDER BY available_at ASC, assignment_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReviewQueueEntry::try_from).collect()
    }

    /// Swap the whole review queue for `entries` in one transaction.
    ///
    /// Readers see either the previous snapshot or the new one. If any insert
    /// fails the previous snapshot is kept.
    pub async fn replace_review_queue(&self, entries: &[ReviewQueueEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM review_queue")
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO review_queue
                    (assignment_id, subject_id, subject_type, srs_stage, available_at, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.assignment_id)
            .bind(entry.subject_id)
            .bind(entry.subject_type.as_str())
            .bind(i64::from(entry.srs_stage))
            .bind(entry.available_at)
            .bind(entry.fetched_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // === Subject Summaries ===

    /// Summaries for `ids`. Unknown ids are absent from the map.
    pub async fn get_subjects(&self, ids: &[i64]) -> Result<HashMap<i64, SubjectSummary>> {
        let mut found = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id IN ("
            ));
            push_id_list(&mut qb, chunk);

            let rows = qb.build_query_as::<DbSubject>().fetch_all(&self.pool).await?;
            for row in rows {
                let subject = SubjectSummary::try_from(row)?;
                found.insert(subject.id, subject);
            }
        }

        Ok(found)
    }

    /// Summaries on any of `levels`, narrowed to `kinds` when non-empty
    pub async fn get_subjects_by_levels(
        &self,
        levels: &[i64],
        kinds: &[SubjectKind],
    ) -> Result<Vec<SubjectSummary>> {
        if levels.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE level IN ("
        ));
        push_id_list(&mut qb, levels);

        if !kinds.is_empty() {
            qb.push(" AND kind IN (");
            let mut separated = qb.separated(", ");
            for kind in kinds {
                separated.push_bind(kind.as_str());
            }
            separated.push_unseparated(")");
        }
        qb.push(" ORDER BY level, id");

        let rows = qb.build_query_as::<DbSubject>().fetch_all(&self.pool).await?;
        rows.into_iter().map(SubjectSummary::try_from).collect()
    }

    pub async fn upsert_subject(&self, subject: &SubjectSummary) -> Result<()> {
        self.upsert_subjects(std::slice::from_ref(subject)).await
    }

    /// Insert or replace summaries by id
    pub async fn upsert_subjects(&self, subjects: &[SubjectSummary]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for subject in subjects {
            sqlx::query(
                r#"
                INSERT INTO subjects
                    (id, kind, level, characters, meanings, readings, srs_stage, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    kind = excluded.kind,
                    level = excluded.level,
                    characters = excluded.characters,
                    meanings = excluded.meanings,
                    readings = excluded.readings,
                    srs_stage = excluded.srs_stage,
                    fetched_at = excluded.fetched_at
                "#,
            )
            .bind(subject.id)
            .bind(subject.kind.as_str())
            .bind(subject.level)
            .bind(&subject.characters)
            .bind(Json(&subject.meanings))
            .bind(Json(&subject.readings))
            .bind(subject.srs_stage.map(i64::from))
            .bind(subject.fetched_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // === Subject Details ===

    /// Details for `ids`. Unknown ids are absent from the map.
    pub async fn get_subject_details(&self, ids: &[i64]) -> Result<HashMap<i64, SubjectDetail>> {
        let mut found = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {DETAIL_COLUMNS} FROM subject_details WHERE id IN ("
            ));
            push_id_list(&mut qb, chunk);

            let rows = qb
                .build_query_as::<DbSubjectDetail>()
                .fetch_all(&self.pool)
                .await?;
            for row in rows {
                let detail = SubjectDetail::try_from(row)?;
                found.insert(detail.id, detail);
            }
        }

        Ok(found)
    }

    /// Fetch timestamps of the details present for `ids`
    pub async fn get_detail_fetch_times(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Option<DateTime<Utc>>>> {
        let mut found = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb =
                QueryBuilder::<Sqlite>::new("SELECT id, fetched_at FROM subject_details WHERE id IN (");
            push_id_list(&mut qb, chunk);

            let rows: Vec<(i64, Option<DateTime<Utc>>)> =
                qb.build_query_as().fetch_all(&self.pool).await?;
            found.extend(rows);
        }

        Ok(found)
    }

    /// Insert or replace one detail.
    ///
    /// An existing summary row for the same id gets the detail's shared
    /// fields so the two never disagree.
    pub async fn upsert_subject_detail(&self, detail: &SubjectDetail) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO subject_details
                (id, kind, level, characters, meanings, readings, component_subject_ids,
                 amalgamation_subject_ids, meaning_mnemonic, meaning_hint, reading_mnemonic,
                 reading_hint, context_sentences, parts_of_speech, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                kind = excluded.kind,
                level = excluded.level,
                characters = excluded.characters,
                meanings = excluded.meanings,
                readings = excluded.readings,
                component_subject_ids = excluded.component_subject_ids,
                amalgamation_subject_ids = excluded.amalgamation_subject_ids,
                meaning_mnemonic = excluded.meaning_mnemonic,
                meaning_hint = excluded.meaning_hint,
                reading_mnemonic = excluded.reading_mnemonic,
                reading_hint = excluded.reading_hint,
                context_sentences = excluded.context_sentences,
                parts_of_speech = excluded.parts_of_speech,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(detail.id)
        .bind(detail.kind.as_str())
        .bind(detail.level)
        .bind(&detail.characters)
        .bind(Json(&detail.meanings))
        .bind(Json(&detail.readings))
        .bind(Json(&detail.component_subject_ids))
        .bind(Json(&detail.amalgamation_subject_ids))
        .bind(&detail.meaning_mnemonic)
        .bind(&detail.meaning_hint)
        .bind(&detail.reading_mnemonic)
        .bind(&detail.reading_hint)
        .bind(Json(&detail.context_sentences))
        .bind(Json(&detail.parts_of_speech))
        .bind(detail.fetched_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE subjects
            SET characters = ?, meanings = ?, readings = ?
            WHERE id = ?
            "#,
        )
        .bind(&detail.characters)
        .bind(Json(&detail.meanings))
        .bind(Json(&detail.readings))
        .bind(detail.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Number of `ids` that have a cached detail
    pub async fn count_subject_details(&self, ids: &[i64]) -> Result<usize> {
        let mut count = 0usize;

        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb =
                QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM subject_details WHERE id IN (");
            push_id_list(&mut qb, chunk);

            let (n,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
            count += n as usize;
        }

        Ok(count)
    }

    // === Invalidation ===

    /// Clear fetch timestamps so the next read of `kind` goes upstream
    pub async fn invalidate(&self, kind: CacheKind, scope: Invalidation<'_>) -> Result<u64> {
        let table = match kind {
            CacheKind::Profile => "profile",
            CacheKind::ReviewQueue => "review_queue",
            CacheKind::SubjectSummary => "subjects",
            CacheKind::SubjectDetail => "subject_details",
        };
        // Review queue rows are keyed by assignment, everything else by subject id.
        let key = match kind {
            CacheKind::ReviewQueue => "assignment_id",
            _ => "id",
        };

        let affected = match scope {
            Invalidation::All => {
                let sql = format!("UPDATE {table} SET fetched_at = NULL");
                sqlx::query(&sql)
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
            }
            Invalidation::Ids(ids) => {
                let mut total = 0;
                for chunk in ids.chunks(ID_CHUNK) {
                    let mut qb = QueryBuilder::<Sqlite>::new(format!(
                        "UPDATE {table} SET fetched_at = NULL WHERE {key} IN ("
                    ));
                    push_id_list(&mut qb, chunk);
                    total += qb.build().execute(&self.pool).await?.rows_affected();
                }
                total
            }
        };

        Ok(affected)
    }
}

/// Append `v1, v2, ...)` as bound parameters
fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    if ids.is_empty() {
        // `IN ()` is valid SQLite and matches nothing.
        qb.push(")");
        return;
    }
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
