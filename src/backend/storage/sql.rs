/**
 * SQL Store
 *
 * sqlx-backed `PadStore` for SQLite and PostgreSQL. Both databases accept
 * the same statement text (`$N` placeholders, `ON CONFLICT` upserts), so
 * each operation is written once and dispatched onto whichever pool is
 * configured through `on_pool!`.
 *
 * Pad removal deletes dependent rows explicitly inside one transaction;
 * the schema's cascades are a second line only when foreign keys are on.
 */
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use super::schema::SCHEMA;
use super::{
    AuthorRecord, ChatRecord, GroupRecord, PadListEntry, PadPage, PadQuery, PadRecord, PadSortBy, PadStore,
    RevisionMeta, RevisionRecord, SessionRecord, StoreError, StoreResult,
};
use crate::shared::apool::PoolJson;
use crate::shared::atext::AText;
use crate::shared::message::SavedRevision;

#[derive(Clone)]
pub enum SqlPool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

/// Runs the same expression against whichever pool is active.
macro_rules! on_pool {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $pool {
            SqlPool::Sqlite($p) => $body,
            SqlPool::Postgres($p) => $body,
        }
    };
}

pub struct SqlStore {
    pool: SqlPool,
}

#[derive(sqlx::FromRow)]
struct PadRow {
    id: String,
    head: i64,
    chat_head: i64,
    public_status: bool,
    read_only_id: Option<String>,
    atext_text: String,
    atext_attribs: String,
    saved_revisions: String,
    pool: String,
    created_at: i64,
    updated_at: i64,
}

impl PadRow {
    fn into_record(self) -> StoreResult<PadRecord> {
        Ok(PadRecord {
            id: self.id,
            head: self.head,
            chat_head: self.chat_head,
            public_status: self.public_status,
            read_only_id: self.read_only_id,
            atext: AText::with_attribs(self.atext_text, self.atext_attribs),
            pool: serde_json::from_str::<PoolJson>(&self.pool)?,
            saved_revisions: serde_json::from_str::<Vec<SavedRevision>>(&self.saved_revisions)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RevisionRow {
    pad_id: String,
    rev: i64,
    changeset: String,
    atext_text: Option<String>,
    atext_attribs: Option<String>,
    pool: Option<String>,
    author_id: Option<String>,
    timestamp: i64,
}

impl RevisionRow {
    fn into_record(self) -> StoreResult<RevisionRecord> {
        let atext = match (self.atext_text, self.atext_attribs) {
            (Some(text), Some(attribs)) => Some(AText::with_attribs(text, attribs)),
            _ => None,
        };
        let pool = self.pool.map(|raw| serde_json::from_str::<PoolJson>(&raw)).transpose()?;
        Ok(RevisionRecord {
            pad_id: self.pad_id,
            rev: self.rev,
            changeset: self.changeset,
            atext,
            pool,
            author_id: self.author_id,
            timestamp: self.timestamp,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    pad_id: String,
    seq: i64,
    text: String,
    author_id: Option<String>,
    time: i64,
    user_name: Option<String>,
}

impl From<ChatRow> for ChatRecord {
    fn from(row: ChatRow) -> Self {
        Self {
            pad_id: row.pad_id,
            seq: row.seq,
            text: row.text,
            author_id: row.author_id,
            time: row.time,
            user_name: row.user_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: String,
    name: Option<String>,
    color_id: String,
    timestamp: i64,
    token: Option<String>,
    created_at: i64,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color_id: row.color_id,
            timestamp: row.timestamp,
            token: row.token,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    group_id: String,
    author_id: String,
    valid_until: i64,
}

const PAD_COLUMNS: &str = "id, head, chat_head, public_status, read_only_id, atext_text, atext_attribs, \
     saved_revisions, pool, created_at, updated_at";
const REVISION_COLUMNS: &str = "pad_id, rev, changeset, atext_text, atext_attribs, pool, author_id, timestamp";

/// Escapes LIKE wildcards and wraps the pattern for a substring match.
fn like_pattern(pattern: &str) -> String {
    let escaped = pattern
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl SqlStore {
    /// Opens a SQLite database, creating the file if needed.
    pub async fn connect_sqlite(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        // An in-memory database exists per connection.
        let max = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await?;
        let store = Self {
            pool: SqlPool::Sqlite(pool),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn connect_postgres(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        let store = Self {
            pool: SqlPool::Postgres(pool),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            on_pool!(&self.pool, |p| sqlx::query(statement).execute(p).await.map(|r| r.rows_affected()))?;
        }
        tracing::info!("[Storage] Schema ready");
        Ok(())
    }

    async fn insert_pad(&self, pad: &PadRecord) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO pads ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            PAD_COLUMNS
        );
        let pool_json = serde_json::to_string(&pad.pool)?;
        let saved = serde_json::to_string(&pad.saved_revisions)?;
        on_pool!(&self.pool, |p| sqlx::query(&sql)
            .bind(&pad.id)
            .bind(pad.head)
            .bind(pad.chat_head)
            .bind(pad.public_status)
            .bind(&pad.read_only_id)
            .bind(&pad.atext.text)
            .bind(&pad.atext.attribs)
            .bind(&saved)
            .bind(&pool_json)
            .bind(pad.created_at)
            .bind(pad.updated_at)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        Ok(())
    }
}

/// Rows referencing a missing pad trip the foreign key on insert.
fn missing_pad(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::PadNotFound,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl PadStore for SqlStore {
    async fn does_pad_exist(&self, pad_id: &str) -> StoreResult<bool> {
        let count: i64 = on_pool!(&self.pool, |p| sqlx::query_scalar("SELECT COUNT(*) FROM pads WHERE id = $1")
            .bind(pad_id)
            .fetch_one(p)
            .await)?;
        Ok(count > 0)
    }

    async fn create_pad(&self, pad: &PadRecord) -> StoreResult<()> {
        if self.does_pad_exist(&pad.id).await? {
            return Err(StoreError::PadAlreadyExists);
        }
        self.insert_pad(pad).await
    }

    async fn save_pad(&self, pad: &PadRecord) -> StoreResult<()> {
        let pool_json = serde_json::to_string(&pad.pool)?;
        let saved = serde_json::to_string(&pad.saved_revisions)?;
        let affected = on_pool!(&self.pool, |p| sqlx::query(
            "UPDATE pads SET head = $2, chat_head = $3, public_status = $4, read_only_id = $5, \
             atext_text = $6, atext_attribs = $7, saved_revisions = $8, pool = $9, updated_at = $10 \
             WHERE id = $1"
        )
        .bind(&pad.id)
        .bind(pad.head)
        .bind(pad.chat_head)
        .bind(pad.public_status)
        .bind(&pad.read_only_id)
        .bind(&pad.atext.text)
        .bind(&pad.atext.attribs)
        .bind(&saved)
        .bind(&pool_json)
        .bind(pad.updated_at)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))?;
        if affected == 0 {
            return Err(StoreError::PadNotFound);
        }
        Ok(())
    }

    async fn get_pad(&self, pad_id: &str) -> StoreResult<PadRecord> {
        let sql = format!("SELECT {} FROM pads WHERE id = $1", PAD_COLUMNS);
        let row: Option<PadRow> = on_pool!(&self.pool, |p| sqlx::query_as(&sql)
            .bind(pad_id)
            .fetch_optional(p)
            .await)?;
        row.ok_or(StoreError::PadNotFound)?.into_record()
    }

    async fn get_pad_ids(&self) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = on_pool!(&self.pool, |p| sqlx::query_scalar("SELECT id FROM pads ORDER BY id")
            .fetch_all(p)
            .await)?;
        Ok(ids)
    }

    async fn remove_pad(&self, pad_id: &str) -> StoreResult<()> {
        if !self.does_pad_exist(pad_id).await? {
            return Err(StoreError::PadNotFound);
        }
        const STATEMENTS: &[&str] = &[
            "DELETE FROM revisions WHERE pad_id = $1",
            "DELETE FROM chat_messages WHERE pad_id = $1",
            "DELETE FROM readonly2pad WHERE pad_id = $1",
            "DELETE FROM pad2readonly WHERE pad_id = $1",
            "DELETE FROM pads WHERE id = $1",
        ];
        on_pool!(&self.pool, |p| {
            let mut tx = p.begin().await?;
            for statement in STATEMENTS {
                sqlx::query(statement).bind(pad_id).execute(&mut *tx).await?;
            }
            tx.commit().await
        })?;
        Ok(())
    }

    async fn query_pad(&self, query: &PadQuery) -> StoreResult<PadPage> {
        let pattern = like_pattern(query.pattern.as_deref().unwrap_or(""));
        let order = match query.sort_by {
            PadSortBy::PadName => "id",
            PadSortBy::LastEdited => "updated_at",
        };
        let direction = if query.ascending { "ASC" } else { "DESC" };
        let limit = if query.limit > 0 { query.limit } else { i64::MAX };

        let total: i64 = on_pool!(&self.pool, |p| sqlx::query_scalar(
            "SELECT COUNT(*) FROM pads WHERE LOWER(id) LIKE $1 ESCAPE '\\'"
        )
        .bind(&pattern)
        .fetch_one(p)
        .await)?;

        let sql = format!(
            "SELECT id, updated_at, head FROM pads WHERE LOWER(id) LIKE $1 ESCAPE '\\' \
             ORDER BY {order} {direction}, id {direction} LIMIT $2 OFFSET $3"
        );
        let rows: Vec<(String, i64, i64)> = on_pool!(&self.pool, |p| sqlx::query_as(&sql)
            .bind(&pattern)
            .bind(limit)
            .bind(query.offset.max(0))
            .fetch_all(p)
            .await)?;
        let pads = rows
            .into_iter()
            .map(|(padname, last_edited, revision_number)| PadListEntry {
                padname,
                last_edited,
                revision_number,
            })
            .collect();
        Ok(PadPage { total, pads })
    }

    async fn save_revision(&self, revision: &RevisionRecord) -> StoreResult<()> {
        let pool_json = revision.pool.as_ref().map(serde_json::to_string).transpose()?;
        let text = revision.atext.as_ref().map(|a| a.text.as_str());
        let attribs = revision.atext.as_ref().map(|a| a.attribs.as_str());
        let sql = format!(
            "INSERT INTO revisions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (pad_id, rev) DO UPDATE SET changeset = excluded.changeset, \
             atext_text = excluded.atext_text, atext_attribs = excluded.atext_attribs, \
             pool = excluded.pool, author_id = excluded.author_id, timestamp = excluded.timestamp",
            REVISION_COLUMNS
        );
        on_pool!(&self.pool, |p| sqlx::query(&sql)
            .bind(&revision.pad_id)
            .bind(revision.rev)
            .bind(&revision.changeset)
            .bind(text)
            .bind(attribs)
            .bind(&pool_json)
            .bind(&revision.author_id)
            .bind(revision.timestamp)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .map_err(missing_pad)?;
        Ok(())
    }

    async fn get_revision(&self, pad_id: &str, rev: i64) -> StoreResult<RevisionRecord> {
        let sql = format!("SELECT {} FROM revisions WHERE pad_id = $1 AND rev = $2", REVISION_COLUMNS);
        let row: Option<RevisionRow> = on_pool!(&self.pool, |p| sqlx::query_as(&sql)
            .bind(pad_id)
            .bind(rev)
            .fetch_optional(p)
            .await)?;
        row.ok_or(StoreError::RevisionNotFound)?.into_record()
    }

    async fn get_revisions(&self, pad_id: &str, start: i64, end: i64) -> StoreResult<Vec<RevisionRecord>> {
        let sql = format!(
            "SELECT {} FROM revisions WHERE pad_id = $1 AND rev >= $2 AND rev <= $3 ORDER BY rev",
            REVISION_COLUMNS
        );
        let rows: Vec<RevisionRow> = on_pool!(&self.pool, |p| sqlx::query_as(&sql)
            .bind(pad_id)
            .bind(start)
            .bind(end)
            .fetch_all(p)
            .await)?;
        let contiguous = rows.iter().zip(start..).all(|(row, expected)| row.rev == expected);
        if rows.len() as i64 != end - start + 1 || !contiguous {
            return Err(StoreError::RevisionNotFound);
        }
        rows.into_iter().map(RevisionRow::into_record).collect()
    }

    async fn remove_revision(&self, pad_id: &str, rev: i64) -> StoreResult<()> {
        let result = on_pool!(&self.pool, |p| sqlx::query("DELETE FROM revisions WHERE pad_id = $1 AND rev = $2")
            .bind(pad_id)
            .bind(rev)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        if result == 0 {
            return Err(StoreError::RevisionNotFound);
        }
        Ok(())
    }

    async fn remove_revisions_of_pad(&self, pad_id: &str) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query("DELETE FROM revisions WHERE pad_id = $1")
            .bind(pad_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        Ok(())
    }

    async fn get_pad_meta_data(&self, pad_id: &str, rev: i64) -> StoreResult<RevisionMeta> {
        let row: Option<(i64, i64)> = on_pool!(&self.pool, |p| sqlx::query_as(
            "SELECT rev, timestamp FROM revisions WHERE pad_id = $1 AND rev = $2"
        )
        .bind(pad_id)
        .bind(rev)
        .fetch_optional(p)
        .await)?;
        let (rev, timestamp) = row.ok_or(StoreError::RevisionNotFound)?;
        Ok(RevisionMeta { rev, timestamp })
    }

    async fn get_pad_ids_of_author(&self, author_id: &str) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = on_pool!(&self.pool, |p| sqlx::query_scalar(
            "SELECT DISTINCT pad_id FROM revisions WHERE author_id = $1 ORDER BY pad_id"
        )
        .bind(author_id)
        .fetch_all(p)
        .await)?;
        Ok(ids)
    }

    async fn save_chat_message(&self, message: &ChatRecord) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query(
            "INSERT INTO chat_messages (pad_id, seq, text, author_id, time) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (pad_id, seq) DO UPDATE SET text = excluded.text, author_id = excluded.author_id, \
             time = excluded.time"
        )
        .bind(&message.pad_id)
        .bind(message.seq)
        .bind(&message.text)
        .bind(&message.author_id)
        .bind(message.time)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))
        .map_err(missing_pad)?;
        Ok(())
    }

    async fn save_chat_head_of_pad(&self, pad_id: &str, head: i64) -> StoreResult<()> {
        let affected = on_pool!(&self.pool, |p| sqlx::query("UPDATE pads SET chat_head = $1 WHERE id = $2")
            .bind(head)
            .bind(pad_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        if affected == 0 {
            return Err(StoreError::PadNotFound);
        }
        Ok(())
    }

    async fn get_chats_of_pad(&self, pad_id: &str, start: i64, end: i64) -> StoreResult<Vec<ChatRecord>> {
        let rows: Vec<ChatRow> = on_pool!(&self.pool, |p| sqlx::query_as(
            "SELECT c.pad_id, c.seq, c.text, c.author_id, c.time, a.name AS user_name \
             FROM chat_messages c LEFT JOIN authors a ON a.id = c.author_id \
             WHERE c.pad_id = $1 AND c.seq >= $2 AND c.seq <= $3 ORDER BY c.seq"
        )
        .bind(pad_id)
        .bind(start)
        .bind(end)
        .fetch_all(p)
        .await)?;
        Ok(rows.into_iter().map(ChatRecord::from).collect())
    }

    async fn get_author_ids_of_pad_chats(&self, pad_id: &str) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = on_pool!(&self.pool, |p| sqlx::query_scalar(
            "SELECT DISTINCT author_id FROM chat_messages WHERE pad_id = $1 AND author_id IS NOT NULL \
             ORDER BY author_id"
        )
        .bind(pad_id)
        .fetch_all(p)
        .await)?;
        Ok(ids)
    }

    async fn remove_chat(&self, pad_id: &str) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query("DELETE FROM chat_messages WHERE pad_id = $1")
            .bind(pad_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        Ok(())
    }

    async fn set_read_only_id(&self, pad_id: &str, read_only_id: &str) -> StoreResult<()> {
        on_pool!(&self.pool, |p| {
            let mut tx = p.begin().await?;
            let inserted = sqlx::query(
                "INSERT INTO pad2readonly (pad_id, read_only_id) VALUES ($1, $2) ON CONFLICT (pad_id) DO NOTHING",
            )
            .bind(pad_id)
            .bind(read_only_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if inserted > 0 {
                sqlx::query("INSERT INTO readonly2pad (read_only_id, pad_id) VALUES ($1, $2)")
                    .bind(read_only_id)
                    .bind(pad_id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await
        })?;
        Ok(())
    }

    async fn get_readonly_pad(&self, pad_id: &str) -> StoreResult<String> {
        let id: Option<String> = on_pool!(&self.pool, |p| sqlx::query_scalar(
            "SELECT read_only_id FROM pad2readonly WHERE pad_id = $1"
        )
        .bind(pad_id)
        .fetch_optional(p)
        .await)?;
        id.ok_or(StoreError::ReadOnlyIdNotFound)
    }

    async fn get_pad_by_read_only_id(&self, read_only_id: &str) -> StoreResult<String> {
        let id: Option<String> = on_pool!(&self.pool, |p| sqlx::query_scalar(
            "SELECT pad_id FROM readonly2pad WHERE read_only_id = $1"
        )
        .bind(read_only_id)
        .fetch_optional(p)
        .await)?;
        id.ok_or(StoreError::ReadOnlyIdNotFound)
    }

    async fn save_author(&self, author: &AuthorRecord) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query(
            "INSERT INTO authors (id, name, color_id, timestamp, token, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET name = excluded.name, color_id = excluded.color_id, \
             timestamp = excluded.timestamp, token = excluded.token"
        )
        .bind(&author.id)
        .bind(&author.name)
        .bind(&author.color_id)
        .bind(author.timestamp)
        .bind(&author.token)
        .bind(author.created_at)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))?;
        Ok(())
    }

    async fn get_author(&self, author_id: &str) -> StoreResult<AuthorRecord> {
        let row: Option<AuthorRow> = on_pool!(&self.pool, |p| sqlx::query_as(
            "SELECT id, name, color_id, timestamp, token, created_at FROM authors WHERE id = $1"
        )
        .bind(author_id)
        .fetch_optional(p)
        .await)?;
        row.map(AuthorRecord::from).ok_or(StoreError::AuthorNotFound)
    }

    async fn get_authors(&self, author_ids: &[String]) -> StoreResult<Vec<AuthorRecord>> {
        let mut authors = Vec::with_capacity(author_ids.len());
        for id in author_ids {
            match self.get_author(id).await {
                Ok(author) => authors.push(author),
                Err(StoreError::AuthorNotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(authors)
    }

    async fn get_author_by_token(&self, token: &str) -> StoreResult<String> {
        let id: Option<String> = on_pool!(&self.pool, |p| sqlx::query_scalar(
            "SELECT author_id FROM token2author WHERE token = $1"
        )
        .bind(token)
        .fetch_optional(p)
        .await)?;
        id.ok_or(StoreError::AuthorNotFound)
    }

    async fn set_author_by_token(&self, token: &str, author_id: &str) -> StoreResult<()> {
        on_pool!(&self.pool, |p| {
            let mut tx = p.begin().await?;
            sqlx::query(
                "INSERT INTO token2author (token, author_id) VALUES ($1, $2) \
                 ON CONFLICT (token) DO UPDATE SET author_id = excluded.author_id",
            )
            .bind(token)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("UPDATE authors SET token = $1 WHERE id = $2")
                .bind(token)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await
        })?;
        Ok(())
    }

    async fn save_author_name(&self, author_id: &str, name: &str) -> StoreResult<()> {
        let affected = on_pool!(&self.pool, |p| sqlx::query("UPDATE authors SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(author_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        if affected == 0 {
            return Err(StoreError::AuthorNotFound);
        }
        Ok(())
    }

    async fn save_author_color(&self, author_id: &str, color: &str) -> StoreResult<()> {
        let affected = on_pool!(&self.pool, |p| sqlx::query("UPDATE authors SET color_id = $1 WHERE id = $2")
            .bind(color)
            .bind(author_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        if affected == 0 {
            return Err(StoreError::AuthorNotFound);
        }
        Ok(())
    }

    async fn save_group(&self, group: &GroupRecord) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query("INSERT INTO pad_groups (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(&group.id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        Ok(())
    }

    async fn remove_group(&self, group_id: &str) -> StoreResult<()> {
        let affected = on_pool!(&self.pool, |p| sqlx::query("DELETE FROM pad_groups WHERE id = $1")
            .bind(group_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        if affected == 0 {
            return Err(StoreError::GroupNotFound);
        }
        Ok(())
    }

    async fn get_group(&self, group_id: &str) -> StoreResult<GroupRecord> {
        let id: Option<String> = on_pool!(&self.pool, |p| sqlx::query_scalar("SELECT id FROM pad_groups WHERE id = $1")
            .bind(group_id)
            .fetch_optional(p)
            .await)?;
        id.map(|id| GroupRecord { id }).ok_or(StoreError::GroupNotFound)
    }

    async fn set_session_by_id(&self, session: &SessionRecord) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query(
            "INSERT INTO sessions (id, group_id, author_id, valid_until) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET group_id = excluded.group_id, author_id = excluded.author_id, \
             valid_until = excluded.valid_until"
        )
        .bind(&session.id)
        .bind(&session.group_id)
        .bind(&session.author_id)
        .bind(session.valid_until)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))?;
        Ok(())
    }

    async fn get_session_by_id(&self, session_id: &str) -> StoreResult<SessionRecord> {
        let row: Option<SessionRow> = on_pool!(&self.pool, |p| sqlx::query_as(
            "SELECT id, group_id, author_id, valid_until FROM sessions WHERE id = $1"
        )
        .bind(session_id)
        .fetch_optional(p)
        .await)?;
        let row = row.ok_or(StoreError::SessionNotFound)?;
        Ok(SessionRecord {
            id: row.id,
            group_id: row.group_id,
            author_id: row.author_id,
            valid_until: row.valid_until,
        })
    }

    async fn remove_session_by_id(&self, session_id: &str) -> StoreResult<()> {
        let affected = on_pool!(&self.pool, |p| sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        if affected == 0 {
            return Err(StoreError::SessionNotFound);
        }
        Ok(())
    }

    async fn get_cookie_session(&self, key: &str) -> StoreResult<Option<String>> {
        let now = chrono::Utc::now().timestamp_millis();
        let value: Option<String> = on_pool!(&self.pool, |p| sqlx::query_scalar(
            "SELECT value FROM cookie_sessions WHERE key = $1 AND expires_at > $2"
        )
        .bind(key)
        .bind(now)
        .fetch_optional(p)
        .await)?;
        Ok(value)
    }

    async fn set_cookie_session(&self, key: &str, value: &str, expires_at: i64) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query(
            "INSERT INTO cookie_sessions (key, value, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at"
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))?;
        Ok(())
    }

    async fn delete_cookie_session(&self, key: &str) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query("DELETE FROM cookie_sessions WHERE key = $1")
            .bind(key)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        Ok(())
    }

    async fn cleanup_expired_cookie_sessions(&self, now: i64) -> StoreResult<u64> {
        let removed = on_pool!(&self.pool, |p| sqlx::query("DELETE FROM cookie_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        Ok(removed)
    }

    async fn reset_cookie_sessions(&self) -> StoreResult<()> {
        on_pool!(&self.pool, |p| sqlx::query("DELETE FROM cookie_sessions").execute(p).await.map(|r| r.rows_affected()))?;
        Ok(())
    }
}
