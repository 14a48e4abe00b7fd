//! SQL schema shared by the SQLite and PostgreSQL backends.
//!
//! Integers are `BIGINT`, timestamps are epoch milliseconds, and the pool
//! and saved revisions are JSON text.

pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pads (
        id TEXT PRIMARY KEY,
        head BIGINT NOT NULL,
        chat_head BIGINT NOT NULL DEFAULT -1,
        public_status BOOLEAN NOT NULL DEFAULT FALSE,
        read_only_id TEXT,
        atext_text TEXT NOT NULL,
        atext_attribs TEXT NOT NULL,
        saved_revisions TEXT NOT NULL DEFAULT '[]',
        pool TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS revisions (
        pad_id TEXT NOT NULL REFERENCES pads(id) ON DELETE CASCADE,
        rev BIGINT NOT NULL,
        changeset TEXT NOT NULL,
        atext_text TEXT,
        atext_attribs TEXT,
        pool TEXT,
        author_id TEXT,
        timestamp BIGINT NOT NULL,
        PRIMARY KEY (pad_id, rev)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_revisions_author ON revisions (author_id)",
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
        pad_id TEXT NOT NULL REFERENCES pads(id) ON DELETE CASCADE,
        seq BIGINT NOT NULL,
        text TEXT NOT NULL,
        author_id TEXT,
        time BIGINT NOT NULL,
        PRIMARY KEY (pad_id, seq)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS readonly2pad (
        read_only_id TEXT PRIMARY KEY,
        pad_id TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pad2readonly (
        pad_id TEXT PRIMARY KEY,
        read_only_id TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS authors (
        id TEXT PRIMARY KEY,
        name TEXT,
        color_id TEXT NOT NULL,
        timestamp BIGINT NOT NULL,
        token TEXT,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS token2author (
        token TEXT PRIMARY KEY,
        author_id TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pad_groups (
        id TEXT PRIMARY KEY
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        group_id TEXT NOT NULL,
        author_id TEXT NOT NULL,
        valid_until BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cookie_sessions (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expires_at BIGINT NOT NULL
    )
    "#,
];
