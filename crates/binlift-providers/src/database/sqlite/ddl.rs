//! `SQLite` schema for the structured store.
//!
//! Applied idempotently at connect time. Timestamps are Unix epoch seconds;
//! JSON-shaped columns carry serialized domain values and end in `_json`.

/// All DDL statements in dependency order.
pub const DDL: &[&str] = &[
    // Job rows persist past their result payloads for audit; the claim
    // index serves the hot `status/visible_at` scan in priority order.
    r"
    CREATE TABLE IF NOT EXISTS jobs (
        id               TEXT PRIMARY KEY,
        owner            TEXT NOT NULL,
        file_sha256      TEXT NOT NULL,
        status           TEXT NOT NULL,
        progress         REAL NOT NULL DEFAULT 0,
        priority         INTEGER NOT NULL DEFAULT 0,
        translation_json TEXT,
        worker_id        TEXT,
        claim_expires_at INTEGER,
        visible_at       INTEGER NOT NULL,
        attempts         INTEGER NOT NULL DEFAULT 0,
        max_attempts     INTEGER NOT NULL DEFAULT 3,
        error_json       TEXT,
        idempotency_key  TEXT,
        result_present   INTEGER NOT NULL DEFAULT 0,
        metadata_json    TEXT NOT NULL DEFAULT '{}',
        created_at       INTEGER NOT NULL,
        started_at       INTEGER,
        completed_at     INTEGER
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_jobs_claim
        ON jobs (status, visible_at, priority DESC, created_at ASC)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_idempotency
        ON jobs (owner, idempotency_key) WHERE idempotency_key IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_jobs_owner ON jobs (owner, status)",
    r"
    CREATE TABLE IF NOT EXISTS artifacts (
        sha256               TEXT PRIMARY KEY,
        size                 INTEGER NOT NULL,
        format               TEXT NOT NULL,
        architecture         TEXT NOT NULL,
        platform             TEXT NOT NULL,
        path_in_store        TEXT NOT NULL,
        ref_count            INTEGER NOT NULL DEFAULT 1,
        created_at           INTEGER NOT NULL,
        last_unreferenced_at INTEGER
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS usage (
        owner          TEXT NOT NULL,
        provider_id    TEXT NOT NULL,
        day            TEXT NOT NULL,
        operation_type TEXT NOT NULL,
        tokens_used    INTEGER NOT NULL DEFAULT 0,
        requests       INTEGER NOT NULL DEFAULT 0,
        cost           REAL NOT NULL DEFAULT 0,
        PRIMARY KEY (owner, provider_id, day, operation_type)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS rate_windows (
        subject      TEXT NOT NULL,
        endpoint     TEXT NOT NULL,
        window_start INTEGER NOT NULL,
        count        INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (subject, endpoint, window_start)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS upload_sessions (
        id                 TEXT PRIMARY KEY,
        owner              TEXT NOT NULL,
        created_at         INTEGER NOT NULL,
        expires_at         INTEGER NOT NULL,
        accepted_refs_json TEXT NOT NULL DEFAULT '[]'
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_upload_sessions_expiry ON upload_sessions (expires_at)",
    r"
    CREATE TABLE IF NOT EXISTS api_keys (
        id         TEXT PRIMARY KEY,
        owner      TEXT NOT NULL,
        tier       TEXT NOT NULL,
        key_hash   TEXT NOT NULL UNIQUE,
        active     INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL
    )
    ",
    // Sums are stored raw; means are computed on read so the upsert stays a
    // single statement.
    r"
    CREATE TABLE IF NOT EXISTS prompt_metrics (
        template_id    TEXT NOT NULL,
        provider_id    TEXT NOT NULL,
        total_uses     INTEGER NOT NULL DEFAULT 0,
        successes      INTEGER NOT NULL DEFAULT 0,
        quality_sum    REAL NOT NULL DEFAULT 0,
        quality_count  INTEGER NOT NULL DEFAULT 0,
        latency_sum_ms INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (template_id, provider_id)
    )
    ",
];
