//! SQL DDL for initializing the account storage.

/// SQLite schema with:
/// - `username` TEXT PRIMARY KEY (one account per name)
/// - `password_hash` PHC string produced by the password hasher
/// - `credits` INTEGER guarded by `CHECK (credits >= 0)`
/// - `created_at` / `updated_at` RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    username TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,
    credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
