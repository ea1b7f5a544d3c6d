use rusqlite::{params, Connection, OptionalExtension};

use crate::StoreError;

pub const SCHEMA_VERSION: i64 = 1;

const TABLES: &str = "
CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS locale (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    cldr_plurals TEXT NOT NULL,
    nplurals INTEGER NOT NULL,
    plural_rule TEXT NOT NULL,
    total_strings INTEGER NOT NULL DEFAULT 0,
    approved_strings INTEGER NOT NULL DEFAULT 0,
    pretranslated_strings INTEGER NOT NULL DEFAULT 0,
    strings_with_errors INTEGER NOT NULL DEFAULT 0,
    strings_with_warnings INTEGER NOT NULL DEFAULT 0,
    unreviewed_strings INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS project (
    id INTEGER PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    total_strings INTEGER NOT NULL DEFAULT 0,
    approved_strings INTEGER NOT NULL DEFAULT 0,
    pretranslated_strings INTEGER NOT NULL DEFAULT 0,
    strings_with_errors INTEGER NOT NULL DEFAULT 0,
    strings_with_warnings INTEGER NOT NULL DEFAULT 0,
    unreviewed_strings INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS project_locale (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    locale_id INTEGER NOT NULL REFERENCES locale(id) ON DELETE CASCADE,
    total_strings INTEGER NOT NULL DEFAULT 0,
    approved_strings INTEGER NOT NULL DEFAULT 0,
    pretranslated_strings INTEGER NOT NULL DEFAULT 0,
    strings_with_errors INTEGER NOT NULL DEFAULT 0,
    strings_with_warnings INTEGER NOT NULL DEFAULT 0,
    unreviewed_strings INTEGER NOT NULL DEFAULT 0,
    UNIQUE (project_id, locale_id)
);
CREATE TABLE IF NOT EXISTS repository (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    branch TEXT,
    source INTEGER NOT NULL DEFAULT 1,
    last_synced_revision TEXT,
    UNIQUE (project_id, url)
);
CREATE TABLE IF NOT EXISTS resource (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    format TEXT NOT NULL,
    total_strings INTEGER NOT NULL DEFAULT 0,
    UNIQUE (project_id, path)
);
CREATE TABLE IF NOT EXISTS translated_resource (
    id INTEGER PRIMARY KEY,
    resource_id INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    locale_id INTEGER NOT NULL REFERENCES locale(id) ON DELETE CASCADE,
    total_strings INTEGER NOT NULL DEFAULT 0,
    approved_strings INTEGER NOT NULL DEFAULT 0,
    pretranslated_strings INTEGER NOT NULL DEFAULT 0,
    strings_with_errors INTEGER NOT NULL DEFAULT 0,
    strings_with_warnings INTEGER NOT NULL DEFAULT 0,
    unreviewed_strings INTEGER NOT NULL DEFAULT 0,
    latest_translation_id INTEGER REFERENCES translation(id) ON DELETE SET NULL,
    UNIQUE (resource_id, locale_id)
);
CREATE TABLE IF NOT EXISTS entity (
    id INTEGER PRIMARY KEY,
    resource_id INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    string TEXT NOT NULL,
    string_plural TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL DEFAULT '',
    group_comment TEXT NOT NULL DEFAULT '',
    resource_comment TEXT NOT NULL DEFAULT '',
    context TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL DEFAULT '[]',
    ord INTEGER NOT NULL DEFAULT 0,
    obsolete INTEGER NOT NULL DEFAULT 0,
    date_created TEXT NOT NULL,
    date_obsoleted TEXT
);
CREATE INDEX IF NOT EXISTS idx_entity_resource ON entity (resource_id, obsolete);
CREATE TABLE IF NOT EXISTS translation (
    id INTEGER PRIMARY KEY,
    entity_id INTEGER NOT NULL REFERENCES entity(id) ON DELETE CASCADE,
    locale_id INTEGER NOT NULL REFERENCES locale(id) ON DELETE CASCADE,
    string TEXT NOT NULL,
    plural_form INTEGER,
    approved INTEGER NOT NULL DEFAULT 0,
    pretranslated INTEGER NOT NULL DEFAULT 0,
    fuzzy INTEGER NOT NULL DEFAULT 0,
    rejected INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 0,
    user_id INTEGER REFERENCES user(id) ON DELETE SET NULL,
    approved_user_id INTEGER REFERENCES user(id) ON DELETE SET NULL,
    rejected_user_id INTEGER REFERENCES user(id) ON DELETE SET NULL,
    date TEXT NOT NULL,
    approved_date TEXT,
    rejected_date TEXT
);
CREATE INDEX IF NOT EXISTS idx_translation_entity_locale
    ON translation (entity_id, locale_id, plural_form);
CREATE TABLE IF NOT EXISTS translation_error (
    id INTEGER PRIMARY KEY,
    translation_id INTEGER NOT NULL REFERENCES translation(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    message TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_translation_error ON translation_error (translation_id);
CREATE TABLE IF NOT EXISTS translation_warning (
    id INTEGER PRIMARY KEY,
    translation_id INTEGER NOT NULL REFERENCES translation(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    message TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_translation_warning ON translation_warning (translation_id);
CREATE TABLE IF NOT EXISTS translation_memory (
    id INTEGER PRIMARY KEY,
    entity_id INTEGER REFERENCES entity(id) ON DELETE SET NULL,
    translation_id INTEGER NOT NULL UNIQUE REFERENCES translation(id) ON DELETE CASCADE,
    locale_id INTEGER NOT NULL REFERENCES locale(id) ON DELETE CASCADE,
    project_id INTEGER REFERENCES project(id) ON DELETE SET NULL,
    source TEXT NOT NULL,
    target TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS changed_entity_locale (
    id INTEGER PRIMARY KEY,
    entity_id INTEGER NOT NULL REFERENCES entity(id) ON DELETE CASCADE,
    locale_id INTEGER NOT NULL REFERENCES locale(id) ON DELETE CASCADE,
    marked_at TEXT NOT NULL,
    UNIQUE (entity_id, locale_id)
);
CREATE TABLE IF NOT EXISTS sync_lock (
    project_id INTEGER PRIMARY KEY REFERENCES project(id) ON DELETE CASCADE,
    acquired_at INTEGER NOT NULL
);
";

/// Create the schema on a fresh database or check the version of an
/// existing one.
pub(crate) fn initialize(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| {
            row.get(0)
        })
        .optional()?;
    match version {
        None => {
            tx.execute(
                "INSERT INTO store_meta (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            tx.execute_batch(TABLES)?;
            tracing::debug!(event = "store_schema_created", version = SCHEMA_VERSION);
        }
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) => return Err(StoreError::VersionMismatch(v)),
    }
    tx.commit()?;
    Ok(())
}
