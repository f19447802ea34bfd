//! SQL schema for the Grove SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS` / `OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS grove_groups (
    id          TEXT PRIMARY KEY,
    parent_id   TEXT REFERENCES grove_groups(id) ON DELETE SET NULL,
    domain_id   TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    metadata    TEXT NOT NULL DEFAULT '{}',  -- JSON object
    status      TEXT NOT NULL,               -- 'enabled' | 'disabled'
    created_at  TEXT NOT NULL,               -- RFC 3339 UTC
    updated_at  TEXT,
    updated_by  TEXT,
    CHECK (status IN ('enabled', 'disabled'))
);

-- Relationship tuples. Kinds and domain annotate a tuple but are not part of
-- its identity.
CREATE TABLE IF NOT EXISTS policies (
    domain       TEXT NOT NULL DEFAULT '',
    subject_type TEXT NOT NULL,
    subject_kind TEXT,
    subject      TEXT NOT NULL,
    relation     TEXT NOT NULL,
    object_type  TEXT NOT NULL,
    object_kind  TEXT,
    object       TEXT NOT NULL,
    PRIMARY KEY (subject_type, subject, relation, object_type, object)
);

-- Role relations and the permissions they grant. A relation also grants the
-- permission of the same name.
CREATE TABLE IF NOT EXISTS relation_permissions (
    relation   TEXT NOT NULL,
    permission TEXT NOT NULL,
    PRIMARY KEY (relation, permission)
);

INSERT OR IGNORE INTO relation_permissions (relation, permission) VALUES
    ('administrator', 'admin'),
    ('administrator', 'delete'),
    ('administrator', 'edit'),
    ('administrator', 'share'),
    ('administrator', 'view'),
    ('administrator', 'membership'),
    ('editor',        'edit'),
    ('editor',        'share'),
    ('editor',        'view'),
    ('editor',        'membership'),
    ('viewer',        'view'),
    ('viewer',        'membership'),
    ('member',        'view'),
    ('member',        'membership');

CREATE INDEX IF NOT EXISTS groups_parent_idx   ON grove_groups(parent_id);
CREATE INDEX IF NOT EXISTS groups_domain_idx   ON grove_groups(domain_id);
CREATE INDEX IF NOT EXISTS policies_object_idx ON policies(object_type, object);

PRAGMA user_version = 1;
";
