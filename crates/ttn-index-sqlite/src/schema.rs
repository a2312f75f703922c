//! SQL schema for the tracker index.
//!
//! Executed once at connection startup; idempotent thanks to
//! `IF NOT EXISTS`. The layout version lives in `index_meta`, separate from
//! the record tables, and is written by the index after this batch runs.

/// Full schema DDL.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS index_meta (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS trackers (
    id          INTEGER PRIMARY KEY,
    url         TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL,
    updated     TEXT NOT NULL,   -- RFC 3339 UTC
    accessed    TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE TABLE IF NOT EXISTS things (
    id          INTEGER PRIMARY KEY,
    thing_id    TEXT NOT NULL UNIQUE,
    url         TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    authors     TEXT NOT NULL,   -- names, space separated
    licenses    TEXT NOT NULL,   -- space separated
    tags        TEXT NOT NULL,   -- comma separated
    tracker     TEXT NOT NULL    -- url of the last writer, not a foreign key
);

CREATE INDEX IF NOT EXISTS things_url_idx ON things(url);

-- External-content FTS tables: the record tables own the text, the triggers
-- below keep the search index in step with every insert/update/delete.
CREATE VIRTUAL TABLE IF NOT EXISTS trackers_fts USING fts5(
    description,
    content='trackers',
    content_rowid='id',
    tokenize='porter unicode61 remove_diacritics 2'
);

CREATE VIRTUAL TABLE IF NOT EXISTS things_fts USING fts5(
    title,
    description,
    tags,
    licenses,
    content='things',
    content_rowid='id',
    tokenize='porter unicode61 remove_diacritics 2'
);

CREATE TRIGGER IF NOT EXISTS trackers_ai AFTER INSERT ON trackers BEGIN
    INSERT INTO trackers_fts(rowid, description) VALUES (new.id, new.description);
END;

CREATE TRIGGER IF NOT EXISTS trackers_ad AFTER DELETE ON trackers BEGIN
    INSERT INTO trackers_fts(trackers_fts, rowid, description)
    VALUES ('delete', old.id, old.description);
END;

CREATE TRIGGER IF NOT EXISTS trackers_au AFTER UPDATE ON trackers BEGIN
    INSERT INTO trackers_fts(trackers_fts, rowid, description)
    VALUES ('delete', old.id, old.description);
    INSERT INTO trackers_fts(rowid, description) VALUES (new.id, new.description);
END;

CREATE TRIGGER IF NOT EXISTS things_ai AFTER INSERT ON things BEGIN
    INSERT INTO things_fts(rowid, title, description, tags, licenses)
    VALUES (new.id, new.title, new.description, new.tags, new.licenses);
END;

CREATE TRIGGER IF NOT EXISTS things_ad AFTER DELETE ON things BEGIN
    INSERT INTO things_fts(things_fts, rowid, title, description, tags, licenses)
    VALUES ('delete', old.id, old.title, old.description, old.tags, old.licenses);
END;

CREATE TRIGGER IF NOT EXISTS things_au AFTER UPDATE ON things BEGIN
    INSERT INTO things_fts(things_fts, rowid, title, description, tags, licenses)
    VALUES ('delete', old.id, old.title, old.description, old.tags, old.licenses);
    INSERT INTO things_fts(rowid, title, description, tags, licenses)
    VALUES (new.id, new.title, new.description, new.tags, new.licenses);
END;
";
