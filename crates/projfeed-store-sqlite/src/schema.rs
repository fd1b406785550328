//! SQL schema for the projfeed SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS notes (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id     INTEGER NOT NULL,
    author_id      TEXT    NOT NULL,
    body           TEXT    NOT NULL,
    parent_note_id INTEGER REFERENCES notes(id),
    client_req_id  TEXT,
    created_at     TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS comments (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id        INTEGER NOT NULL,
    author_id         TEXT    NOT NULL,
    body              TEXT    NOT NULL,
    parent_comment_id INTEGER REFERENCES comments(id),
    client_req_id     TEXT,
    created_at        TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS estimates (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id          INTEGER NOT NULL,
    author_id           TEXT    NOT NULL,
    status              TEXT    NOT NULL DEFAULT 'draft',
    estimate_type       TEXT    NOT NULL,
    estimate_date       TEXT,             -- YYYY-MM-DD
    estimate_award_year INTEGER,
    total_amount        REAL    NOT NULL DEFAULT 0,  -- maintained by triggers
    client_req_id       TEXT,
    created_at          TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS estimate_tasks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    estimate_id INTEGER NOT NULL REFERENCES estimates(id),
    sort_order  INTEGER NOT NULL,
    code        TEXT    NOT NULL DEFAULT '',
    description TEXT    NOT NULL DEFAULT '',
    amount      REAL    NOT NULL DEFAULT 0,
    created_by  TEXT,
    created_at  TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (estimate_id, sort_order)
);

-- Events are strictly append-only.
CREATE TABLE IF NOT EXISTS events (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id    INTEGER NOT NULL,
    actor_id      TEXT    NOT NULL,
    event_type    TEXT    NOT NULL,
    subject_table TEXT    NOT NULL,
    subject_id    INTEGER NOT NULL,
    summary       TEXT    NOT NULL DEFAULT '',
    payload       TEXT    NOT NULL DEFAULT '{}',  -- JSON object
    client_req_id TEXT,
    created_at    TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS event_comments (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id          INTEGER NOT NULL REFERENCES events(id),
    author_id         TEXT    NOT NULL,
    body              TEXT    NOT NULL,
    parent_comment_id INTEGER REFERENCES event_comments(id),
    client_req_id     TEXT,
    created_at        TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS inflators (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    year            INTEGER NOT NULL UNIQUE,
    inflation_index REAL    NOT NULL
);

CREATE TABLE IF NOT EXISTS aceps (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    agency   TEXT    NOT NULL,
    cip      INTEGER NOT NULL,
    category INTEGER NOT NULL,
    element  INTEGER NOT NULL,
    project  INTEGER
);

-- Client request ids are unique per table.
CREATE UNIQUE INDEX IF NOT EXISTS notes_client_req_idx
    ON notes(client_req_id) WHERE client_req_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS comments_client_req_idx
    ON comments(client_req_id) WHERE client_req_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS estimates_client_req_idx
    ON estimates(client_req_id) WHERE client_req_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS event_comments_client_req_idx
    ON event_comments(client_req_id) WHERE client_req_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS events_client_req_idx
    ON events(subject_table, client_req_id) WHERE client_req_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS events_project_idx  ON events(project_id, created_at);
CREATE INDEX IF NOT EXISTS events_subject_idx  ON events(subject_table, subject_id);
CREATE INDEX IF NOT EXISTS event_comments_idx  ON event_comments(event_id);

-- estimates.total_amount is the rounded sum of its task amounts.
CREATE TRIGGER IF NOT EXISTS estimate_tasks_total_insert
AFTER INSERT ON estimate_tasks BEGIN
    UPDATE estimates
       SET total_amount = (SELECT ROUND(COALESCE(SUM(amount), 0), 2)
                             FROM estimate_tasks WHERE estimate_id = NEW.estimate_id)
     WHERE id = NEW.estimate_id;
END;

CREATE TRIGGER IF NOT EXISTS estimate_tasks_total_update
AFTER UPDATE OF amount, estimate_id ON estimate_tasks BEGIN
    UPDATE estimates
       SET total_amount = (SELECT ROUND(COALESCE(SUM(amount), 0), 2)
                             FROM estimate_tasks WHERE estimate_id = estimates.id)
     WHERE id IN (OLD.estimate_id, NEW.estimate_id);
END;

CREATE TRIGGER IF NOT EXISTS estimate_tasks_total_delete
AFTER DELETE ON estimate_tasks BEGIN
    UPDATE estimates
       SET total_amount = (SELECT ROUND(COALESCE(SUM(amount), 0), 2)
                             FROM estimate_tasks WHERE estimate_id = OLD.estimate_id)
     WHERE id = OLD.estimate_id;
END;

PRAGMA user_version = 1;
";
