//! SQLite schema definition.

/// Complete database schema for optica.
///
/// Money columns are TEXT holding decimal strings; timestamps are TEXT in the
/// rusqlite chrono format, which sorts lexicographically.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Branches
-- ============================================================================

CREATE TABLE IF NOT EXISTS branches (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

-- ============================================================================
-- Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS materials (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    brand TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    sku TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

-- FTS5 virtual table for product search
CREATE VIRTUAL TABLE IF NOT EXISTS products_fts USING fts5(
    sku,
    name,
    category,
    content='products',
    content_rowid='rowid'
);

-- Triggers to keep FTS5 in sync with main table
CREATE TRIGGER IF NOT EXISTS products_ai AFTER INSERT ON products BEGIN
    INSERT INTO products_fts(rowid, sku, name, category)
    VALUES (new.rowid, new.sku, new.name, new.category);
END;

CREATE TRIGGER IF NOT EXISTS products_ad AFTER DELETE ON products BEGIN
    INSERT INTO products_fts(products_fts, rowid, sku, name, category)
    VALUES ('delete', old.rowid, old.sku, old.name, old.category);
END;

CREATE TRIGGER IF NOT EXISTS products_au AFTER UPDATE ON products BEGIN
    INSERT INTO products_fts(products_fts, rowid, sku, name, category)
    VALUES ('delete', old.rowid, old.sku, old.name, old.category);
    INSERT INTO products_fts(rowid, sku, name, category)
    VALUES (new.rowid, new.sku, new.name, new.category);
END;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL,                      -- uppercased, whitespace-collapsed
    age INTEGER NOT NULL DEFAULT 0,
    phone TEXT NOT NULL DEFAULT '',
    phone_key TEXT NOT NULL DEFAULT '',          -- phone without whitespace
    occupation TEXT NOT NULL DEFAULT '',
    address TEXT,
    branch_id TEXT NOT NULL REFERENCES branches(id),
    registered_at TEXT NOT NULL,
    created_by_id TEXT,
    created_by_name TEXT
);

-- One person per (name, phone) when a phone is present
CREATE UNIQUE INDEX IF NOT EXISTS ux_patients_name_phone
    ON patients(name_key, phone_key) WHERE phone_key <> '';
CREATE INDEX IF NOT EXISTS idx_patients_branch ON patients(branch_id);
CREATE INDEX IF NOT EXISTS idx_patients_registered ON patients(registered_at);

-- ============================================================================
-- Visits
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    branch_id TEXT NOT NULL REFERENCES branches(id),
    created_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'created',
    total TEXT,
    paid TEXT,
    balance TEXT,
    lab_shipped_at TEXT,
    estimated_delivery_at TEXT,
    received_at TEXT,
    delivered_at TEXT,
    notes TEXT,
    created_by_id TEXT NOT NULL,
    created_by_name TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id, created_at);
CREATE INDEX IF NOT EXISTS idx_visits_branch ON visits(branch_id, created_at);
CREATE INDEX IF NOT EXISTS idx_visits_status ON visits(status);

CREATE TABLE IF NOT EXISTS visit_acuity (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    condition TEXT NOT NULL,
    eye TEXT NOT NULL,
    denominator INTEGER NOT NULL CHECK (denominator BETWEEN 10 AND 200)
);

CREATE INDEX IF NOT EXISTS idx_acuity_visit ON visit_acuity(visit_id);

CREATE TABLE IF NOT EXISTS visit_refraction (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    eye TEXT NOT NULL,
    distance TEXT NOT NULL,
    sphere TEXT,
    cylinder TEXT,
    axis INTEGER,
    addition TEXT,
    pupillary_distance TEXT,
    oblique_height TEXT,
    UNIQUE (visit_id, eye, distance)
);

CREATE TABLE IF NOT EXISTS visit_materials (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    material_id TEXT NOT NULL REFERENCES materials(id),
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_visit_materials_visit ON visit_materials(visit_id);

CREATE TABLE IF NOT EXISTS visit_frames (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    product_id TEXT NOT NULL REFERENCES products(id),
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_visit_frames_visit ON visit_frames(visit_id);

CREATE TABLE IF NOT EXISTS visit_contact_lenses (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    lens_type TEXT NOT NULL,
    brand TEXT,
    model TEXT,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_visit_lenses_visit ON visit_contact_lenses(visit_id);

CREATE TABLE IF NOT EXISTS visit_concepts (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    concept TEXT NOT NULL,
    amount TEXT NOT NULL,
    user_id TEXT NOT NULL,
    user_name TEXT NOT NULL,
    branch_id TEXT NOT NULL REFERENCES branches(id),
    created_at TEXT NOT NULL,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_concepts_visit ON visit_concepts(visit_id);
CREATE INDEX IF NOT EXISTS idx_concepts_created ON visit_concepts(created_at);

-- ============================================================================
-- Payments (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS payments (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    paid_at TEXT NOT NULL,
    method TEXT NOT NULL CHECK (method IN ('cash', 'card', 'transfer')),
    amount TEXT NOT NULL,
    auth_code TEXT,
    note TEXT
);

CREATE INDEX IF NOT EXISTS idx_payments_visit ON payments(visit_id, paid_at);
CREATE INDEX IF NOT EXISTS idx_payments_paid_at ON payments(paid_at);

CREATE TRIGGER IF NOT EXISTS payments_no_update BEFORE UPDATE ON payments
BEGIN
    SELECT RAISE(ABORT, 'Payments are append-only');
END;

CREATE TRIGGER IF NOT EXISTS payments_no_delete BEFORE DELETE ON payments
BEGIN
    SELECT RAISE(ABORT, 'Payments are append-only');
END;

-- ============================================================================
-- Status History (Append-Only - Hash-chained per visit)
-- ============================================================================

CREATE TABLE IF NOT EXISTS status_history (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    seq INTEGER NOT NULL,
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    user_id TEXT NOT NULL,
    user_name TEXT NOT NULL,
    branch_id TEXT NOT NULL,
    at TEXT NOT NULL,
    notes TEXT,
    lab_kind TEXT CHECK (lab_kind IS NULL OR lab_kind IN ('internal', 'external')),
    lab_id TEXT,
    lab_name TEXT,
    prev_hash TEXT NOT NULL,
    hash TEXT NOT NULL,
    UNIQUE (visit_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_status_history_to ON status_history(to_status, at);

CREATE TRIGGER IF NOT EXISTS status_history_no_update BEFORE UPDATE ON status_history
BEGIN
    SELECT RAISE(ABORT, 'Status history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS status_history_no_delete BEFORE DELETE ON status_history
BEGIN
    SELECT RAISE(ABORT, 'Status history is append-only');
END;

-- ============================================================================
-- Support Tickets
-- ============================================================================

CREATE TABLE IF NOT EXISTS support_tickets (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    user_name TEXT NOT NULL,
    branch_id TEXT NOT NULL,
    email TEXT,
    subject TEXT NOT NULL CHECK (length(trim(subject)) > 0),
    message TEXT NOT NULL CHECK (length(trim(message)) > 0),
    status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_support_tickets_created ON support_tickets(created_at);
"#;
