//! libSQL schema.
//!
//! Statements are idempotent so they run on every startup.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS matrix_templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    size INTEGER NOT NULL CHECK (size > 0),
    x_title TEXT NOT NULL,
    y_title TEXT NOT NULL,
    project_id INTEGER
);

CREATE TABLE IF NOT EXISTS cell_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    color TEXT NOT NULL,
    icon TEXT NOT NULL DEFAULT 'default'
);

CREATE TABLE IF NOT EXISTS cell_mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES matrix_templates(id) ON DELETE CASCADE,
    cell_type_id INTEGER NOT NULL REFERENCES cell_types(id),
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    CONSTRAINT unique_template_coordinates UNIQUE (template_id, x, y)
);

CREATE INDEX IF NOT EXISTS idx_cell_mappings_template ON cell_mappings(template_id);
"#;
