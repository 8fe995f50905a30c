//! Test fixtures for reconciliation tests
//!
//! The declaration is the demo student-app config. The legacy database is the
//! drifted schema an older deployment of the app left behind:
//! - `training_centers.name` and `batches.name` predate the `*_name` columns
//! - several columns were added later and never migrated
//! - `students.status` has NULLs from before it had a default
//! - `fees` was never created

#![allow(dead_code)]

use schemamend_catalog::SqliteAdapter;
use schemamend_core::{ColumnSpec, Config, SchemaDeclaration, SmokeTest, TableSpec};

pub const STUDENT_APP_TOML: &str = include_str!("../../../../demos/student-app/schemamend.toml");

/// Config of the demo student-management app
pub fn student_app_config() -> Config {
    Config::from_toml(STUDENT_APP_TOML).expect("demo config parses")
}

pub const LEGACY_SCHEMA: &str = r#"
CREATE TABLE training_centers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(150),
    location VARCHAR(255)
);
CREATE TABLE courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_name VARCHAR(150) NOT NULL DEFAULT '',
    duration_months INTEGER DEFAULT 0
);
CREATE TABLE batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(100),
    course_id INTEGER,
    start_date DATE
);
CREATE TABLE students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name VARCHAR(150) NOT NULL DEFAULT '',
    email VARCHAR(150),
    course_id INTEGER,
    batch_id INTEGER,
    status VARCHAR(20)
);

INSERT INTO training_centers (name, location) VALUES ('North Campus', 'Dhaka'), ('South Campus', 'Chittagong');
INSERT INTO courses (course_name, duration_months) VALUES ('Web Development', 6), ('Welding', 3);
INSERT INTO batches (name, course_id, start_date) VALUES ('WD-Morning', 1, '2024-01-10'), ('WLD-Evening', 2, '2024-02-01');
INSERT INTO students (full_name, email, course_id, batch_id, status) VALUES
    ('Ayesha Rahman', 'ayesha@example.com', 1, 1, 'active'),
    ('Karim Uddin', 'karim@example.com', 1, 1, NULL),
    ('Nusrat Jahan', NULL, 2, 2, NULL);
"#;

/// In-memory database holding the drifted legacy schema
pub async fn legacy_database() -> SqliteAdapter {
    let adapter = SqliteAdapter::open_in_memory().expect("in-memory database");
    adapter
        .execute_batch(LEGACY_SCHEMA)
        .await
        .expect("legacy schema loads");
    adapter
}

/// Just the batches table, with `batch_name` replacing `name`
pub fn batches_declaration() -> SchemaDeclaration {
    SchemaDeclaration::new(vec![TableSpec::new(
        "batches",
        vec![
            ColumnSpec::new("id", "INTEGER").auto_primary_key(),
            ColumnSpec::new("batch_name", "VARCHAR(100)").with_legacy_name("name"),
        ],
    )])
}

/// Config wrapping a declaration and smoke tests, for in-memory runs
pub fn config_with(declaration: SchemaDeclaration, smoke_tests: Vec<SmokeTest>) -> Config {
    let mut config = Config::default();
    config.declaration = declaration;
    config.smoke_tests = smoke_tests;
    config
}
