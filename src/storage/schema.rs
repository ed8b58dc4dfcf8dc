//! Database schema constants.
//!
//! All SQL schema definitions for the PostgreSQL backend. Statements are
//! idempotent (IF NOT EXISTS) and applied in order by the migration
//! runner.

/// SQL schema for the tasks table.
pub const CREATE_TASKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id UUID PRIMARY KEY,
    status VARCHAR(32) NOT NULL,
    topic TEXT NOT NULL,
    style VARCHAR(255) NOT NULL,
    tone VARCHAR(255) NOT NULL,
    result JSONB,
    retry_count INTEGER NOT NULL DEFAULT 0,
    warnings JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for the status change audit table. Rows are never updated
/// or deleted.
pub const CREATE_STATUS_CHANGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS status_changes (
    id UUID PRIMARY KEY,
    task_id UUID NOT NULL REFERENCES tasks(id),
    old_status VARCHAR(32) NOT NULL,
    new_status VARCHAR(32) NOT NULL,
    accepted BOOLEAN NOT NULL,
    reason TEXT,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for the quality evaluations table.
pub const CREATE_QUALITY_EVALUATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS quality_evaluations (
    id UUID PRIMARY KEY,
    task_id UUID NOT NULL REFERENCES tasks(id),
    attempt_number INTEGER NOT NULL,
    scores JSONB NOT NULL,
    overall_score DOUBLE PRECISION NOT NULL,
    passing BOOLEAN NOT NULL,
    feedback JSONB NOT NULL DEFAULT '[]'::jsonb,
    evaluated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE(task_id, attempt_number)
)
"#;

/// Index creation statements, one per statement so each runs as its
/// own prepared query.
pub const CREATE_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
    "CREATE INDEX IF NOT EXISTS idx_status_changes_task_id ON status_changes(task_id)",
    "CREATE INDEX IF NOT EXISTS idx_status_changes_timestamp ON status_changes(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_status_changes_accepted ON status_changes(task_id, accepted)",
    "CREATE INDEX IF NOT EXISTS idx_quality_evaluations_task_id ON quality_evaluations(task_id)",
];

/// Returns all schema creation statements in dependency order.
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut statements = vec![
        CREATE_TASKS_TABLE,
        CREATE_STATUS_CHANGES_TABLE,
        CREATE_QUALITY_EVALUATIONS_TABLE,
    ];
    statements.extend(CREATE_INDEXES);
    statements
}

/// Table names in the schema.
pub mod tables {
    /// Tasks table name.
    pub const TASKS: &str = "tasks";
    /// Status change audit table name.
    pub const STATUS_CHANGES: &str = "status_changes";
    /// Quality evaluations table name.
    pub const QUALITY_EVALUATIONS: &str = "quality_evaluations";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_in_dependency_order() {
        let statements = all_schema_statements();
        assert_eq!(statements.len(), 8);
        // Tasks first, the other tables reference it.
        assert!(statements[0].contains("tasks"));
        assert!(statements[3].contains("CREATE INDEX"));
        // One statement per query; none may contain a separator.
        assert!(statements.iter().all(|s| !s.contains(';')));
    }

    #[test]
    fn test_audit_table_has_accepted_flag() {
        assert!(CREATE_STATUS_CHANGES_TABLE.contains("accepted BOOLEAN NOT NULL"));
    }
}
