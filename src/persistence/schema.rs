//! Schema provisioning.
//!
//! Runs a SQL script statement by statement against the store. The bundled script
//! only uses `CREATE ... IF NOT EXISTS` and `INSERT OR IGNORE`, so provisioning an
//! already provisioned database is a no-op. A script that conflicts with existing
//! data fails with `MigrationError` naming the statement.

use std::path::Path;

use tracing::{debug, info};

use super::{DatabaseError, DbPool};

/// Schema shipped with the crate (`sql/schema.sql`).
pub const DEFAULT_SCHEMA: &str = include_str!("../../sql/schema.sql");

const PREVIEW_LEN: usize = 50;

/// Read a provisioning script from disk.
pub fn read_script(path: impl AsRef<Path>) -> Result<String, DatabaseError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| {
        DatabaseError::MigrationError(format!(
            "Failed to read SQL script {}: {}",
            path.display(),
            e
        ))
    })
}

/// Execute every statement of `script` in order. Stops at the first failure.
pub async fn provision(pool: &DbPool, script: &str) -> Result<usize, DatabaseError> {
    let statements = split_statements(script);
    debug!("Provisioning {} statements", statements.len());

    for statement in &statements {
        info!("Running: {}", preview(statement));
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to run '{}': {}", preview(statement), e))
        })?;
    }

    Ok(statements.len())
}

/// Read `path` and provision the store with it.
pub async fn provision_from_file(
    pool: &DbPool,
    path: impl AsRef<Path>,
) -> Result<usize, DatabaseError> {
    let script = read_script(path)?;
    provision(pool, &script).await
}

/// Split a script into statements, dropping `--` and `/* ... */` comments and empty
/// statements.
///
/// Semicolons and comment markers inside single-quoted literals or double-quoted
/// identifiers are kept as text. Trigger bodies (`BEGIN ... END;`) are not supported.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    // Skip to end of line, keep the newline as a separator
                    for next in chars.by_ref() {
                        if next == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    // Unterminated block comments run to the end of the script
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                    current.push(' ');
                }
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// Single-line, truncated form of a statement for logs.
fn preview(statement: &str) -> String {
    let flat = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    let short: String = flat.chars().take(PREVIEW_LEN).collect();
    format!("{}...", short)
}
