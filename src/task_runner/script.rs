//! Initialization script selection and statement splitting.
//!
//! The SQL itself is opaque: whatever the `statements` property holds is split on
//! top-level `;` and applied in order. When no statements are given, a key/name
//! dimension table is created and seeded, using only idempotent statements. The
//! table defaults to `master_dimension`.

use super::{TaskError, TaskResult};
use crate::constants::task_config;
use crate::models::TaskConfig;

/// Seed rows for the default dimension table
const DEFAULT_DIMENSION_ROWS: &[(&str, &str)] = &[
    ("tokyo", "Tokyo"),
    ("osaka", "Osaka"),
    ("nagoya", "Nagoya"),
    ("sapporo", "Sapporo"),
    ("fukuoka", "Fukuoka"),
];

const MAX_IDENTIFIER_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitScript {
    statements: Vec<String>,
}

impl InitScript {
    /// Pick the script described by the task configuration
    pub fn from_config(config: &TaskConfig) -> TaskResult<Self> {
        if let Some(sql) = config.get(task_config::STATEMENTS) {
            let statements = split_statements(sql);
            if statements.is_empty() {
                return Err(TaskError::Configuration(
                    "'statements' contains no SQL".to_string(),
                ));
            }
            return Ok(Self { statements });
        }

        let table = config
            .get(task_config::TABLE)
            .map(String::as_str)
            .unwrap_or(task_config::DEFAULT_TABLE);
        let rows = match config.get(task_config::SEED_ROWS) {
            Some(raw) => parse_seed_rows(raw)?,
            None => DEFAULT_DIMENSION_ROWS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        Self::dimension_table(table, &rows)
    }

    /// `CREATE TABLE IF NOT EXISTS` plus `INSERT IGNORE` seed rows
    pub fn dimension_table(table: &str, rows: &[(String, String)]) -> TaskResult<Self> {
        validate_identifier(table)?;

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS `{table}` (\
             `key` VARCHAR(64) NOT NULL PRIMARY KEY, \
             `name` VARCHAR(255) NOT NULL)"
        )];

        if !rows.is_empty() {
            let values = rows
                .iter()
                .map(|(key, name)| format!("('{}', '{}')", escape_literal(key), escape_literal(name)))
                .collect::<Vec<_>>()
                .join(", ");
            statements.push(format!(
                "INSERT IGNORE INTO `{table}` (`key`, `name`) VALUES {values}"
            ));
        }

        Ok(Self { statements })
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Statements whose affected-row count means "rows inserted"
pub fn is_insert(statement: &str) -> bool {
    let head = statement
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default();
    head.eq_ignore_ascii_case("insert") || head.eq_ignore_ascii_case("replace")
}

/// Split on `;` outside quotes, identifiers and comments
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' && q != '`' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => skip_line(&mut chars),
                '#' => skip_line(&mut chars),
                ';' => push_statement(&mut statements, &mut current),
                _ => current.push(c),
            },
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

fn parse_seed_rows(raw: &str) -> TaskResult<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| {
                    TaskError::Configuration(format!(
                        "seed row '{entry}' must look like key=Name"
                    ))
                })
        })
        .collect()
}

fn validate_identifier(name: &str) -> TaskResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(TaskError::Configuration(format!(
            "'{name}' is not a valid table name"
        )))
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}
