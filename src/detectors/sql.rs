//! SQL Injection Detection
//!
//! Front door for SQL analysis. Cheap rejections run first: input too short,
//! not present in the query, purely alphanumeric, or a plain number list can
//! never be an injection and skip tokenization entirely. Everything else goes
//! through a [`SqlInjectionOracle`], whose verdict taxonomy keeps failure
//! modes explicit so callers fail open on anything but a firm detection.

use super::sql_tokenizer::TokenizingOracle;

/// SQL grammar variant, affecting comment syntax, quoting, and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Generic,
    MySql,
    Postgres,
}

/// Outcome of a single oracle call. Only `Detected` blocks; both failure
/// variants are logged and treated as "not detected".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Detected,
    NotDetected,
    TokenizeFailure,
    InternalError,
}

/// The analysis seam: given a lowercased query and lowercased user input,
/// decide whether the input alters the query's token structure.
pub trait SqlInjectionOracle {
    fn detect(&self, query: &str, user_input: &str, dialect: SqlDialect) -> Detection;
}

/// Returns true when `user_input` constitutes a SQL injection within `query`,
/// using the built-in tokenizing oracle.
pub fn is_sql_injection(query: &str, user_input: &str, dialect: SqlDialect) -> bool {
    is_sql_injection_with(&TokenizingOracle, query, user_input, dialect)
}

/// As [`is_sql_injection`], with a caller-supplied oracle.
pub fn is_sql_injection_with(
    oracle: &dyn SqlInjectionOracle,
    query: &str,
    user_input: &str,
    dialect: SqlDialect,
) -> bool {
    let query = query.to_lowercase();
    let input = user_input.to_lowercase();

    if input.len() <= 1 {
        return false;
    }
    if input.len() > query.len() || !query.contains(&input) {
        return false;
    }
    // Bare identifiers and numbers cannot break out of their position.
    if input.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    let without_list_chars: String = input.chars().filter(|c| !matches!(c, ' ' | ',')).collect();
    if without_list_chars.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    match oracle.detect(&query, &input, dialect) {
        Detection::Detected => true,
        Detection::NotDetected => false,
        Detection::TokenizeFailure => {
            tracing::warn!(dialect = ?dialect, "SQL tokenization failed, treating as benign");
            false
        }
        Detection::InternalError => {
            tracing::warn!(dialect = ?dialect, "SQL oracle error, treating as benign");
            false
        }
    }
}
