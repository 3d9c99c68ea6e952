//! Injection Detectors
//!
//! Stateless analyzers for operation strings extracted at instrumentation
//! points:
//!
//! - [`sql`] — token-structure analysis over SQL dialects
//! - [`nosql`] — structural filter-vs-user-input matching
//! - [`shell`] — metacharacter and command-word analysis
//! - [`path_traversal`] — dot-dot and absolute-path analysis
//!
//! All detectors are pure functions, safe to call concurrently, and fail
//! open: any internal failure is logged and reported as "not detected" so a
//! detector bug can never take down legitimate traffic.

pub(crate) mod data;
pub mod nosql;
pub mod path_traversal;
pub mod shell;
pub mod sql;
pub mod sql_tokenizer;

pub use nosql::is_nosql_injection;
pub use path_traversal::{detect_path_traversal, detect_path_traversal_with};
pub use shell::is_shell_injection;
pub use sql::{is_sql_injection, Detection, SqlDialect, SqlInjectionOracle};
pub use sql_tokenizer::TokenizingOracle;
