//! URL admission rules
//!
//! Regex-based allow/deny rule sets used by the generator, the next-stage
//! filters and the dispatcher. All patterns match the whole URL.

mod regex_rule;

pub use regex_rule::{compile_full_match, RegexRule};
