//! Compile-time error taxonomy (spec §7: errors are produced only at
//! compile time; every variant carries the offending sub-expression).

use thiserror::Error;

use crate::core::Value;

/// Render a value compactly for embedding in an error message (mirrors the
/// `jstr` helper in the source this spec was distilled from, which
/// JSON-encodes the offending sub-expression for diagnosis).
pub fn jstr(v: &Value) -> String {
    let j: serde_json::Value = v.clone().into();
    j.to_string()
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("rule is empty")]
    EmptyRule,

    #[error("filter must contain at least one condition and an assignment slot: {expr}")]
    FilterTooShort { expr: String },

    #[error("item must contain 3 elements, got {count}: {expr}")]
    WrongArity { count: usize, expr: String },

    #[error("expected an array: {0}")]
    NotAnArray(String),

    #[error("expected a string at {field}: {expr}")]
    NotAString { field: &'static str, expr: String },

    #[error("unknown variable '{name}' in {expr}")]
    UnknownVariable { name: String, expr: String },

    #[error("unknown operation '{name}' in {expr}")]
    UnknownOperation { name: String, expr: String },

    #[error("unknown assignment '{name}' in {expr}")]
    UnknownAssignment { name: String, expr: String },

    #[error("invalid literal for '{op}': {reason}")]
    InvalidLiteral { op: String, reason: String },

    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

impl CompileError {
    pub fn wrong_arity(count: usize, expr: &Value) -> Self {
        CompileError::WrongArity { count, expr: jstr(expr) }
    }

    pub fn filter_too_short(expr: &Value) -> Self {
        CompileError::FilterTooShort { expr: jstr(expr) }
    }

    pub fn not_a_string(field: &'static str, expr: &Value) -> Self {
        CompileError::NotAString { field, expr: jstr(expr) }
    }

    pub fn unknown_variable(name: impl Into<String>, expr: &Value) -> Self {
        CompileError::UnknownVariable { name: name.into(), expr: jstr(expr) }
    }

    pub fn unknown_operation(name: impl Into<String>, expr: &Value) -> Self {
        CompileError::UnknownOperation { name: name.into(), expr: jstr(expr) }
    }

    pub fn unknown_assignment(name: impl Into<String>, expr: &Value) -> Self {
        CompileError::UnknownAssignment { name: name.into(), expr: jstr(expr) }
    }

    pub fn invalid_literal(op: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::InvalidLiteral { op: op.into(), reason: reason.into() }
    }

    pub fn invalid_regex(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::InvalidRegex { pattern: pattern.into(), reason: reason.into() }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
