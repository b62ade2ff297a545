//! `rulesmith` — a data-driven rule filter engine.
//!
//! Compiles JSON-shaped rule descriptions into condition/executor trees
//! and evaluates them against document-shaped data: path addressing and
//! type coercion over a dynamically typed [`core::Value`], pluggable
//! variable/operation/assignment registries, a per-run [`context::Context`]
//! with caching and tracing, and a weighted-random [`rank`] scheduler for
//! groups of filters.

pub mod assignment;
pub mod coerce;
pub mod condition;
pub mod context;
pub mod core;
pub mod errors;
pub mod executor;
pub mod filter;
pub mod operation;
pub mod path;
pub mod rank;
pub mod registries;
pub mod variable;

pub use context::{AmbientContext, Context, DocumentHooks, TraceSink, WriterTrace};
pub use core::Value;
pub use errors::{CompileError, CompileResult};
pub use filter::{Filter, FilterGroup, FilterOptions, SingleFilter};
pub use registries::Registries;
