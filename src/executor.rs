//! Executor compiler (C8): compiles `["key", "assignment", value]` triples,
//! or arrays of such triples, into a tree that mutates a document in
//! order (spec §4.8).

use std::sync::Arc;

use crate::assignment::{Assignment, Prepared as AssignmentPrepared};
use crate::context::Context;
use crate::core::Value;
use crate::errors::{jstr, CompileError, CompileResult};
use crate::registries::Registries;

/// An ordered document mutation (spec §3, entity `Executor`).
pub trait Executor: Send + Sync {
    fn execute(&self, ctx: &mut Context);
}

pub struct StdExecutor {
    expr: String,
    key: String,
    assignment: Arc<dyn Assignment>,
    value: AssignmentPrepared,
}

impl Executor for StdExecutor {
    fn execute(&self, ctx: &mut Context) {
        tracing::debug!(expr = %self.expr, "executing assignment");
        if let Some(trace) = ctx.trace() {
            trace.log(&[Value::String(self.expr.clone())]);
        }
        self.assignment.run(ctx, &self.key, &self.value);
    }
}

/// Positional, ordered group — every child executes, in order (spec §4.8).
pub struct ExecutorGroup {
    executors: Vec<Arc<dyn Executor>>,
}

impl Executor for ExecutorGroup {
    fn execute(&self, ctx: &mut Context) {
        for executor in &self.executors {
            executor.execute(ctx);
        }
    }
}

/// Compile an executor item: either `["key", "assignment", value]` or an
/// array of such items/subgroups (spec §4.8, ported from
/// `core.NewExecutor`).
pub fn compile(item: &Value, registries: &Registries) -> CompileResult<Arc<dyn Executor>> {
    let items = item.as_array().ok_or_else(|| CompileError::NotAnArray(jstr(item)))?;

    if items.is_empty() {
        return Err(CompileError::EmptyRule);
    }

    if items[0].is_array() {
        let mut group = Vec::with_capacity(items.len());
        for sub in items {
            if !sub.is_array() {
                return Err(CompileError::NotAnArray(jstr(sub)));
            }
            group.push(compile(sub, registries)?);
        }
        return Ok(Arc::new(ExecutorGroup { executors: group }));
    }

    if items.len() != 3 {
        return Err(CompileError::wrong_arity(items.len(), item));
    }

    let key = items[0].as_str().ok_or_else(|| CompileError::not_a_string("key", item))?;
    let assignment_name =
        items[1].as_str().ok_or_else(|| CompileError::not_a_string("assignment", item))?;

    let assignment = registries
        .assignments
        .get(assignment_name)
        .ok_or_else(|| CompileError::unknown_assignment(assignment_name, item))?;

    let prepared = assignment.prepare(&items[2], registries)?;
    let expr = format!("{} {} {}", key, assignment_name, jstr(&items[2]));

    Ok(Arc::new(StdExecutor { expr, key: key.to_string(), assignment, value: prepared }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_triple_runs_as_one_executor() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::String("area.city".into()),
            Value::String("=".into()),
            Value::String("shanghai".into()),
        ]);
        let executor = compile(&item, &registries).unwrap();
        let mut data = Value::map();
        let mut ctx = Context::new(&mut data);
        executor.execute(&mut ctx);
        let (v, found) = crate::path::read(ctx.data(), "area.city", false);
        assert!(found);
        assert_eq!(v.unwrap().as_str(), Some("shanghai"));
    }

    #[test]
    fn group_runs_every_child_in_order() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::Array(vec![
                Value::String("a".into()),
                Value::String("=".into()),
                Value::Number(1.0),
            ]),
            Value::Array(vec![
                Value::String("b".into()),
                Value::String("=".into()),
                Value::Number(2.0),
            ]),
        ]);
        let executor = compile(&item, &registries).unwrap();
        let mut data = Value::map();
        let mut ctx = Context::new(&mut data);
        executor.execute(&mut ctx);
        assert_eq!(crate::path::read(ctx.data(), "a", false).0.unwrap().as_number(), Some(1.0));
        assert_eq!(crate::path::read(ctx.data(), "b", false).0.unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn empty_item_is_a_compile_error() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![]);
        assert!(compile(&item, &registries).is_err());
    }

    #[test]
    fn unknown_assignment_is_a_compile_error() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::String("a".into()),
            Value::String("??".into()),
            Value::Number(1.0),
        ]);
        assert!(compile(&item, &registries).is_err());
    }
}
