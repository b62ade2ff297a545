//! Condition compiler (C7): compiles `["variable", "operation", value]`
//! triples and `ALL`/`ANY`/`NONE`/`ANY_NOT` logic groups into a predicate
//! tree (spec §4.7).

use std::sync::Arc;

use crate::context::Context;
use crate::core::Value;
use crate::errors::{jstr, CompileError, CompileResult};
use crate::operation::{Operation, Prepared as OperationPrepared};
use crate::registries::Registries;
use crate::variable::{get_variable_value, Variable};

/// A boolean predicate over the document (spec §3, entity `Condition`).
pub trait Condition: Send + Sync {
    fn success(&self, ctx: &Context) -> bool;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GroupLogic {
    All,
    Any,
    None,
    AnyNot,
}

const GROUP_LOGIC_KEYS: &[(&str, GroupLogic)] =
    &[("any?", GroupLogic::Any), ("not?", GroupLogic::AnyNot), ("all?", GroupLogic::All), ("none?", GroupLogic::None)];

pub struct StdCondition {
    expr: String,
    variable: Arc<dyn Variable>,
    operation: Arc<dyn Operation>,
    value: OperationPrepared,
}

impl Condition for StdCondition {
    fn success(&self, ctx: &Context) -> bool {
        let _span = tracing::trace_span!("condition", expr = %self.expr).entered();
        let ok = self.operation.run(ctx, self.variable.as_ref(), &self.value);

        if let Some(trace) = ctx.trace() {
            trace.log(&[
                Value::String(self.expr.clone()),
                Value::String(" => ".to_string()),
                get_variable_value(ctx, self.variable.as_ref()),
                Value::String(" => ".to_string()),
                Value::Bool(ok),
            ]);
        }

        ok
    }
}

/// `ALL`/`ANY`/`NONE`/`ANY_NOT` over a list of sub-conditions (spec §4.7,
/// ported from `core.ConditionGroup.Success`).
pub struct ConditionGroup {
    logic: GroupLogic,
    conditions: Vec<Arc<dyn Condition>>,
}

impl Condition for ConditionGroup {
    fn success(&self, ctx: &Context) -> bool {
        let mut result = self.logic != GroupLogic::AnyNot;

        for condition in &self.conditions {
            if condition.success(ctx) {
                match self.logic {
                    GroupLogic::Any => {
                        result = true;
                        break;
                    }
                    GroupLogic::None => {
                        result = false;
                        break;
                    }
                    _ => {}
                }
            } else {
                match self.logic {
                    GroupLogic::All => {
                        result = false;
                        break;
                    }
                    GroupLogic::AnyNot => {
                        result = true;
                        break;
                    }
                    GroupLogic::Any => {
                        result = false;
                    }
                    GroupLogic::None => {}
                }
            }
        }

        result
    }
}

/// Compile a condition item: either `["variable", "operation", value]`, a
/// `["any?"/"not?"/"all?"/"none?", <ignored>, [items...]]` logic group, or
/// a bare array of items (implicitly `ALL`) (spec §4.7, ported from
/// `core.NewCondition`).
pub fn compile(item: &Value, registries: &Registries) -> CompileResult<Arc<dyn Condition>> {
    compile_with_logic(item, registries, GroupLogic::All)
}

fn compile_with_logic(
    item: &Value,
    registries: &Registries,
    group_logic: GroupLogic,
) -> CompileResult<Arc<dyn Condition>> {
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
            group.push(compile_with_logic(sub, registries, GroupLogic::All)?);
        }
        return Ok(Arc::new(ConditionGroup { logic: group_logic, conditions: group }));
    }

    if items.len() != 3 {
        return Err(CompileError::wrong_arity(items.len(), item));
    }

    let key = items[0].as_str().ok_or_else(|| CompileError::not_a_string("key", item))?;

    if let Some((_, logic)) = GROUP_LOGIC_KEYS.iter().find(|(k, _)| *k == key) {
        let list = items[2].as_array().ok_or_else(|| CompileError::not_a_string("logic group items", &items[2]))?;
        return compile_with_logic(&Value::Array(list.to_vec()), registries, *logic);
    }

    let variable = registries
        .variables
        .create(key)
        .ok_or_else(|| CompileError::unknown_variable(key, item))?;

    let operation_name = items[1].as_str().ok_or_else(|| CompileError::not_a_string("operation", item))?;

    let operation = registries
        .operations
        .get(operation_name)
        .ok_or_else(|| CompileError::unknown_operation(operation_name, item))?;

    let prepared = operation.prepare(&items[2])?;
    let expr = format!("{} {} {}", key, operation_name, jstr(&items[2]));

    Ok(Arc::new(StdCondition { expr, variable, operation, value: prepared }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(key: &str, value: Value) -> Value {
        let mut data = Value::map();
        crate::path::write(&mut data, key, value);
        data
    }

    #[test]
    fn triple_compiles_and_matches() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::String("data.area.city".into()),
            Value::String("=".into()),
            Value::String("shanghai".into()),
        ]);
        let cond = compile(&item, &registries).unwrap();
        let mut data = doc_with("area.city", Value::String("shanghai".into()));
        let ctx = Context::new(&mut data);
        assert!(cond.success(&ctx));
    }

    #[test]
    fn all_group_requires_every_child() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::Array(vec![Value::String("succ".into()), Value::String("=".into()), Value::Bool(true)]),
            Value::Array(vec![Value::String("succ".into()), Value::String("=".into()), Value::Bool(false)]),
        ]);
        let cond = compile(&item, &registries).unwrap();
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(!cond.success(&ctx));
    }

    #[test]
    fn any_logic_group_requires_one_child() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::String("any?".into()),
            Value::String("_".into()),
            Value::Array(vec![
                Value::Array(vec![Value::String("succ".into()), Value::String("=".into()), Value::Bool(false)]),
                Value::Array(vec![Value::String("succ".into()), Value::String("=".into()), Value::Bool(true)]),
            ]),
        ]);
        let cond = compile(&item, &registries).unwrap();
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(cond.success(&ctx));
    }

    #[test]
    fn none_logic_group_requires_zero_matches() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::String("none?".into()),
            Value::String("_".into()),
            Value::Array(vec![Value::Array(vec![
                Value::String("succ".into()),
                Value::String("=".into()),
                Value::Bool(false),
            ])]),
        ]);
        let cond = compile(&item, &registries).unwrap();
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(cond.success(&ctx));
    }

    #[test]
    fn unknown_variable_is_a_compile_error() {
        let registries = Registries::with_builtins();
        let item = Value::Array(vec![
            Value::String("nope".into()),
            Value::String("=".into()),
            Value::Bool(true),
        ]);
        assert!(compile(&item, &registries).is_err());
    }
}
