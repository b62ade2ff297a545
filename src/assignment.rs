//! Assignment registry (C6): mutates the document (or the per-run store)
//! at a dotted path (spec §4.6).

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;

use crate::coerce;
use crate::context::Context;
use crate::core::Value;
use crate::errors::{CompileError, CompileResult};
use crate::path;
use crate::registries::Registries;

pub type Prepared = Box<dyn Any + Send + Sync>;

fn prepared<T: Send + Sync + 'static>(v: T) -> Prepared {
    Box::new(v)
}

/// A named document mutation, invoked with its already-`prepare`d literal
/// (spec §3, entity `Assignment`).
pub trait Assignment: Send + Sync {
    /// Compile-time literal validation (and, for `=>`, recursive executor
    /// compilation against the same [`Registries`] bundle).
    fn prepare(&self, literal: &Value, registries: &Registries) -> CompileResult<Prepared>;

    fn run(&self, ctx: &mut Context, key: &str, prepared: &Prepared);
}

pub struct AssignmentRegistry {
    assignments: DashMap<String, Arc<dyn Assignment>>,
}

impl AssignmentRegistry {
    pub fn empty() -> Self {
        AssignmentRegistry { assignments: DashMap::new() }
    }

    pub fn with_builtins() -> Self {
        let reg = Self::empty();
        reg.register("=", Arc::new(EqualAssignment));
        reg.register("+", Arc::new(MergeAssignment));
        reg.register("-", Arc::new(DeleteAssignment));
        reg.register("*=", Arc::new(ProbabilitySet));
        reg.register("=>", Arc::new(GroupAssign));
        reg
    }

    pub fn register(&self, name: impl Into<String>, assignment: Arc<dyn Assignment>) {
        self.assignments.insert(name.into(), assignment);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Assignment>> {
        self.assignments.get(name).map(|v| v.clone())
    }
}

impl Default for AssignmentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ---------------------------------------------------------------------------
// `=` — `["key", "=", value]`
// ---------------------------------------------------------------------------

pub struct EqualAssignment;

impl Assignment for EqualAssignment {
    fn prepare(&self, literal: &Value, _registries: &Registries) -> CompileResult<Prepared> {
        Ok(prepared(literal.clone()))
    }

    fn run(&self, ctx: &mut Context, key: &str, prepared: &Prepared) {
        let value = prepared.downcast_ref::<Value>().expect("equal assignment prepared type").clone();

        if let Some(hooks) = ctx.hooks() {
            if hooks.try_set(key, &value) {
                return;
            }
        }

        path::write(ctx.data_mut(), key, value);
    }
}

// ---------------------------------------------------------------------------
// `+` — `["key", "+", {...}]`
// ---------------------------------------------------------------------------

pub struct MergeAssignment;

impl Assignment for MergeAssignment {
    fn prepare(&self, literal: &Value, _registries: &Registries) -> CompileResult<Prepared> {
        if !literal.is_map() {
            return Err(CompileError::invalid_literal("+", "value must be a map"));
        }
        Ok(prepared(literal.clone()))
    }

    fn run(&self, ctx: &mut Context, key: &str, prepared: &Prepared) {
        let incoming = prepared.downcast_ref::<Value>().expect("merge assignment prepared type").clone();
        let Value::Map(incoming) = incoming else { return };

        if let Some(hooks) = ctx.hooks() {
            if hooks.try_merge(key, &Value::Map(incoming.clone())) {
                return;
            }
        }

        let Some(target) = path::read_mut(ctx.data_mut(), key, true) else { return };

        match target {
            Value::Map(existing) => {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
            other if other.is_null() => {
                *other = Value::Map(incoming);
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// `-` — `["$", "-", "key1,key2"]`
// ---------------------------------------------------------------------------

pub struct DeleteAssignment;

impl Assignment for DeleteAssignment {
    fn prepare(&self, literal: &Value, _registries: &Registries) -> CompileResult<Prepared> {
        let list = coerce::to_array(literal);
        if list.is_empty() {
            return Err(CompileError::invalid_literal("-", "value must be a non-empty list of keys"));
        }
        let mut keys = Vec::with_capacity(list.len());
        for item in list {
            match item {
                Value::String(s) => keys.push(s),
                other => return Err(CompileError::invalid_literal("-", format!("key '{}' is not a string", other.display()))),
            }
        }
        Ok(prepared(keys))
    }

    fn run(&self, ctx: &mut Context, key: &str, prepared: &Prepared) {
        let keys = prepared.downcast_ref::<Vec<String>>().expect("delete assignment prepared type");

        if let Some(hooks) = ctx.hooks() {
            if hooks.try_delete(key, keys) {
                return;
            }
        }

        let Some(target) = path::read_mut(ctx.data_mut(), key, false) else { return };

        if let Value::Map(m) = target {
            for k in keys {
                m.remove(k);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// `*=` — probability-weighted set
// ---------------------------------------------------------------------------

struct ProbabilityItem {
    line_point: i64,
    value: Value,
}

pub struct ProbabilitySet;

impl Assignment for ProbabilitySet {
    fn prepare(&self, literal: &Value, _registries: &Registries) -> CompileResult<Prepared> {
        let rows = literal
            .as_array()
            .ok_or_else(|| CompileError::invalid_literal("*=", "value must be an array"))?;

        let mut line_point: i64 = 0;
        let mut items = Vec::with_capacity(rows.len());

        for row in rows {
            let pair = row
                .as_array()
                .ok_or_else(|| CompileError::invalid_literal("*=", "value element must be [weight, value]"))?;
            if pair.len() != 2 {
                return Err(CompileError::invalid_literal("*=", "value element must be [weight, value]"));
            }

            let weight = pair[0]
                .as_number()
                .ok_or_else(|| CompileError::invalid_literal("*=", "value element weight must be a number"))?;
            if weight < 0.0 {
                return Err(CompileError::invalid_literal("*=", "value element weight must be >= 0"));
            }

            line_point += (weight * 1000.0).round() as i64;
            items.push(ProbabilityItem { line_point, value: pair[1].clone() });
        }

        Ok(prepared(items))
    }

    fn run(&self, ctx: &mut Context, key: &str, prepared: &Prepared) {
        let items = prepared.downcast_ref::<Vec<ProbabilityItem>>().expect("probability assignment prepared type");
        let Some(max) = items.last().map(|i| i.line_point) else { return };
        if max <= 0 {
            return;
        }

        let choose = rand::thread_rng().gen_range(1..=max);
        for item in items {
            if choose <= item.line_point {
                EqualAssignment.run(ctx, key, &prepared_from(item.value.clone()));
                break;
            }
        }
    }
}

fn prepared_from(v: Value) -> Prepared {
    prepared(v)
}

// ---------------------------------------------------------------------------
// `=>` — nested executor group
// ---------------------------------------------------------------------------

pub struct GroupAssign;

impl Assignment for GroupAssign {
    fn prepare(&self, literal: &Value, registries: &Registries) -> CompileResult<Prepared> {
        if !literal.is_array() {
            return Err(CompileError::invalid_literal("=>", "value must be an array"));
        }
        let executor = crate::executor::compile(literal, registries)
            .map_err(|e| CompileError::invalid_literal("=>", e.to_string()))?;
        Ok(prepared(executor))
    }

    fn run(&self, ctx: &mut Context, _key: &str, prepared: &Prepared) {
        let executor = prepared
            .downcast_ref::<Arc<dyn crate::executor::Executor>>()
            .expect("group assignment prepared type");
        executor.execute(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_assignment_writes_nested_path() {
        let reg = Registries::with_builtins();
        let a = EqualAssignment;
        let prepared = a.prepare(&Value::String("shanghai".into()), &reg).unwrap();
        let mut data = Value::map();
        let mut ctx = Context::new(&mut data);
        a.run(&mut ctx, "area.city", &prepared);
        let (v, found) = path::read(ctx.data(), "area.city", false);
        assert!(found);
        assert_eq!(v.unwrap().as_str(), Some("shanghai"));
    }

    #[test]
    fn merge_assignment_merges_maps() {
        let reg = Registries::with_builtins();
        let a = MergeAssignment;
        let mut existing = std::collections::HashMap::new();
        existing.insert("a".to_string(), Value::Number(1.0));
        let mut data = Value::map();
        path::write(&mut data, "obj", Value::Map(existing));

        let mut incoming = std::collections::HashMap::new();
        incoming.insert("b".to_string(), Value::Number(2.0));
        let prepared = a.prepare(&Value::Map(incoming), &reg).unwrap();

        let mut ctx = Context::new(&mut data);
        a.run(&mut ctx, "obj", &prepared);

        let (v, found) = path::read(ctx.data(), "obj.b", false);
        assert!(found);
        assert_eq!(v.unwrap().as_number(), Some(2.0));
        let (v, found) = path::read(ctx.data(), "obj.a", false);
        assert!(found);
        assert_eq!(v.unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn delete_assignment_honors_root_sigil() {
        let reg = Registries::with_builtins();
        let a = DeleteAssignment;
        let mut data = Value::map();
        path::write(&mut data, "secret", Value::Bool(true));
        path::write(&mut data, "keep", Value::Bool(true));
        let prepared = a.prepare(&Value::String("secret".into()), &reg).unwrap();

        let mut ctx = Context::new(&mut data);
        a.run(&mut ctx, "$", &prepared);

        let (_, found) = path::read(ctx.data(), "secret", false);
        assert!(!found);
        let (_, found) = path::read(ctx.data(), "keep", false);
        assert!(found);
    }

    #[test]
    fn probability_set_always_picks_a_listed_value() {
        let reg = Registries::with_builtins();
        let a = ProbabilitySet;
        let lit = Value::Array(vec![
            Value::Array(vec![Value::Number(10.0), Value::String("a".into())]),
            Value::Array(vec![Value::Number(10.0), Value::String("b".into())]),
        ]);
        let prepared = a.prepare(&lit, &reg).unwrap();
        let mut data = Value::map();
        let mut ctx = Context::new(&mut data);
        a.run(&mut ctx, "pick", &prepared);
        let (v, found) = path::read(ctx.data(), "pick", false);
        assert!(found);
        let s = v.unwrap().as_str().unwrap();
        assert!(s == "a" || s == "b");
    }

    #[test]
    fn group_assign_compiles_and_runs_nested_executors() {
        let reg = Registries::with_builtins();
        let a = GroupAssign;
        let lit = Value::Array(vec![Value::Array(vec![
            Value::String("flag".into()),
            Value::String("=".into()),
            Value::Bool(true),
        ])]);
        let prepared = a.prepare(&lit, &reg).unwrap();
        let mut data = Value::map();
        let mut ctx = Context::new(&mut data);
        a.run(&mut ctx, "_", &prepared);
        let (v, found) = path::read(ctx.data(), "flag", false);
        assert!(found);
        assert_eq!(v.unwrap(), &Value::Bool(true));
    }
}
