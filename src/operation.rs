//! Operation registry (C5): boolean comparators between a variable and a
//! prepared literal (spec §4.5).

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;

use crate::coerce;
use crate::context::Context;
use crate::core::Value;
use crate::errors::{CompileError, CompileResult};
use crate::variable::{get_variable_value, Variable};

/// Type-erased prepared literal, produced once at compile time and read
/// many times at evaluation time (spec §3, invariant 2).
pub type Prepared = Box<dyn Any + Send + Sync>;

fn prepared<T: Send + Sync + 'static>(v: T) -> Prepared {
    Box::new(v)
}

fn as_value(p: &Prepared) -> &Value {
    p.downcast_ref::<Value>().expect("operation prepared value type mismatch")
}

/// A binary comparator (spec §3, entity `Operation`).
pub trait Operation: Send + Sync {
    /// Compile-time literal validation/transformation (spec §4.5 "Literal
    /// prepare" column).
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared>;

    /// Evaluation-time predicate.
    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool;
}

/// Process-wide registry of named operations (spec §4.5).
pub struct OperationRegistry {
    operations: DashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn empty() -> Self {
        OperationRegistry { operations: DashMap::new() }
    }

    pub fn with_builtins() -> Self {
        let reg = Self::empty();
        reg.register("=", Arc::new(EqualOp));
        reg.register("!=", Arc::new(NotEqualOp));
        reg.register(">", Arc::new(GtOp));
        reg.register(">=", Arc::new(GeOp));
        reg.register("<", Arc::new(LtOp));
        reg.register("<=", Arc::new(LeOp));
        reg.register("between", Arc::new(BetweenOp));
        reg.register("in", Arc::new(InOp));
        reg.register("not in", Arc::new(NotInOp));
        reg.register("~", Arc::new(MatchOp));
        reg.register("!~", Arc::new(NotMatchOp));
        reg.register("any", Arc::new(AnyOp));
        reg.register("none", Arc::new(NoneOp));
        reg.register("has", Arc::new(HasOp));
        reg
    }

    pub fn register(&self, name: impl Into<String>, op: Arc<dyn Operation>) {
        self.operations.insert(name.into(), op);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).map(|v| v.clone())
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ---------------------------------------------------------------------------
// `=` / `!=`
// ---------------------------------------------------------------------------

struct EqualOp;

impl Operation for EqualOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        Ok(prepared(literal.clone()))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        let literal = as_value(prepared);
        if let Value::Bool(b) = literal {
            return coerce::to_bool(&cmp_value) == *b;
        }
        coerce::equal(&cmp_value, literal)
    }
}

struct NotEqualOp;

impl Operation for NotEqualOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        EqualOp.prepare(literal)
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        !EqualOp.run(ctx, variable, prepared)
    }
}

// ---------------------------------------------------------------------------
// `>` `>=` `<` `<=`
// ---------------------------------------------------------------------------

struct GtOp;

impl Operation for GtOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        Ok(prepared(literal.clone()))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        coerce::compare(&cmp_value, as_value(prepared)) == 1
    }
}

struct LeOp;

impl Operation for LeOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        GtOp.prepare(literal)
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        !GtOp.run(ctx, variable, prepared)
    }
}

struct LtOp;

impl Operation for LtOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        Ok(prepared(literal.clone()))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        coerce::compare(&cmp_value, as_value(prepared)) == -1
    }
}

struct GeOp;

impl Operation for GeOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        LtOp.prepare(literal)
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        !LtOp.run(ctx, variable, prepared)
    }
}

// ---------------------------------------------------------------------------
// `between`
// ---------------------------------------------------------------------------

struct BetweenOp;

impl Operation for BetweenOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        let list = coerce::to_array(literal);
        if list.len() != 2 {
            return Err(CompileError::invalid_literal(
                "between",
                "operation value must be a list with 2 elements",
            ));
        }
        Ok(prepared(list))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        let bounds = prepared.downcast_ref::<Vec<Value>>().expect("between prepared type");
        coerce::compare(&cmp_value, &bounds[0]) >= 0 && coerce::compare(&cmp_value, &bounds[1]) <= 0
    }
}

// ---------------------------------------------------------------------------
// `in` / `not in`
// ---------------------------------------------------------------------------

struct InOp;

impl Operation for InOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        let elems = coerce::to_array(literal);
        if elems.is_empty() {
            return Err(CompileError::invalid_literal("in/not in", "operation value must be a list"));
        }
        Ok(prepared(elems))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        let elems = prepared.downcast_ref::<Vec<Value>>().expect("in prepared type");
        elems.iter().any(|e| coerce::equal(e, &cmp_value))
    }
}

struct NotInOp;

impl Operation for NotInOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        InOp.prepare(literal)
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        !InOp.run(ctx, variable, prepared)
    }
}

// ---------------------------------------------------------------------------
// `~` / `!~` (match)
// ---------------------------------------------------------------------------

enum MatchLiteral {
    Regex(Regex),
    Substring(String),
}

struct MatchOp;

impl Operation for MatchOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        let s = literal
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CompileError::invalid_literal("match", "operation value must be a non-empty string"))?;

        if s.starts_with('/') && s.ends_with('/') {
            let pattern = s.trim_matches('/');
            if pattern.is_empty() {
                return Err(CompileError::invalid_regex(s, "empty regular expression"));
            }
            let regex = Regex::new(&format!("(?i){}", pattern))
                .map_err(|e| CompileError::invalid_regex(s, e.to_string()))?;
            return Ok(prepared(MatchLiteral::Regex(regex)));
        }

        Ok(prepared(MatchLiteral::Substring(s.to_lowercase())))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        let Some(s) = cmp_value.as_str() else { return false };
        match prepared.downcast_ref::<MatchLiteral>().expect("match prepared type") {
            MatchLiteral::Regex(re) => re.is_match(s),
            MatchLiteral::Substring(sub) => s.to_lowercase().contains(sub.as_str()),
        }
    }
}

struct NotMatchOp;

impl Operation for NotMatchOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        MatchOp.prepare(literal)
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        !MatchOp.run(ctx, variable, prepared)
    }
}

// ---------------------------------------------------------------------------
// `any` / `none` / `has`
// ---------------------------------------------------------------------------

struct AnyOp;

impl Operation for AnyOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        let elems = coerce::to_array(literal);
        if elems.is_empty() {
            return Err(CompileError::invalid_literal("any", "operation value must be a list"));
        }
        Ok(prepared(elems))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        let cmp_elems = coerce::to_array(&cmp_value);
        let elems = prepared.downcast_ref::<Vec<Value>>().expect("any prepared type");
        if elems.is_empty() || cmp_elems.is_empty() {
            return false;
        }
        elems.iter().any(|e| cmp_elems.iter().any(|c| coerce::equal(e, c)))
    }
}

struct NoneOp;

impl Operation for NoneOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        AnyOp.prepare(literal)
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        !AnyOp.run(ctx, variable, prepared)
    }
}

struct HasOp;

impl Operation for HasOp {
    fn prepare(&self, literal: &Value) -> CompileResult<Prepared> {
        let elems = coerce::to_array(literal);
        if elems.is_empty() {
            return Err(CompileError::invalid_literal("has", "operation value must be a list"));
        }
        Ok(prepared(elems))
    }

    fn run(&self, ctx: &Context, variable: &dyn Variable, prepared: &Prepared) -> bool {
        let cmp_value = get_variable_value(ctx, variable);
        let cmp_elems = coerce::to_array(&cmp_value);
        let elems = prepared.downcast_ref::<Vec<Value>>().expect("has prepared type");
        if elems.is_empty() || cmp_elems.is_empty() {
            return false;
        }
        elems.iter().all(|e| cmp_elems.iter().any(|c| coerce::equal(e, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::SimpleVariable;

    fn var_with(v: Value) -> SimpleVariable<impl Fn(&Context) -> Value + Send + Sync> {
        SimpleVariable::new("x", false, move |_ctx: &Context| v.clone())
    }

    #[test]
    fn equal_compares_numerically() {
        let op = EqualOp;
        let prepared = op.prepare(&Value::Number(5.0)).unwrap();
        let v = var_with(Value::String("5".into()));
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(op.run(&ctx, &v, &prepared));
    }

    #[test]
    fn not_equal_is_negation_of_equal() {
        let eq = EqualOp;
        let neq = NotEqualOp;
        let lit = Value::Number(5.0);
        let pe = eq.prepare(&lit).unwrap();
        let pn = neq.prepare(&lit).unwrap();
        for val in [Value::Number(5.0), Value::Number(6.0), Value::String("5".into())] {
            let v = var_with(val);
            let mut data = Value::map();
            let ctx = Context::new(&mut data);
            assert_eq!(eq.run(&ctx, &v, &pe), !neq.run(&ctx, &v, &pn));
        }
    }

    #[test]
    fn regex_match_is_case_insensitive() {
        let op = MatchOp;
        let prepared = op.prepare(&Value::String("/^s.+i$/".into())).unwrap();
        let v = var_with(Value::String("Shanghai".into()));
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(op.run(&ctx, &v, &prepared));
    }

    #[test]
    fn bare_slash_is_an_empty_regex_compile_error() {
        let op = MatchOp;
        let err = op.prepare(&Value::String("/".into())).unwrap_err();
        assert!(matches!(err, CompileError::InvalidRegex { .. }));
    }

    #[test]
    fn plain_match_is_substring() {
        let op = MatchOp;
        let prepared = op.prepare(&Value::String("Shang".into())).unwrap();
        let v = var_with(Value::String("shanghai city".into()));
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(op.run(&ctx, &v, &prepared));
    }

    #[test]
    fn between_is_inclusive() {
        let op = BetweenOp;
        let prepared = op.prepare(&Value::Array(vec![Value::Number(1.0), Value::Number(10.0)])).unwrap();
        let v = var_with(Value::Number(10.0));
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(op.run(&ctx, &v, &prepared));
    }

    #[test]
    fn has_requires_all_elements_present() {
        let op = HasOp;
        let prepared = op
            .prepare(&Value::Array(vec![Value::String("a".into()), Value::String("b".into())]))
            .unwrap();
        let v = var_with(Value::Array(vec![
            Value::String("a".into()),
            Value::String("b".into()),
            Value::String("c".into()),
        ]));
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(op.run(&ctx, &v, &prepared));
    }
}
