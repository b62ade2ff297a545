//! Evaluation context (C3): per-run data, per-run value cache, a keyed
//! store, and a trace sink (spec §4.3).

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;
use dashmap::DashMap;

use crate::core::Value;

/// Hierarchical, textual trace sink consumed by the core (spec §6).
pub trait TraceSink: Send + Sync {
    fn enter(&self, name: &str);
    fn leave(&self, name: &str);
    fn log(&self, values: &[Value]);
}

/// Last-resort ambient lookup for `ctx.<path>` (spec §4.4 step 3) plus the
/// caller's cancellation/deadline surface, forwarded unchanged (spec §4.3,
/// §5) but never observed internally by the engine.
pub trait AmbientContext: Send + Sync {
    fn lookup(&self, key: &str) -> Option<Value>;

    fn is_cancelled(&self) -> bool {
        false
    }

    fn deadline(&self) -> Option<std::time::Instant> {
        None
    }
}

/// Optional interception point for assignments (spec §4.6, §6): an
/// embedding application's own document type can intercept `set`/`merge`/
/// `delete` before the engine falls back to plain path writes into
/// `Value::Map`/`Value::Array`. `Value` itself never implements this —
/// there is nothing non-trivial for it to intercept.
pub trait DocumentHooks: Send + Sync {
    fn try_set(&self, _key: &str, _value: &Value) -> bool {
        false
    }

    fn try_merge(&self, _key: &str, _value: &Value) -> bool {
        false
    }

    fn try_delete(&self, _key: &str, _keys: &[String]) -> bool {
        false
    }
}

/// A plain `io::Write`-backed trace, indenting by nesting depth and
/// colorizing boolean values (ported from `core/trace.go`'s `stdTrace`).
pub struct WriterTrace<W: Write + Send> {
    writer: Mutex<W>,
    level: Mutex<usize>,
}

impl<W: Write + Send> WriterTrace<W> {
    pub fn new(writer: W) -> Self {
        WriterTrace { writer: Mutex::new(writer), level: Mutex::new(0) }
    }

    fn padding(&self) -> String {
        let level = *self.level.lock().unwrap();
        "  ".repeat(level)
    }

    fn render(v: &Value) -> String {
        match v {
            Value::Bool(true) => "true".green().to_string(),
            Value::Bool(false) => "false".red().to_string(),
            other => other.display(),
        }
    }
}

impl<W: Write + Send> TraceSink for WriterTrace<W> {
    fn enter(&self, name: &str) {
        self.log(&[Value::String(name.to_string())]);
        *self.level.lock().unwrap() += 1;
    }

    fn leave(&self, name: &str) {
        {
            let mut level = self.level.lock().unwrap();
            *level = level.saturating_sub(1);
        }
        let _ = name;
    }

    fn log(&self, values: &[Value]) {
        let padding = self.padding();
        let line = values.iter().map(Self::render).collect::<Vec<_>>().join(" ");
        let mut w = self.writer.lock().unwrap();
        let _ = writeln!(w, "{}{}", padding, line);
    }
}

/// Per-run evaluation state (spec §3, entity `Context`; spec §5: isolated
/// per run, never shared across runs).
pub struct Context<'d> {
    data: &'d mut Value,
    cache: DashMap<String, Value>,
    store: DashMap<String, Value>,
    trace: Option<Box<dyn TraceSink>>,
    parent: Option<Box<dyn AmbientContext>>,
    hooks: Option<Box<dyn DocumentHooks>>,
}

impl<'d> Context<'d> {
    pub fn new(data: &'d mut Value) -> Self {
        Context { data, cache: DashMap::new(), store: DashMap::new(), trace: None, parent: None, hooks: None }
    }

    pub fn with_trace(mut self, trace: Box<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_ambient(mut self, parent: Box<dyn AmbientContext>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_hooks(mut self, hooks: Box<dyn DocumentHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn hooks(&self) -> Option<&dyn DocumentHooks> {
        self.hooks.as_deref()
    }

    pub fn data(&self) -> &Value {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut Value {
        self.data
    }

    pub fn trace(&self) -> Option<&dyn TraceSink> {
        self.trace.as_deref()
    }

    pub fn ambient(&self) -> Option<&dyn AmbientContext> {
        self.parent.as_deref()
    }

    /// Cache read by variable name (spec §4.4 `GetVariableValue`).
    pub fn cache_get(&self, name: &str) -> Option<Value> {
        self.cache.get(name).map(|v| v.clone())
    }

    pub fn cache_put(&self, name: &str, value: Value) {
        self.cache.insert(name.to_string(), value);
    }

    /// `Context.Set` — process- or run-scoped named value (spec §4.3, §4.4
    /// `ctx.<path>` step 2).
    pub fn set(&self, key: &str, value: Value) {
        self.store.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key).map(|v| v.clone())
    }

    pub fn delete(&self, key: &str) {
        self.store.remove(key);
    }

    pub fn store_snapshot(&self) -> Value {
        let mut m = std::collections::HashMap::new();
        for entry in self.store.iter() {
            m.insert(entry.key().clone(), entry.value().clone());
        }
        Value::Map(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_isolated_per_context() {
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        assert!(ctx.cache_get("v").is_none());
        ctx.cache_put("v", Value::Number(1.0));
        assert_eq!(ctx.cache_get("v"), Some(Value::Number(1.0)));
    }

    #[test]
    fn store_round_trips() {
        let mut data = Value::map();
        let ctx = Context::new(&mut data);
        ctx.set("foo", Value::String("bar".into()));
        assert_eq!(ctx.get("foo"), Some(Value::String("bar".into())));
        ctx.delete("foo");
        assert_eq!(ctx.get("foo"), None);
    }
}
