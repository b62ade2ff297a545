//! Variable registry (C4): resolves a dotted name to a [`Variable`]
//! producing a value from the [`Context`] (spec §4.4).

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, Timelike};
use dashmap::DashMap;
use rand::Rng;

use crate::context::Context;
use crate::core::Value;
use crate::path;

/// Named value source. `cacheable` variables are memoized by name in the
/// run cache (spec §3, entity `Variable`).
pub trait Variable: Send + Sync {
    fn name(&self) -> &str;
    fn cacheable(&self) -> bool;
    fn value(&self, ctx: &Context) -> Value;
}

/// `GetVariableValue` (spec §4.4): consult the cache by name when
/// cacheable, compute and memoize on miss.
pub fn get_variable_value(ctx: &Context, variable: &dyn Variable) -> Value {
    if variable.cacheable() {
        if let Some(v) = ctx.cache_get(variable.name()) {
            return v;
        }
    }

    let value = variable.value(ctx);

    if variable.cacheable() {
        ctx.cache_put(variable.name(), value.clone());
    }

    value
}

/// A `Variable` with a fixed name/cacheability and a closure producing its
/// value (mirrors `core.SimpleVariable` in the source this spec was
/// distilled from).
pub struct SimpleVariable<F: Fn(&Context) -> Value + Send + Sync> {
    name: String,
    cacheable: bool,
    value_fn: F,
}

impl<F: Fn(&Context) -> Value + Send + Sync> SimpleVariable<F> {
    pub fn new(name: impl Into<String>, cacheable: bool, value_fn: F) -> Self {
        SimpleVariable { name: name.into(), cacheable, value_fn }
    }
}

impl<F: Fn(&Context) -> Value + Send + Sync> Variable for SimpleVariable<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    fn value(&self, ctx: &Context) -> Value {
        (self.value_fn)(ctx)
    }
}

/// Produces a [`Variable`] given the full resolved name (spec §4.4:
/// registrations are either exact-name or prefix creators).
pub trait VariableCreator: Send + Sync {
    fn create(&self, name: &str) -> Option<Arc<dyn Variable>>;
}

impl<F> VariableCreator for F
where
    F: Fn(&str) -> Option<Arc<dyn Variable>> + Send + Sync,
{
    fn create(&self, name: &str) -> Option<Arc<dyn Variable>> {
        self(name)
    }
}

/// A creator that always returns the same variable instance regardless of
/// the name it's asked to create (used for singleton builtins like `succ`).
pub struct SingletonCreator(pub Arc<dyn Variable>);

impl VariableCreator for SingletonCreator {
    fn create(&self, _name: &str) -> Option<Arc<dyn Variable>> {
        Some(self.0.clone())
    }
}

/// Injectable wall-clock source, so clock variables can be made
/// deterministic in tests (spec §4.4 supplement; the source this spec was
/// distilled from mocks a package-level `_currentTime` function).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Variable registry: exact-name and prefix (trailing-dot) registrations,
/// plus alias resolution (spec §4.4).
pub struct VariableRegistry {
    creators: DashMap<String, Arc<dyn VariableCreator>>,
    aliases: DashMap<String, String>,
}

impl VariableRegistry {
    /// A registry with no builtins registered.
    pub fn empty() -> Self {
        VariableRegistry { creators: DashMap::new(), aliases: DashMap::new() }
    }

    /// A registry preloaded with the builtin variables from spec §4.4 /
    /// §6, using the system wall clock.
    pub fn with_builtins() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Like [`with_builtins`](Self::with_builtins) but with an injectable
    /// clock, for deterministic tests of the time-derived variables.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let reg = Self::empty();
        reg.register_builtins(clock);
        reg
    }

    fn register_builtins(&self, clock: Arc<dyn Clock>) {
        self.register(
            "succ",
            Arc::new(SingletonCreator(Arc::new(SimpleVariable::new(
                "succ",
                true,
                |_ctx: &Context| Value::Bool(true),
            )))),
        );

        self.register(
            "rand",
            Arc::new(SingletonCreator(Arc::new(SimpleVariable::new(
                "rand",
                false,
                |_ctx: &Context| Value::Number(rand::thread_rng().gen_range(1..=100) as f64),
            )))),
        );

        for name in [
            "datetime", "date", "time", "year", "month", "day", "hour", "minute", "second",
            "unixtime", "wday",
        ] {
            let clock = clock.clone();
            let name_owned = name.to_string();
            self.register(
                name,
                Arc::new(SingletonCreator(Arc::new(SimpleVariable::new(
                    name,
                    false,
                    move |_ctx: &Context| clock_value(&name_owned, clock.now()),
                )))),
            );
        }

        self.register("data.", Arc::new(data_creator));
        self.register("ctx.", Arc::new(ctx_creator));
    }

    pub fn register(&self, name: impl Into<String>, creator: Arc<dyn VariableCreator>) {
        self.creators.insert(name.into(), creator);
    }

    /// `alias(dest, aliases…)`. `dest` and each alias may be an exact name
    /// or a trailing-dot prefix (e.g. `"ctx.bar."`).
    pub fn alias(&self, dest: impl Into<String>, aliases: &[&str]) {
        let dest = dest.into();
        for a in aliases {
            self.aliases.insert((*a).to_string(), dest.clone());
        }
    }

    fn resolve_alias(&self, name: &str) -> String {
        let segments: Vec<&str> = name.split('.').collect();

        if let Some(dest) = self.aliases.get(segments[0]) {
            return if segments.len() == 1 {
                dest.clone()
            } else {
                let mut parts = vec![dest.as_str()];
                parts.extend_from_slice(&segments[1..]);
                parts.join(".")
            };
        }

        if segments.len() > 1 {
            let prefix_key = format!("{}.", segments[0]);
            if let Some(dest) = self.aliases.get(&prefix_key) {
                let remainder = segments[1..].join(".");
                return format!("{}{}", dest, remainder);
            }
        }

        name.to_string()
    }

    /// Resolve a dotted name to a [`Variable`] (spec §4.4 `create`).
    pub fn create(&self, name: &str) -> Option<Arc<dyn Variable>> {
        let name = self.resolve_alias(name);

        if let Some(creator) = self.creators.get(&name) {
            return creator.create(&name);
        }

        let segments: Vec<&str> = name.splitn(2, '.').collect();
        if segments.len() == 2 {
            let prefix_key = format!("{}.", segments[0]);
            if let Some(creator) = self.creators.get(&prefix_key) {
                return creator.create(&name);
            }
        }

        None
    }
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn clock_value(name: &str, now: DateTime<Local>) -> Value {
    match name {
        "unixtime" => Value::Number(now.timestamp() as f64),
        "hour" => Value::Number(now.hour() as f64),
        "minute" => Value::Number(now.minute() as f64),
        "second" => Value::Number(now.second() as f64),
        "year" => Value::Number(now.year() as f64),
        "month" => Value::Number(now.month() as f64),
        "day" => Value::Number(now.day() as f64),
        "wday" => {
            // chrono: Sunday = 0 .. Saturday = 6. Spec wants 1..7, Sunday=7.
            let w = now.weekday().num_days_from_sunday();
            Value::Number(if w == 0 { 7.0 } else { w as f64 })
        }
        "date" => Value::String(now.format("%Y-%m-%d").to_string()),
        "time" => Value::String(now.format("%H:%M:%S").to_string()),
        _ => Value::String(now.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

struct DataVariable {
    name: String,
    key: String,
}

impl Variable for DataVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn cacheable(&self) -> bool {
        false
    }

    fn value(&self, ctx: &Context) -> Value {
        let (v, found) = path::read(ctx.data(), &self.key, false);
        if found {
            v.cloned().unwrap_or(Value::Null)
        } else {
            Value::Null
        }
    }
}

fn data_creator(name: &str) -> Option<Arc<dyn Variable>> {
    let key = name.strip_prefix("data.")?;
    if key.is_empty() {
        return None;
    }
    Some(Arc::new(DataVariable { name: name.to_string(), key: key.to_string() }))
}

struct CtxVariable {
    name: String,
    key: String,
}

impl Variable for CtxVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn cacheable(&self) -> bool {
        false
    }

    /// Resolution order (spec §4.4): (1) `data["ctx."+key]`, (2) run/
    /// process store, (3) ambient parent context fallback.
    fn value(&self, ctx: &Context) -> Value {
        let data_key = format!("ctx.{}", self.key);
        let (v, found) = path::read(ctx.data(), &data_key, false);
        if found {
            return v.cloned().unwrap_or(Value::Null);
        }

        let snapshot = ctx.store_snapshot();
        let (v, found) = path::read(&snapshot, &self.key, false);
        if found {
            return v.cloned().unwrap_or(Value::Null);
        }

        if let Some(ambient) = ctx.ambient() {
            let mut parts = self.key.splitn(2, '.');
            let head = parts.next().unwrap_or("");
            if let Some(root) = ambient.lookup(head) {
                return match parts.next() {
                    Some(rest) => path::read(&root, rest, false).0.cloned().unwrap_or(Value::Null),
                    None => root,
                };
            }
        }

        tracing::warn!(key = %self.key, "ctx.<path> resolved to null: no data, store, or ambient match");
        Value::Null
    }
}

fn ctx_creator(name: &str) -> Option<Arc<dyn Variable>> {
    let key = name.strip_prefix("ctx.")?;
    if key.is_empty() {
        return None;
    }
    Some(Arc::new(CtxVariable { name: name.to_string(), key: key.to_string() }))
}
