//! Filter & FilterGroup (C9): combine a [`Condition`] with an optional
//! [`Executor`], and group multiple filters under short-circuit and/or
//! ranked scheduling (spec §4.9).

use std::sync::Arc;

use crate::condition::{self, Condition};
use crate::context::Context;
use crate::core::Value;
use crate::errors::{jstr, CompileError, CompileResult};
use crate::executor::{self, Executor};
use crate::rank::{boundaries_for, ordered_indices, Rank, RankBoundary};
use crate::registries::Registries;

/// A single named, runnable rule (spec §3, entity `Filter`).
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, ctx: &mut Context) -> bool;
}

pub struct SingleFilter {
    name: String,
    condition: Arc<dyn Condition>,
    executor: Option<Arc<dyn Executor>>,
}

impl Filter for SingleFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut Context) -> bool {
        if let Some(trace) = ctx.trace() {
            trace.enter("COND");
        }
        let ok = self.condition.success(ctx);
        if let Some(trace) = ctx.trace() {
            trace.leave("COND");
            trace.log(&[Value::String("RET".into()), Value::Bool(ok)]);
        }

        if !ok {
            return false;
        }

        if let Some(executor) = &self.executor {
            if let Some(trace) = ctx.trace() {
                trace.enter("EXEC");
            }
            executor.execute(ctx);
            if let Some(trace) = ctx.trace() {
                trace.leave("EXEC");
            }
        }

        true
    }
}

/// An ordered collection of filters, optionally short-circuiting and/or
/// ranked (spec §4.9, entity `FilterGroup`).
pub struct FilterGroup {
    name: String,
    filters: Vec<Arc<dyn Filter>>,
    short_mode: bool,
    enable_rank: bool,
    ranks: Vec<Rank>,
    rank_boundary: Vec<RankBoundary>,
}

impl FilterGroup {
    pub fn new(name: impl Into<String>, short_mode: bool, enable_rank: bool) -> Self {
        FilterGroup {
            name: name.into(),
            filters: Vec::new(),
            short_mode,
            enable_rank,
            ranks: Vec::new(),
            rank_boundary: Vec::new(),
        }
    }

    /// Register a filter, updating rank bookkeeping if ranking is enabled
    /// (spec §4.10, ported from `FilterGroup.Add`).
    pub fn add(&mut self, filter: Arc<dyn Filter>, weight: i64, priority: i64) {
        self.filters.push(filter);

        if !self.enable_rank {
            return;
        }

        self.ranks.push(Rank { idx: self.filters.len() - 1, weight, priority });
        self.ranks.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.rank_boundary = boundaries_for(&self.ranks);
    }
}

impl Filter for FilterGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut Context) -> bool {
        let idxes: Vec<usize> = if self.enable_rank {
            ordered_indices(&self.ranks, &self.rank_boundary)
        } else {
            (0..self.filters.len()).collect()
        };

        if let Some(trace) = ctx.trace() {
            trace.enter(&format!("FILTER {}", self.name));
        }

        let mut succ = false;

        for idx in idxes {
            let filter = &self.filters[idx];

            if let Some(trace) = ctx.trace() {
                trace.enter(&format!("FILTER {}", filter.name()));
            }

            let isucc = filter.run(ctx);

            if let Some(trace) = ctx.trace() {
                trace.leave(&format!("FILTER {}", filter.name()));
                trace.log(&[Value::String("RET".into()), Value::Bool(isucc)]);
            }

            if isucc {
                succ = true;
                if self.short_mode {
                    break;
                }
            }
        }

        if let Some(trace) = ctx.trace() {
            trace.leave(&format!("END {}", self.name));
            trace.log(&[Value::String("RET".into()), Value::Bool(succ)]);
        }

        succ
    }
}

/// Construction-time options, mirroring the Go source's functional-option
/// API as a plain builder (spec §4.9).
#[derive(Clone, Default)]
pub struct FilterOptions {
    pub name: String,
    pub name_prefix: String,
    pub weight: i64,
    pub priority: i64,
    pub short_mode: bool,
    pub enable_rank: bool,
}

impl FilterOptions {
    pub fn new() -> Self {
        FilterOptions::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn short_mode(mut self, short_mode: bool) -> Self {
        self.short_mode = short_mode;
        self
    }

    pub fn enable_rank(mut self, enable_rank: bool) -> Self {
        self.enable_rank = enable_rank;
        // Ranked scheduling only makes sense with a short-circuiting run.
        self.short_mode = true;
        self
    }
}

/// Compile a rule definition into a [`Filter`] (spec §4.9, ported from
/// `filter.New`/`buildFilter`). `items[0]` being itself an array of arrays
/// means `items` is a filter group; otherwise `items` is a single filter's
/// condition/executor list.
pub fn compile(items: &[Value], options: &FilterOptions, registries: &Registries) -> CompileResult<Arc<dyn Filter>> {
    if items.is_empty() {
        return Err(CompileError::EmptyRule);
    }

    let first = items[0].as_array().ok_or_else(|| CompileError::NotAnArray(jstr(&items[0])))?;
    if first.is_empty() {
        return Err(CompileError::EmptyRule);
    }

    if !first[0].is_array() {
        return build_filter(items, options, registries);
    }

    let group_name = if !options.name.is_empty() {
        options.name.clone()
    } else {
        generate_filter_name(&Value::Array(items.to_vec()))
    };

    let mut group = FilterGroup::new(group_name.clone(), options.short_mode || options.enable_rank, options.enable_rank);

    for item in items {
        let sub = item.as_array().ok_or_else(|| CompileError::NotAnArray(jstr(item)))?;
        let mut sub_opts = FilterOptions::new();
        sub_opts.name_prefix = format!("{}.", group_name);
        let filter = build_filter(sub, &sub_opts, registries)?;
        group.add(filter, 0, 0);
    }

    Ok(Arc::new(group))
}

/// `["$filter-name"?, cond, cond, ..., executor]` — ported from
/// `buildFilter`. The first string element is an optional name; every
/// element but the last is a condition (implicitly ALL); the last element
/// is the executor (skipped when explicitly `null`).
fn build_filter(data: &[Value], options: &FilterOptions, registries: &Registries) -> CompileResult<Arc<dyn Filter>> {
    if data.is_empty() {
        return Err(CompileError::EmptyRule);
    }

    let (name, data) = match data[0].as_str() {
        Some(s) => (s.to_string(), &data[1..]),
        None => {
            let name = if !options.name.is_empty() { options.name.clone() } else { generate_filter_name(&Value::Array(data.to_vec())) };
            (name, data)
        }
    };

    let name = if !options.name_prefix.is_empty() { format!("{}{}", options.name_prefix, name) } else { name };

    if data.len() < 2 {
        return Err(CompileError::filter_too_short(&Value::Array(data.to_vec())));
    }

    let (conditions, last) = data.split_at(data.len() - 1);
    let last = &last[0];

    let condition = condition::compile(&Value::Array(conditions.to_vec()), registries)?;

    let executor = if last.is_null() {
        None
    } else {
        Some(executor::compile(last, registries)?)
    };

    Ok(Arc::new(SingleFilter { name, condition, executor }))
}

fn fnv1a(s: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap()
}

/// Default filter name: canonical-JSON-serialize, 64-bit hash, base-36
/// encode (spec §4.9, ported from `generateFilterName`; this crate uses
/// FNV-1a rather than murmur3 — see DESIGN.md).
pub fn generate_filter_name(value: &Value) -> String {
    let json: serde_json::Value = value.clone().into();
    to_base36(fnv1a(&json.to_string()))
}
