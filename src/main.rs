//! `rulesmith` CLI: compile a rule file and run it against a JSON document.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rulesmith::{Context, Filter, FilterOptions, Registries, WriterTrace};

#[derive(Parser)]
#[command(
    name = "rulesmith",
    version = "0.1.0",
    about = "Compile and run data-driven rule filters",
    long_about = "rulesmith — compile JSON-shaped rule descriptions into condition/executor \
trees and evaluate them against a JSON document."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a rule file and report errors, without running it
    Check {
        rule: PathBuf,
    },
    /// Compile a rule file and run it against a JSON document
    Run {
        rule: PathBuf,
        data: PathBuf,
        /// Enable ranked, short-circuiting scheduling when the rule is a filter group
        #[arg(long)]
        rank: bool,
        /// Stop at the first filter group member whose condition succeeds
        #[arg(long)]
        short: bool,
        /// Print a nested trace of condition/executor evaluation to stderr
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { rule } => cmd_check(rule),
        Commands::Run { rule, data, rank, short, trace } => cmd_run(rule, data, rank, short, trace),
    }
}

fn load_rule(path: &PathBuf) -> Result<Vec<rulesmith::Value>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading rule file {}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing rule file {} as JSON", path.display()))?;
    let items = json
        .as_array()
        .with_context(|| "rule file must contain a JSON array")?
        .iter()
        .cloned()
        .map(rulesmith::Value::from)
        .collect();
    Ok(items)
}

fn cmd_check(rule: PathBuf) -> Result<()> {
    let items = load_rule(&rule)?;
    let registries = Registries::with_builtins();
    match rulesmith::filter::compile(&items, &FilterOptions::new(), &registries) {
        Ok(filter) => {
            println!("ok: compiled filter '{}'", filter.name());
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e)),
    }
}

fn cmd_run(rule: PathBuf, data: PathBuf, rank: bool, short: bool, trace: bool) -> Result<()> {
    let items = load_rule(&rule)?;
    let registries = Registries::with_builtins();

    let options = FilterOptions::new().enable_rank(rank).short_mode(short || rank);
    let filter = rulesmith::filter::compile(&items, &options, &registries).map_err(|e| anyhow::anyhow!(e))?;

    let data_text = fs::read_to_string(&data).with_context(|| format!("reading data file {}", data.display()))?;
    let data_json: serde_json::Value =
        serde_json::from_str(&data_text).with_context(|| format!("parsing data file {} as JSON", data.display()))?;
    let mut document: rulesmith::Value = data_json.into();

    let mut ctx = Context::new(&mut document);
    if trace {
        ctx = ctx.with_trace(Box::new(WriterTrace::new(std::io::stderr())));
    }

    let matched = filter.run(&mut ctx);

    let out: serde_json::Value = document.into();
    println!("{}", serde_json::to_string_pretty(&out)?);
    eprintln!("matched: {}", matched);

    Ok(())
}
