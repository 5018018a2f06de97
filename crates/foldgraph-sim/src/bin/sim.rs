#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use foldgraph_sim::campaign::{CampaignConfig, format_violation, replay_seed, run_campaign};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Run seeded simulations of collapsed views against a brute-force oracle.
#[derive(Debug, Parser)]
#[command(name = "foldgraph-sim", version, about)]
struct Cli {
    /// TOML file with campaign parameters; flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// First seed to run.
    #[arg(long)]
    seed_start: Option<u64>,

    /// Number of seeds to run.
    #[arg(long)]
    seeds: Option<u64>,

    /// Nodes in each generated history.
    #[arg(long)]
    nodes: Option<usize>,

    /// Rounds per seed.
    #[arg(long)]
    rounds: Option<u64>,

    /// Nodes flipped per round.
    #[arg(long)]
    batch: Option<usize>,

    /// Walk budget for growing a synthesis range.
    #[arg(long)]
    max_walk: Option<usize>,

    /// Replay one seed and print its full trace.
    #[arg(long, conflicts_with_all = ["seed_start", "seeds"])]
    replay: Option<u64>,

    /// Print machine-readable output.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn campaign_config(&self) -> Result<CampaignConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
            }
            None => CampaignConfig::default(),
        };
        if let Some(start) = self.seed_start {
            let len = config.seed_range.end.saturating_sub(config.seed_range.start);
            config.seed_range = start..start.saturating_add(len);
        }
        if let Some(seeds) = self.seeds {
            config.seed_range.end = config.seed_range.start.saturating_add(seeds);
        }
        if let Some(nodes) = self.nodes {
            config.node_count = nodes;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(batch) = self.batch {
            config.batch_size = batch;
        }
        if let Some(max_walk) = self.max_walk {
            config.max_walk = max_walk;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.campaign_config()?;

    if let Some(seed) = cli.replay {
        return replay(seed, &config, cli.json);
    }

    info!(seeds = ?config.seed_range, nodes = config.node_count, "starting campaign");
    let report = run_campaign(&config)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "campaign complete: seeds={} passed={} interesting={}",
            report.seeds_run, report.seeds_passed, report.interesting_states_reached
        );
        for failure in &report.failures {
            println!("seed {} failed at round {:?}:", failure.seed, failure.round);
            for violation in &failure.violations {
                println!("  {violation}");
            }
        }
    }

    if let Some(seed) = report.first_failure {
        bail!("{} seed(s) failed; replay with --replay {seed}", report.failures.len());
    }
    Ok(())
}

fn replay(seed: u64, config: &CampaignConfig, json: bool) -> Result<()> {
    let trace = replay_seed(seed, config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&trace.result)?);
    } else {
        println!("seed {seed}: {} edges", trace.edges.len());
        for event in &trace.result.trace {
            println!("  round {:>3}: {:?}", event.round, event.kind);
        }
        for violation in &trace.result.violations {
            println!("  violation: {}", format_violation(violation));
        }
    }
    if !trace.result.passed() {
        bail!(
            "seed {seed} failed at round {:?}",
            trace.result.failed_round
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOLDGRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "foldgraph_core=debug,foldgraph_sim=debug,info"
        } else {
            "foldgraph_sim=info,warn"
        })
    });

    let format = env::var("FOLDGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // Logs go to stderr so `--json` output stays parseable.
    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
