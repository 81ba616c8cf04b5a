//! Command-line entry point.
//!
//! Parses the target list and run count, drives the profiler, prints a
//! short human summary to stderr, and emits the result JSON (the stable
//! contract consumed by downstream reporting) to stdout or `--output`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use webgauge::aggregate::ProfileOutcome;
use webgauge::config::ProfilerConfig;
use webgauge::profiler::{Profiler, TargetSpec};
use webgauge::progress::TraceReporter;

#[derive(Parser)]
#[command(
    name = "webgauge",
    version,
    about = "Profile resource usage of web applications under a headless browser"
)]
struct Cli {
    /// Targets to profile, as `URL` or `id=URL`.
    #[arg(required = true)]
    targets: Vec<String>,

    /// Independent executions per target, averaged with statistics.
    #[arg(short = 'n', long)]
    runs: Option<u32>,

    /// Write the result JSON here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (TOML).
    #[arg(short, long, env = "WEBGAUGE_CONFIG")]
    config: Option<PathBuf>,
}

/// `id=URL` names the target; a bare URL is its own id.
fn parse_target(raw: &str) -> TargetSpec {
    match raw.split_once('=') {
        Some((id, url)) if !id.contains("://") => TargetSpec::new(id, url),
        _ => TargetSpec::new(raw, raw),
    }
}

fn print_summary(target: &TargetSpec, outcome: &ProfileOutcome) {
    match outcome {
        ProfileOutcome::Averaged(avg) => {
            let s = &avg.summary;
            eprintln!(
                "{} {}  mem Δ {:.1} MB  cpu peak {:.1}%  heap Δ {:.1} MB  efficiency {:.0}/100  ({} ok, {} failed)",
                "✓".green(),
                target.id.bold(),
                s.total_memory_delta_mb.mean,
                s.peak_cpu_percent.mean,
                s.total_heap_delta_mb.mean,
                s.memory_efficiency_score.mean,
                avg.executions.successful,
                avg.executions.failed,
            );
        }
        ProfileOutcome::Failed(result) => {
            eprintln!(
                "{} {}: {}",
                "✗".red(),
                target.id.bold(),
                result.error.as_deref().unwrap_or("unknown failure")
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webgauge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ProfilerConfig::load(cli.config.clone())?;
    let runs = cli.runs.unwrap_or(config.executions).max(1);
    let targets: Vec<TargetSpec> = cli.targets.iter().map(|t| parse_target(t)).collect();

    let reporter = TraceReporter;
    let profiler = Profiler::new(&config, &reporter);
    let outcomes = profiler.profile_many(&targets, runs).await;

    for (target, outcome) in targets.iter().zip(&outcomes) {
        print_summary(target, outcome);
    }

    let json = serde_json::to_string_pretty(&outcomes).context("serializing results")?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("results written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_url_is_its_own_id() {
        let target = parse_target("http://127.0.0.1:3000/app/");
        assert_eq!(target.id, "http://127.0.0.1:3000/app/");
        assert_eq!(target.url, "http://127.0.0.1:3000/app/");
    }

    #[test]
    fn named_target_splits_on_first_equals() {
        let target = parse_target("svelte=http://127.0.0.1:3000/svelte/");
        assert_eq!(target.id, "svelte");
        assert_eq!(target.url, "http://127.0.0.1:3000/svelte/");
    }

    #[test]
    fn query_string_equals_does_not_split() {
        let target = parse_target("http://127.0.0.1:3000/app/?mock=true");
        assert_eq!(target.id, "http://127.0.0.1:3000/app/?mock=true");
        assert_eq!(target.url, target.id);
    }
}
