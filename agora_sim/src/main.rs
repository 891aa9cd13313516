//! Agora Simulator CLI
//!
//! Run deterministic market scenarios and compare their artifacts.

use agora_core::{format_percent, ArtifactSet, Comparator, Comparison, Verdict, DEFAULT_THRESHOLD};
use agora_sim::scenarios::ScenarioId;
use agora_sim::{run_scenario, CancelToken, RunResult, Scenario, SimError};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Exit code for fatal errors (bad configuration, unreadable artifacts).
const EXIT_FATAL: i32 = 2;

/// Agora deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "agora-sim")]
#[command(about = "Run reproducible agent market simulations", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scenario
    Run(RunArgs),

    /// Compare two run directories (A = baseline, B = comparison)
    Compare(CompareArgs),

    /// List builtin scenarios
    List,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Builtin scenario (baseline_market, busy_market, faulty_agents)
    #[arg(short = 'S', long, default_value = "baseline_market")]
    scenario: String,

    /// Scenario JSON file (overrides --scenario)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Master seed for determinism
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of ticks
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Directory for the run artifacts
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Stop issuing ticks after this many seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Baseline run directory
    a: PathBuf,

    /// Comparison run directory
    b: PathBuf,

    /// Percent change above which a KPI is flagged
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Compare(args) => compare(args),
        Command::List => {
            for id in ScenarioId::all() {
                println!("{:<16} {}", id.name(), id.description());
            }
            Ok(0)
        }
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<SimError>()
                .map(SimError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };
    std::process::exit(code);
}

fn load_scenario(args: &RunArgs) -> Result<Scenario> {
    let scenario = match &args.config {
        Some(path) => Scenario::from_file(path)?,
        None => {
            let id: ScenarioId = args.scenario.parse().map_err(SimError::Configuration)?;
            id.build(42)
        }
    };
    let scenario = match args.seed {
        Some(seed) => scenario.with_seed(seed),
        None => scenario,
    };
    Ok(match args.ticks {
        Some(ticks) => scenario.with_ticks(ticks),
        None => scenario,
    })
}

async fn run(args: RunArgs) -> Result<i32> {
    let scenario = load_scenario(&args)?;
    if let Some(secs) = args.timeout {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(SimError::config(format!("timeout must be positive, got {}", secs)).into());
        }
    }

    info!("Agora Simulator v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cancel = CancelToken::new();
    let token = cancel.clone();
    let out = args.out.clone();
    let mut handle = tokio::task::spawn_blocking(move || run_scenario(scenario, out, token));

    let joined = match args.timeout {
        Some(secs) => {
            tokio::select! {
                res = &mut handle => res,
                _ = tokio::time::sleep(Duration::from_secs_f64(secs)) => {
                    warn!("Run exceeded {}s, cancelling", secs);
                    cancel.cancel();
                    handle.await
                }
            }
        }
        None => handle.await,
    };
    let result = joined.context("simulation task failed")??;

    report_run(&result, args.json)?;
    Ok(result.exit_code())
}

fn report_run(result: &RunResult, json: bool) -> Result<()> {
    let summary = &result.artifacts.summary;
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    if result.success {
        info!("✓ {} (seed={}) PASSED", summary.scenario, summary.seed);
    } else {
        error!("✗ {} (seed={}) {}", summary.scenario, summary.seed, result.status);
        for failure in &result.failed_assertions {
            error!("  - {}", failure.message);
        }
    }
    info!(
        "  ticks={}/{} duration={:?}",
        result.ticks_executed, summary.ticks_requested, result.duration
    );
    for (key, value) in &result.final_metrics {
        info!("  {:<20} {}", key, value);
    }
    info!(
        "  hashes: config={} actions={} metrics={}",
        result.hashes.config, result.hashes.actions, result.hashes.metrics
    );
    if let Some(dir) = &result.output_dir {
        info!("  artifacts: {}", dir.display());
    }
    Ok(())
}

fn compare(args: CompareArgs) -> Result<i32> {
    let a = ArtifactSet::load(&args.a)
        .map_err(SimError::from)
        .with_context(|| format!("loading {}", args.a.display()))?;
    let b = ArtifactSet::load(&args.b)
        .map_err(SimError::from)
        .with_context(|| format!("loading {}", args.b.display()))?;

    for (label, set) in [("A", &a), ("B", &b)] {
        if !set.verify() {
            warn!("{}: hashes in summary.json do not match file contents", label);
        }
    }

    let comparison = Comparator::new(args.threshold).compare(&a, &b);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        report_comparison(&comparison);
    }

    Ok(if comparison.verdict == Verdict::Equivalent { 0 } else { 1 })
}

fn report_comparison(cmp: &Comparison) {
    for diff in &cmp.metadata {
        info!("  {:<12} {} -> {}", diff.field, diff.baseline, diff.comparison);
    }
    for kpi in &cmp.kpis {
        let flag = if kpi.significant { " !" } else { "" };
        info!(
            "  {:<20} {} -> {} ({}%){}",
            kpi.metric,
            kpi.baseline,
            kpi.comparison,
            format_percent(kpi.change),
            flag
        );
    }
    for key in &cmp.only_in_baseline {
        info!("  {:<20} only in A", key);
    }
    for key in &cmp.only_in_comparison {
        info!("  {:<20} only in B", key);
    }
    for diff in cmp.actions.iter().filter(|d| d.delta != 0) {
        info!(
            "  action {:<14} {} -> {} ({:+})",
            diff.key, diff.baseline, diff.comparison, diff.delta
        );
    }
    for diff in cmp.revert_reasons.iter().filter(|d| d.delta != 0) {
        info!(
            "  revert '{}' {} -> {} ({:+})",
            diff.key, diff.baseline, diff.comparison, diff.delta
        );
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match cmp.verdict {
        Verdict::Equivalent => info!("✅ Runs are equivalent (hashes match)"),
        Verdict::ReproducibilityBug => {
            error!("❌ Same seed and config but different content: reproducibility bug")
        }
        Verdict::ScenarioChanged => info!(
            "Scenario changed; hashes_match={} ({} significant KPI changes)",
            cmp.hashes_match,
            cmp.significant_changes().count()
        ),
    }
}
