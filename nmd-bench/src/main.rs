//! NopeMD bench - headless desktop runner
//!
//! Runs one benchmark scenario against libnopemd without any surface and
//! writes the report, if the scenario has one, next to the other results.

use std::path::PathBuf;

use anyhow::Result;

use nmd_core::ffi::NmdLibrary;
use nmd_core::report;
use nmd_core::{FfiEngine, Harness, NoSurface, ReplayFixture, RunConfig, ScenarioKind};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nmd=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;

    if options.print_config {
        println!("{}", serde_json::to_string_pretty(&options.config)?);
        return Ok(());
    }

    tracing::info!("NopeMD bench v{}", nmd_core::VERSION);
    run(&options)
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug)]
struct BenchOptions {
    config: RunConfig,
    library: Option<PathBuf>,
    print_config: bool,
}

fn parse_args(args: &[String]) -> Result<BenchOptions> {
    let mut config = RunConfig::default();
    let mut library: Option<PathBuf> = None;
    let mut print_config = false;

    let mut i = 1;
    while i < args.len() {
        let value = move |name: &str| arg_value(args, i, name);
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = PathBuf::from(value("--config")?);
                // Flags after --config still override the file
                config = RunConfig::load(&path)?;
                i += 2;
            }
            "--scenario" | "-s" => {
                let name = value("--scenario")?;
                config.scenario = ScenarioKind::parse(name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown scenario {}", name))?;
                i += 2;
            }
            "--input" | "-i" => {
                config.source = value("--input")?.clone();
                i += 2;
            }
            "--model" | "-m" => {
                config.model = value("--model")?.clone();
                i += 2;
            }
            "--sessions" | "-n" => {
                let n = value("--sessions")?;
                config.sessions = n
                    .parse::<usize>()
                    .map_err(|e| anyhow::anyhow!("Invalid session count {}: {}", n, e))?;
                i += 2;
            }
            "--frames" | "-f" => {
                let n = value("--frames")?;
                config.concurrent.budget = n
                    .parse::<usize>()
                    .map_err(|e| anyhow::anyhow!("Invalid frame budget {}: {}", n, e))?;
                i += 2;
            }
            "--output" | "-o" => {
                config.output = Some(PathBuf::from(value("--output")?));
                i += 2;
            }
            "--output-dir" => {
                config.output_dir = PathBuf::from(value("--output-dir")?);
                i += 2;
            }
            "--library" => {
                library = Some(PathBuf::from(value("--library")?));
                i += 2;
            }
            "--unpaced" => {
                config.fixture = ReplayFixture::unpaced();
                i += 1;
            }
            "--print-config" => {
                print_config = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                tracing::warn!("Ignoring unknown argument {}", other);
                i += 1;
            }
        }
    }

    config.validate().map_err(|e| {
        print_usage();
        anyhow::anyhow!(e)
    })?;

    Ok(BenchOptions {
        config,
        library,
        print_config,
    })
}

fn arg_value<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a String> {
    args.get(i + 1)
        .ok_or_else(|| anyhow::anyhow!("Missing value for {}", name))
}

fn print_usage() {
    eprintln!(
        "\nUsage:\n  nmd-bench --input <file> [--scenario <linear|live|random-seek|seek-sweep|concurrent|audio>]\n            [--model <id>] [--sessions <n>] [--frames <n>] [--output <file>] [--output-dir <dir>]\n            [--library <libnopemd.so>] [--unpaced] [--print-config]\n  nmd-bench --config <run.json> [flags...]\n"
    );
}

// ============================================================================
// Run
// ============================================================================

fn run(options: &BenchOptions) -> Result<()> {
    let config = &options.config;
    let engine = match &options.library {
        Some(path) => FfiEngine::new(NmdLibrary::load(path)?),
        None => FfiEngine::load_default()?,
    };
    let harness = Harness::new(engine);
    let session = config.session_config();

    tracing::info!("Running {:?} on {}", config.scenario, config.source);

    match config.scenario {
        ScenarioKind::Linear | ScenarioKind::Live | ScenarioKind::RandomSeek => {
            let params = config
                .linear_params()
                .ok_or_else(|| anyhow::anyhow!("No linear parameters for {:?}", config.scenario))?;
            let outcome = harness.linear::<NoSurface>(&config.source, &session, None, &params)?;
            tracing::info!("Decoded {} frames at {:.2} fps", outcome.frames, outcome.fps());
            if let Some(replay) = outcome.replay {
                tracing::info!("Replay: {}/{} frames found", replay.hits, replay.attempts);
            }
        }
        ScenarioKind::SeekSweep => {
            let outcome = harness.seek_sweep::<NoSurface>(&config.source, &session, None, &config.seek_sweep)?;
            persist(report::seek_report(&config.metadata(), &outcome), config);
        }
        ScenarioKind::Concurrent => {
            let surfaces = (0..config.sessions).map(|_| None::<NoSurface>).collect();
            let outcome = harness.concurrent(&config.source, &session, surfaces, &config.concurrent)?;
            persist(report::decode_report(&config.metadata(), &outcome), config);
        }
        ScenarioKind::Audio => {
            let outcome = harness.audio(&config.source, &session)?;
            tracing::info!("Decoded {} audio frames in {:.3} s", outcome.frames, outcome.elapsed);
        }
    }

    Ok(())
}

/// Write the report where the config says; a failure is logged only
fn persist(report: report::RunReport, config: &RunConfig) {
    let Some(path) = config.report_path() else {
        return;
    };
    if let Err(e) = report.persist(&path) {
        tracing::error!("{}", e);
    }
}
