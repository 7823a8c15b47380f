//! gflux - Command-line driver for Gesture Flux
//!
//! Commands:
//! - run: Stream landmark frames from stdin through a pipeline (streaming mode)
//! - validate: Validate a landmark frame file
//! - config: Print the effective configuration
//! - doctor: Check configuration, replay script and frame input

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use gesture_flux::validator::validate_frame_value;
use gesture_flux::{
    ConfigError, GesturePipeline, LandmarkFrame, PipelineConfig, ScriptStep, ScriptedClassifier,
    FLUX_VERSION, PRODUCER_NAME,
};

/// gflux - Gesture window accumulation and dispatch
#[derive(Parser)]
#[command(name = "gflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Accumulate hand landmark frames and dispatch gesture windows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream NDJSON frames from stdin and print pipeline events as NDJSON
    Run {
        /// Replay script for the classifier (JSON array of responses/errors)
        #[arg(short, long)]
        responses: PathBuf,

        /// Pipeline configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Simulated classifier latency
        #[arg(long, default_value = "0")]
        latency_ms: u64,

        /// Delay between frames (33 for a 30 fps camera)
        #[arg(long, default_value = "0")]
        frame_interval_ms: u64,
    },

    /// Validate an NDJSON frame file
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Configuration file merged over the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check configuration, replay script and frame input before a run
    Doctor {
        /// Configuration file to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Replay script to check
        #[arg(short, long)]
        responses: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            responses,
            config,
            latency_ms,
            frame_interval_ms,
        } => cmd_run(&responses, config.as_deref(), latency_ms, frame_interval_ms).await,
        Commands::Validate { input, json } => cmd_validate(&input, json),
        Commands::Config { config } => cmd_config(config.as_deref()),
        Commands::Doctor {
            config,
            responses,
            json,
        } => cmd_doctor(config.as_deref(), responses.as_deref(), json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, GfluxCliError> {
    match path {
        Some(path) => Ok(PipelineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(PipelineConfig::default()),
    }
}

async fn cmd_run(
    responses: &Path,
    config: Option<&Path>,
    latency_ms: u64,
    frame_interval_ms: u64,
) -> Result<(), GfluxCliError> {
    let config = load_config(config)?;
    let classifier = ScriptedClassifier::from_json(&fs::read_to_string(responses)?)?
        .with_latency(Duration::from_millis(latency_ms));
    let settle = Duration::from_millis(config.coalesce_delay_ms.saturating_add(10));
    let pipeline = GesturePipeline::new(config, Arc::new(classifier))?;

    pipeline.subscribe(|event| {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
            GfluxCliError::ParseError(format!("Line {}: {}", line_no, e))
        })?;
        let outcome = pipeline.push_value(&value);
        if !outcome.is_accepted() {
            tracing::debug!(line = line_no, ?outcome, "frame not accepted");
        }

        if frame_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(frame_interval_ms)).await;
        }
    }

    // let a pending coalesced dispatch fire, then drain the queue
    tokio::time::sleep(settle).await;
    while pipeline.is_active() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let summary = serde_json::json!({
        "event": "run:finished",
        "data": {
            "frames": line_no,
            "buffer": pipeline.buffer_status(),
            "stats": pipeline.stats(),
        }
    });
    println!("{}", summary);
    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), GfluxCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let mut report = ValidationReport::default();
    for (i, line) in input_data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        report.total_frames += 1;

        let checked = serde_json::from_str::<serde_json::Value>(trimmed)
            .map_err(|e| e.to_string())
            .and_then(|value| {
                validate_frame_value(&value)
                    .and_then(LandmarkFrame::try_from)
                    .map_err(|e| e.to_string())
            });

        match checked {
            Ok(frame) => {
                report.valid_frames += 1;
                report.hand_counts[frame.hand_count() as usize] += 1;
            }
            Err(error) => report.errors.push(FrameErrorDetail { line: i + 1, error }),
        }
    }
    report.invalid_frames = report.errors.len();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);
        println!(
            "Hands (0/1/2):  {}/{}/{}",
            report.hand_counts[0], report.hand_counts[1], report.hand_counts[2]
        );

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(GfluxCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), GfluxCliError> {
    let config = load_config(config)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    responses: Option<&Path>,
    json: bool,
) -> Result<(), GfluxCliError> {
    let mut checks = vec![Finding {
        check: "build",
        level: Level::Pass,
        detail: format!("{} {}", PRODUCER_NAME, FLUX_VERSION),
    }];

    checks.push(match load_config(config) {
        Ok(cfg) => Finding {
            check: "timing",
            level: Level::Pass,
            detail: format!(
                "{}-frame window, {}ms coalesce, at most one dispatch per {}ms, {} mode",
                cfg.frames_required,
                cfg.coalesce_delay_ms,
                cfg.detection_interval_ms,
                if cfg.enable_prediction_queue {
                    "queued"
                } else {
                    "direct"
                }
            ),
        },
        Err(e) => Finding {
            check: "timing",
            level: Level::Fail,
            detail: CliError::from(e).message,
        },
    });

    if let Some(path) = responses {
        let script = fs::read_to_string(path)
            .map_err(GfluxCliError::from)
            .and_then(|raw| Ok(serde_json::from_str::<Vec<ScriptStep>>(&raw)?));
        checks.push(match script {
            Ok(steps) if steps.is_empty() => Finding {
                check: "script",
                level: Level::Fail,
                detail: "replay script has no steps; every request would fail".to_string(),
            },
            Ok(steps) => {
                let failures = steps
                    .iter()
                    .filter(|s| matches!(s, ScriptStep::Fail { .. }))
                    .count();
                Finding {
                    check: "script",
                    level: Level::Pass,
                    detail: format!("{} replay steps ({} failures)", steps.len(), failures),
                }
            }
            Err(e) => Finding {
                check: "script",
                level: Level::Fail,
                detail: CliError::from(e).message,
            },
        });
    }

    checks.push(if atty::is(atty::Stream::Stdin) {
        Finding {
            check: "frames",
            level: Level::Warn,
            detail: "no frames piped in; `gflux run` reads NDJSON from stdin".to_string(),
        }
    } else {
        Finding {
            check: "frames",
            level: Level::Pass,
            detail: "frame source attached to stdin".to_string(),
        }
    });

    let healthy = !checks.iter().any(|c| matches!(c.level, Level::Fail));

    if json {
        let report = DoctorReport { healthy, checks };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for finding in &checks {
            println!("{:<6} {:<5} {}", finding.check, finding.level.label(), finding.detail);
        }
        println!(
            "{}",
            if healthy {
                "ready"
            } else {
                "not ready"
            }
        );
    }

    if healthy {
        Ok(())
    } else {
        Err(GfluxCliError::DoctorFailed)
    }
}

// Error types

#[derive(Debug)]
enum GfluxCliError {
    Io(io::Error),
    Config(ConfigError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for GfluxCliError {
    fn from(e: io::Error) -> Self {
        GfluxCliError::Io(e)
    }
}

impl From<ConfigError> for GfluxCliError {
    fn from(e: ConfigError) -> Self {
        GfluxCliError::Config(e)
    }
}

impl From<serde_json::Error> for GfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        GfluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GfluxCliError> for CliError {
    fn from(e: GfluxCliError) -> Self {
        match e {
            GfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GfluxCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'gflux config' to see the accepted keys".to_string()),
            },
            GfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GfluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Each line must hold 126 finite numbers".to_string()),
            },
            GfluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            GfluxCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Input must be NDJSON, one frame per line".to_string()),
            },
        }
    }
}

// Report types

#[derive(Default, serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    /// Valid frames by number of hands present
    hand_counts: [usize; 3],
    errors: Vec<FrameErrorDetail>,
}

#[derive(serde::Serialize)]
struct FrameErrorDetail {
    line: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    healthy: bool,
    checks: Vec<Finding>,
}

#[derive(serde::Serialize)]
struct Finding {
    check: &'static str,
    level: Level,
    detail: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Pass,
    Warn,
    Fail,
}

impl Level {
    fn label(&self) -> &'static str {
        match self {
            Level::Pass => "pass",
            Level::Warn => "warn",
            Level::Fail => "FAIL",
        }
    }
}
