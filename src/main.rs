//! Antifraud Liveness CLI
//!
//! Runs liveness checks and identity verification on media files and
//! prints one JSON report per file on stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use antifraud_liveness::{
    metrics::MetricsRegistry, AnalysisError, AppConfig, Deadline, IdentityVerifier,
    LandmarkExtractor, LandmarkSet, LivenessEngine, MediaKind, NoFaceExtractor, RecordedLandmarks,
    RecordedScores, TimeLimited,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Blink and motion based liveness checks for candidate media
#[derive(Parser)]
#[command(name = "liveness", author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Expose Prometheus metrics on this port while running
    #[cfg(feature = "metrics")]
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide whether each file shows a live face
    Check(CheckArgs),
    /// Score how clearly a face can be analysed in a file
    Verify(VerifyArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// Media files to analyse
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Declared media kind: a MIME type, "still" or "video" (default: from extension)
    #[arg(long)]
    kind: Option<MediaKind>,

    /// Recorded landmarks (JSON) to use instead of `<file>.landmarks.json`
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Per-file deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct VerifyArgs {
    /// Media file to verify
    file: PathBuf,

    /// Recorded face-analysis scores (JSON object or null)
    #[arg(long)]
    scores: PathBuf,

    /// Declared media kind: a MIME type, "still" or "video" (default: from extension)
    #[arg(long)]
    kind: Option<MediaKind>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Status {
    /// Every file passed.
    Pass = 0,
    /// At least one file was judged not live or not a match.
    Fail = 1,
    /// At least one file could not be analysed.
    Error = 2,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status as u8)
    }
}

#[derive(Serialize)]
struct ReportError {
    kind: String,
    message: String,
}

impl From<&AnalysisError> for ReportError {
    fn from(e: &AnalysisError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// One line of output.
#[derive(Serialize)]
struct Report<R> {
    path: String,
    analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_digest: Option<String>,
    #[serde(flatten)]
    verdict: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ReportError>,
}

impl<R> Report<R> {
    fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            analyzed_at: Utc::now(),
            media_digest: None,
            verdict: None,
            details: None,
            error: None,
        }
    }
}

#[derive(Serialize)]
struct LivenessVerdict {
    liveness: antifraud_liveness::LivenessResult,
}

#[derive(Serialize)]
struct VerificationVerdict {
    verification: antifraud_liveness::VerificationResult,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match run(cli) {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            Status::Error.into()
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<Status> {
    info!("Antifraud Liveness v{}", antifraud_liveness::VERSION);

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("invalid configuration {}", path.display()))?,
        None => AppConfig::default(),
    };

    let registry = Arc::new(MetricsRegistry::new().context("failed to create metrics registry")?);

    #[cfg(feature = "metrics")]
    {
        let port = cli.metrics_port.unwrap_or(config.metrics.port);
        if port != 0 {
            start_metrics_server(port, Arc::clone(&registry))?;
        }
    }
    #[cfg(not(feature = "metrics"))]
    {
        if config.metrics.port != 0 {
            warn!("metrics.port is set but this build has no metrics server");
        }
    }

    let abort = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&abort);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "cannot install Ctrl-C handler");
    }

    match &cli.command {
        Command::Check(args) => check(args, &config, registry, &abort),
        Command::Verify(args) => verify(args, &config, registry),
    }
}

fn check(
    args: &CheckArgs,
    config: &AppConfig,
    registry: Arc<MetricsRegistry>,
    abort: &Arc<AtomicBool>,
) -> anyhow::Result<Status> {
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .or_else(|| config.limits.request_timeout());
    let mut status = Status::Pass;

    for path in &args.files {
        if abort.load(Ordering::SeqCst) {
            warn!(path = %path.display(), "interrupted, remaining files skipped");
            status = status.max(Status::Error);
            break;
        }

        let mut report = Report::<LivenessVerdict>::new(path);
        let outcome = std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))
            .map(|bytes| {
                let kind = args.kind.unwrap_or_else(|| MediaKind::from_path(path));
                let deadline = Deadline::from_timeout(timeout).with_abort_flag(Arc::clone(abort));
                landmark_source(path, args.landmarks.as_deref(), config)
                    .map_err(AnalysisError::from)
                    .and_then(|extractor| {
                        LivenessEngine::new(config.liveness.clone(), extractor)
                            .with_metrics(Arc::clone(&registry))
                            .analyze(&bytes, kind, &deadline)
                    })
            });

        match outcome {
            Ok(Ok(analysis)) => {
                if !analysis.result.is_live {
                    status = status.max(Status::Fail);
                }
                report.media_digest = analysis.media_digest.clone();
                report.verdict = Some(LivenessVerdict {
                    liveness: analysis.result,
                });
                report.details = Some(serde_json::to_value(&analysis)?);
            }
            Ok(Err(e)) => {
                status = Status::Error;
                report.error = Some(ReportError::from(&e));
            }
            Err(e) => {
                status = Status::Error;
                report.error = Some(ReportError {
                    kind: "io_error".into(),
                    message: format!("{e:#}"),
                });
            }
        }

        emit(&report, args.pretty)?;
    }

    Ok(status)
}

fn verify(
    args: &VerifyArgs,
    config: &AppConfig,
    registry: Arc<MetricsRegistry>,
) -> anyhow::Result<Status> {
    let bytes =
        std::fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;
    let kind = args.kind.unwrap_or_else(|| MediaKind::from_path(&args.file));
    let mut report = Report::<VerificationVerdict>::new(&args.file);

    let outcome = RecordedScores::from_file(&args.scores)
        .and_then(|scores| TimeLimited::analyzer(scores, config.limits.frame_timeout()))
        .map_err(AnalysisError::from)
        .and_then(|analyzer| {
            IdentityVerifier::new(config.verification.clone(), analyzer)
                .with_metrics(registry)
                .verify(&bytes, kind)
        });

    let status = match outcome {
        Ok(outcome) => {
            report.media_digest = outcome.media_digest.clone();
            report.verdict = Some(VerificationVerdict {
                verification: outcome.result,
            });
            report.details = Some(serde_json::to_value(&outcome)?);
            if outcome.result.is_match {
                Status::Pass
            } else {
                Status::Fail
            }
        }
        Err(e) => {
            report.error = Some(ReportError::from(&e));
            Status::Error
        }
    };

    emit(&report, args.pretty)?;
    Ok(status)
}

/// Picks the landmark backend for one file.
///
/// An explicit recording wins, then a `<file>.landmarks.json` sidecar.
/// Without either, no faces are found and liveness rests on motion.
fn landmark_source(
    media: &Path,
    explicit: Option<&Path>,
    config: &AppConfig,
) -> Result<TimeLimited<Option<LandmarkSet>>, antifraud_liveness::CapabilityError> {
    let sidecar = {
        let mut name = media.as_os_str().to_owned();
        name.push(".landmarks.json");
        PathBuf::from(name)
    };

    let extractor: Box<dyn LandmarkExtractor> = match explicit {
        Some(path) => Box::new(RecordedLandmarks::from_file(path)?),
        None if sidecar.is_file() => Box::new(RecordedLandmarks::from_file(&sidecar)?),
        None => Box::new(NoFaceExtractor),
    };

    TimeLimited::extractor(extractor, config.limits.frame_timeout())
}

fn emit<T: Serialize>(report: &T, pretty: bool) -> anyhow::Result<()> {
    let line = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    println!("{line}");
    Ok(())
}

#[cfg(feature = "metrics")]
fn start_metrics_server(port: u16, registry: Arc<MetricsRegistry>) -> anyhow::Result<()> {
    use antifraud_liveness::metrics::{MetricsServer, MetricsServerConfig};

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("failed to start metrics runtime")?;

    std::thread::Builder::new()
        .name("metrics-server".into())
        .spawn(move || {
            let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
            if let Err(e) = runtime.block_on(server.run()) {
                tracing::error!(error = %e, "metrics server stopped");
            }
        })
        .context("failed to spawn metrics thread")?;

    Ok(())
}
