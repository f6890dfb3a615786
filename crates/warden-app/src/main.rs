//! Warden - safety-screened task coordinator.
//!
//! This is the main binary. It wires the review queue, the screening
//! pipeline and the task handlers together and serves the HTTP API until
//! Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use warden_core::coordinator::{
    Coordinator, CoordinatorConfig, HandlerRegistry, HttpTextGenerator, HttpTextGeneratorConfig,
    TextGenerationHandler, TextGenerator,
};
use warden_core::review::{InMemoryReviewQueue, ReviewRepository};
use warden_core::safety::{
    ClassifierConfig, ContentClassifier, EvaluatorConfig, FailurePolicy, OversightEvaluator,
};
use warden_server::{AppState, Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use warden_storage::SqliteReviewQueue;

/// Environment variable holding the text-generation bearer token.
const TEXTGEN_API_KEY_ENV: &str = "WARDEN_TEXTGEN_API_KEY";

/// Failure policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Treat unjudgeable requests as harmless
    FailOpen,
    /// Escalate unjudgeable requests
    FailClosed,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FailOpen => FailurePolicy::FailOpen,
            PolicyArg::FailClosed => FailurePolicy::FailClosed,
        }
    }
}

/// Warden - safety-screened task coordinator
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
struct Args {
    /// Host to bind the API server to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind the API server to
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// SQLite file for the review queue (omit for an in-memory queue)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Keep the review queue in the default database under the app data directory
    #[arg(long, conflicts_with = "db_path")]
    persistent: bool,

    /// Directory queue exports are written to
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Text-generation endpoint; enables the text handlers
    #[arg(long)]
    textgen_url: Option<String>,

    /// Text-generation request timeout in seconds
    #[arg(long, default_value_t = 20)]
    textgen_timeout_secs: u64,

    /// Handler timeout in seconds
    #[arg(long, default_value_t = 30)]
    handler_timeout_secs: u64,

    /// What the content classifier reports when it cannot judge a request
    #[arg(long, value_enum, default_value_t = PolicyArg::FailOpen)]
    classifier_policy: PolicyArg,

    /// What the oversight evaluator reports when it cannot judge a request
    #[arg(long, value_enum, default_value_t = PolicyArg::FailClosed)]
    evaluator_policy: PolicyArg,

    /// Dispatch requests the oversight evaluator rates critical
    #[arg(long)]
    no_block_on_critical_oversight: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "warden", "Warden").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warden={},warn", log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("warden")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                // Console output too in debug mode
                if args.debug {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(std::io::stdout))
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                } else {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                }

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

/// Opens the review queue selected on the command line.
fn open_queue(args: &Args) -> anyhow::Result<Arc<dyn ReviewRepository>> {
    match &args.db_path {
        Some(path) => {
            let queue = SqliteReviewQueue::with_path(path)
                .with_context(|| format!("failed to open review queue at {}", path.display()))?;
            Ok(Arc::new(queue))
        }
        None if args.persistent => {
            let queue = SqliteReviewQueue::new().context("failed to open default review queue")?;
            Ok(Arc::new(queue))
        }
        None => {
            tracing::warn!("No --db-path or --persistent; review queue is in memory and lost on restart");
            Ok(Arc::new(InMemoryReviewQueue::new()))
        }
    }
}

/// Registers the text-generation handlers when a backend is configured.
fn build_handlers(args: &Args) -> anyhow::Result<HandlerRegistry> {
    let mut handlers = HandlerRegistry::new();

    let Some(url) = &args.textgen_url else {
        tracing::warn!("No --textgen-url given; text-generation task types are disabled");
        return Ok(handlers);
    };

    let mut config = HttpTextGeneratorConfig::new(url)
        .with_timeout(Duration::from_secs(args.textgen_timeout_secs));
    if let Ok(key) = std::env::var(TEXTGEN_API_KEY_ENV) {
        config = config.with_api_key(key);
    }

    let generator: Arc<dyn TextGenerator> =
        Arc::new(HttpTextGenerator::new(config).context("failed to build text-generation client")?);

    handlers.register(
        "assessment_feedback",
        Arc::new(TextGenerationHandler::assessment_feedback(generator.clone())),
    );
    handlers.register(
        "business_mentorship",
        Arc::new(TextGenerationHandler::business_mentorship(generator)),
    );

    tracing::info!(endpoint = %url, "Text-generation handlers registered");
    Ok(handlers)
}

/// Builds the application state from the command line.
fn build_state(args: &Args) -> anyhow::Result<AppState> {
    let reviews = open_queue(args)?;

    let classifier = ContentClassifier::new(
        ClassifierConfig::default().with_failure_policy(args.classifier_policy.into()),
    );
    let evaluator = OversightEvaluator::new(
        reviews.clone(),
        EvaluatorConfig::default().with_failure_policy(args.evaluator_policy.into()),
    );
    let coordinator_config = CoordinatorConfig::default()
        .with_handler_timeout(Duration::from_secs(args.handler_timeout_secs))
        .with_block_on_critical_oversight(!args.no_block_on_critical_oversight);

    let coordinator = Coordinator::new(
        Arc::new(classifier),
        Arc::new(evaluator),
        build_handlers(args)?,
        coordinator_config,
    );

    let mut state = AppState::new(Arc::new(coordinator), reviews);
    if let Some(dir) = &args.export_dir {
        state = state.with_export_dir(dir);
    }

    Ok(state)
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    tracing::info!("Starting Warden...");
    tracing::debug!("Args: {:?}", args);

    let state = build_state(&args)?;
    tracing::info!(
        classifier_policy = ?args.classifier_policy,
        evaluator_policy = ?args.evaluator_policy,
        block_on_critical_oversight = !args.no_block_on_critical_oversight,
        "Screening configured"
    );

    let mut config = ServerConfig::default()
        .with_host(args.host.clone())
        .with_port(args.port);
    if let Some(dir) = &args.export_dir {
        config = config.with_export_dir(dir);
    }

    let server = Server::with_state(config, state)?;
    server.run_until(shutdown_signal()).await?;

    tracing::info!("Warden shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Payload;
    use warden_core::ReviewItem;
    use warden_core::Severity;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["warden"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.host, DEFAULT_HOST);
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.classifier_policy, PolicyArg::FailOpen);
        assert_eq!(args.evaluator_policy, PolicyArg::FailClosed);
        assert!(!args.no_block_on_critical_oversight);
        assert!(args.db_path.is_none());
    }

    #[test]
    fn policies_parse_kebab_case() {
        let args = parse(&[
            "--classifier-policy",
            "fail-closed",
            "--evaluator-policy",
            "fail-open",
        ]);
        assert_eq!(
            FailurePolicy::from(args.classifier_policy),
            FailurePolicy::FailClosed
        );
        assert_eq!(
            FailurePolicy::from(args.evaluator_policy),
            FailurePolicy::FailOpen
        );
    }

    #[test]
    fn persistent_conflicts_with_db_path() {
        assert!(parse(&["--persistent"]).persistent);
        assert!(
            Args::try_parse_from(["warden", "--persistent", "--db-path", "q.db"]).is_err()
        );
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Args::try_parse_from(["warden", "--classifier-policy", "maybe"]).is_err());
    }

    #[test]
    fn state_without_backend_has_no_handlers() {
        let state = build_state(&parse(&[])).unwrap();
        assert!(state.coordinator.handlers().is_empty());
        assert!(state.export_dir.is_none());
    }

    #[test]
    fn state_with_backend_registers_text_handlers() {
        let state = build_state(&parse(&["--textgen-url", "http://127.0.0.1:9/generate"])).unwrap();
        assert_eq!(
            state.coordinator.handlers().task_types(),
            vec!["assessment_feedback", "business_mentorship"]
        );
    }

    #[test]
    fn state_uses_sqlite_queue_when_path_given() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("reviews.db");
        let db_arg = db.to_string_lossy().to_string();

        {
            let state = build_state(&parse(&["--db-path", &db_arg])).unwrap();
            state
                .reviews
                .append(ReviewItem::pending(
                    "review_persisted".into(),
                    Severity::High,
                    "reason",
                    Payload::Null,
                ))
                .unwrap();
        }

        let state = build_state(&parse(&["--db-path", &db_arg])).unwrap();
        assert_eq!(state.reviews.len().unwrap(), 1);
    }

    #[test]
    fn critical_oversight_flag_reaches_coordinator() {
        let state = build_state(&parse(&["--no-block-on-critical-oversight"])).unwrap();
        assert!(!state.coordinator.config().block_on_critical_oversight);
    }
}
