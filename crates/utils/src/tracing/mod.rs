use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// Honors `RUST_LOG` and falls back to `info`. Output goes to stderr in a
/// compact format. Returns an error if a global subscriber is already set.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span for the execution of a single task
pub fn task_span(task_id: &str) -> Span {
    span!(Level::INFO, "task", task_id = %task_id)
}

/// Create a span for an entire engine run
pub fn run_span(mode: &str, total_tasks: usize) -> Span {
    span!(Level::INFO, "run", mode = %mode, total_tasks = %total_tasks)
}

/// Create a span for one worker of the pool
pub fn worker_span(worker_id: usize) -> Span {
    span!(Level::DEBUG, "worker", worker_id = %worker_id)
}

/// Emit a structured event for task completion
pub fn task_completed(task_id: &str, duration_ms: u64, success: bool) {
    if success {
        info!(task_id = %task_id, duration_ms = %duration_ms, "task_passed");
    } else {
        error!(task_id = %task_id, duration_ms = %duration_ms, "task_failed");
    }
}
