use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initializes the global tracing subscriber exactly once.
///
/// `json=true` selects structured JSON output (production); otherwise a
/// human-readable pretty formatter with file/line/thread metadata.
pub fn init_logger(service_name: &'static str, json: bool) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let base = fmt()
            .with_env_filter(filter)
            .with_target(true) // <-- shows crate/module path
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_line_number(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE);

        if json {
            base.json().init();
        } else {
            base.pretty().init();
        }

        tracing::info!(service = service_name, "logger initialized");
    });
}
