use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

/// Installs a global subscriber that writes JSON lines to `make_writer`.
///
/// Event fields are flattened into the top-level object, next to the source location and the
/// innermost span. Everything that passes `env_filter` is handed to Sentry as well.
pub fn init_json_logging<W>(env_filter: &str, make_writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let json = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_timer(UtcTime::rfc_3339())
        .with_file(true)
        .with_line_number(true)
        .with_writer(make_writer);

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(json)
        .with(sentry::integrations::tracing::layer())
        .init();
}
