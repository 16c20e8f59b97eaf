use linuxaid_utils::term;
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the level is `info`, or `debug` when `debug` is set.
/// Debug output is JSON with source locations, regular output is compact text on stderr.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true);

    let result = if debug {
        builder
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .try_init()
    } else {
        builder
            .compact()
            .with_target(false)
            .with_ansi(term::is_ansi_stderr())
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("failed to initialize logging: {e}");
    }
}
