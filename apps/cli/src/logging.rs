use std::io::{self, IsTerminal};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable that overrides the verbosity flags.
pub const LOG_ENV: &str = "TREEPAD_LOG";

/// Installs a stderr subscriber. `TREEPAD_LOG` wins over `-v`.
pub fn init_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_filter(filter);

    if let Err(err) = tracing_subscriber::registry().with(console).try_init() {
        eprintln!("warning: logging unavailable: {err}");
    }
}
