//! Evaluates the input read from stdin.
//!
//! Prints the response as JSON, or only the output lines with `--text`.
//! A rejected input is printed to stderr and exits with a failure code.
use std::{
    io::{self, Read},
    process::ExitCode,
};

/// Print only the output lines instead of the full response.
const TEXT_FLAG: &str = "--text";

fn main() -> ExitCode {
    #[cfg(feature = "tracing")]
    let _log_guard = logging::enable();

    let default_panic_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        panic_hook(panic_info);
        default_panic_hook(panic_info);
    }));

    let text_only = std::env::args().skip(1).any(|arg| arg == TEXT_FLAG);

    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        #[cfg(feature = "tracing")]
        tracing::error!(?err, "could not read input");
        eprintln!("could not read input: {err}");
        return ExitCode::FAILURE;
    }

    match reckon_host::evaluate(&input) {
        Ok(response) => {
            if text_only {
                print!("{}", response.output);
                return ExitCode::SUCCESS;
            }

            match serde_json::to_string(&response) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(?err, "could not serialize response");
                    eprintln!("could not serialize response: {err}");
                    ExitCode::FAILURE
                }
            }
        }

        Err(rejection) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(status = rejection.status, "input rejected");
            eprintln!("{rejection}");
            ExitCode::FAILURE
        }
    }
}

fn panic_hook(panic_info: &std::panic::PanicHookInfo) {
    let payload = if let Some(payload) = panic_info.payload().downcast_ref::<&str>() {
        Some(&**payload)
    } else if let Some(payload) = panic_info.payload().downcast_ref::<String>() {
        Some(payload.as_str())
    } else {
        None
    };

    let location = panic_info.location().map(|location| location.to_string());
    #[cfg(feature = "tracing")]
    tracing::error!("reckon panicked at {location:?}: {payload:?}");
    #[cfg(not(feature = "tracing"))]
    let _ = (location, payload);
}

#[cfg(feature = "tracing")]
mod logging {
    use std::{env, io};
    use tracing_subscriber::{
        EnvFilter, Registry, filter,
        fmt::{self, time::UtcTime},
        prelude::*,
    };

    /// Directory to write log files to.
    /// File logging is disabled if not set.
    const LOG_DIR_KEY: &str = "RECKON_LOG_DIR";
    const LOG_PREFIX: &str = "reckon.log";

    #[cfg(debug_assertions)]
    const RECKON_LOG_LEVEL_FILE: tracing::Level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    const RECKON_LOG_LEVEL_FILE: tracing::Level = tracing::Level::ERROR;

    /// Enable logging.
    /// Logs go to stderr so stdout only carries the response.
    ///
    /// # Returns
    /// Guard for the file logger, if enabled.
    /// Buffered logs are flushed when it is dropped.
    pub fn enable() -> Option<tracing_appender::non_blocking::WorkerGuard> {
        let console_logger = fmt::layer()
            .with_writer(io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .pretty();

        let (file_logger, log_guard) = match env::var_os(LOG_DIR_KEY) {
            Some(log_dir) => {
                let file_filter = filter::Targets::default()
                    .with_default(tracing::Level::ERROR)
                    .with_target("reckon", RECKON_LOG_LEVEL_FILE);

                let file_logger = tracing_appender::rolling::daily(log_dir, LOG_PREFIX);
                let (file_logger, log_guard) = tracing_appender::non_blocking(file_logger);
                let file_logger = fmt::layer()
                    .with_writer(file_logger)
                    .with_timer(UtcTime::rfc_3339())
                    .json()
                    .with_filter(file_filter);

                (Some(file_logger), Some(log_guard))
            }
            None => (None, None),
        };

        let subscriber = Registry::default()
            .with(EnvFilter::from_default_env())
            .with(console_logger)
            .with(file_logger);

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("could not enable logging: {err}");
        }
        log_guard
    }
}
