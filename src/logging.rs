//! Tracing subscriber setup.
//!
//! Log records go to stderr so stdout stays reserved for the ground-truth
//! summary, the fit report and the terminal plot.
//!
//! Filter precedence: `RUST_LOG`, then `VBSIM_LOG`, then `debug` when
//! `--debug` is given, otherwise `info`.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

pub const LOG_ENV: &str = "VBSIM_LOG";

/// Pick the filter directive string, without touching the environment.
pub fn filter_directive(rust_log: Option<&str>, vbsim_log: Option<&str>, debug: bool) -> String {
    let non_empty = |s: &&str| !s.trim().is_empty();
    rust_log
        .filter(non_empty)
        .or(vbsim_log.filter(non_empty))
        .map(str::to_string)
        .unwrap_or_else(|| if debug { "debug" } else { "info" }.to_string())
}

/// Install the global subscriber. Calling it twice (tests, embedding) is
/// harmless: the second call keeps the first subscriber.
pub fn init(debug: bool, vbsim_log: Option<&str>) -> Result<(), AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(rust_log.as_deref(), vbsim_log, debug);
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| AppError::config(format!("Invalid log filter '{directive}': {e}")))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    Ok(())
}
