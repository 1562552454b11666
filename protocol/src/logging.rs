//! # Structured Logging
//!
//! The engine only emits `tracing` events. Whoever embeds a vault (a keeper,
//! a simulation, the benches, the test suites) installs a subscriber here.
//!
//! Filtering follows `RUST_LOG` when set. Otherwise the caller's default
//! directives apply; [`DEFAULT_DIRECTIVES`] keeps the vault crates at
//! `info` and everything else at `warn`. `STRATA_LOG_FORMAT=json` switches
//! to JSON lines.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Vault crates at `info`, the rest at `warn`.
pub const DEFAULT_DIRECTIVES: &str = "warn,strata_protocol=info,strata_contracts=info";

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "STRATA_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output with file and line.
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// "json" in any case selects JSON; anything else is pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }

    /// The format named by `STRATA_LOG_FORMAT`, pretty when unset.
    pub fn from_env() -> Self {
        std::env::var(FORMAT_ENV)
            .map(|v| Self::from_str_lossy(&v))
            .unwrap_or(LogFormat::Pretty)
    }
}

fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Installs the process-wide subscriber. Returns `false` when one was
/// already installed, in which case nothing changes.
pub fn try_init_logging(default_directives: &str, format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(default_directives));
    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
    }
    .is_ok();

    if installed {
        tracing::debug!(?format, "logging initialized");
    }
    installed
}

/// Like [`try_init_logging`], but writes through the test harness's
/// captured output at `warn`. Call it from every test fixture.
pub fn try_init_test_logging() {
    let registry = tracing_subscriber::registry().with(env_filter("warn"));
    let _ = match LogFormat::from_env() {
        LogFormat::Pretty => registry.with(fmt::layer().with_test_writer()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_test_writer())
            .try_init(),
    };
}
