//! Log subscriber setup for binaries hosting the rollup step.
//!
//! The step logs under the `rollup_core` and `rollup_store` crate targets and
//! writes its trace-sink lines to [`TRACE_TARGET`]. Dependencies (SurrealDB
//! in particular) are held at `warn` unless `RUST_LOG` says otherwise.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Target the [`crate::TracingSink`] emits on.
pub const TRACE_TARGET: &str = "rollup::trace";

const CRATE_TARGETS: [&str; 3] = ["rollup_core", "rollup_store", "rollup"];

/// Filter directives used when `RUST_LOG` is unset.
///
/// Everything outside the rollup crates stays at `warn`. Trace-sink lines are
/// always kept at `info` so a quiet level does not hide the step's own trace.
pub fn default_directives(level: Level) -> String {
    let trace_level = if level < Level::INFO { Level::INFO } else { level };
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATE_TARGETS.iter().map(|t| format!("{t}={}", level_name(level))));
    directives.push(format!("{TRACE_TARGET}={}", level_name(trace_level)));
    directives.join(",")
}

fn level_name(level: Level) -> String {
    level.as_str().to_ascii_lowercase()
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber. Only the first call in a process wins.
pub fn init_tracing(json: bool, level: Level) {
    let text = (!json).then(|| fmt::layer().with_target(true));
    let structured = json.then(|| fmt::layer().json().with_current_span(true));

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(text)
        .with(structured)
        .try_init()
        .ok();
}
