//! Log subscriber setup for the `chainwatch` binary.

use std::collections::BTreeMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter settings assembled from `--log-level`, `--log-component` and
/// `--json-logs`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    /// Crate name (dashes allowed) to level.
    pub components: BTreeMap<String, String>,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            components: BTreeMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// The `EnvFilter` directive string, e.g. `"info,chainwatch_core=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        for (component, level) in &self.components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `config`.
///
/// Everything is written to stderr; stdout carries notifications under `--stdout`.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    let json = config.json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text = (!config.json).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry().with(filter).with(json).with(text).init();
}
