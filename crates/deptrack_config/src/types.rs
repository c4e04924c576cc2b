//! Configuration types deserialized from `deptrack.toml`.

use serde::Deserialize;

/// The top-level tracker configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrackerConfig {
    /// How a batch is scheduled.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Where and how dependency records are written.
    #[serde(default)]
    pub emit: EmitConfig,
    /// Recording policy.
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// Batch scheduling settings.
#[derive(Clone, Debug, Deserialize)]
pub struct BatchConfig {
    /// Worker threads for type-checking primaries; `0` lets rayon decide.
    #[serde(default)]
    pub jobs: usize,
    /// Whether the built-in prelude is loaded.
    #[serde(default = "default_true")]
    pub prelude: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            prelude: true,
        }
    }
}

/// Record emission settings.
#[derive(Clone, Debug, Deserialize)]
pub struct EmitConfig {
    /// Directory receiving `<stem>.<extension>` records for primaries that
    /// have no explicit output path.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Extension of records written to `output_dir`, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Where to write the emission manifest, if anywhere.
    #[serde(default)]
    pub manifest: Option<String>,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            extension: default_extension(),
            manifest: None,
        }
    }
}

/// Dependency recording policy.
#[derive(Clone, Debug, Deserialize)]
pub struct TrackingConfig {
    /// How much over-approximation member lookups record.
    #[serde(default)]
    pub precision: Precision,
    /// Log a warning when a query runs with no consumer context.
    #[serde(default = "default_true")]
    pub warn_missing_context: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            precision: Precision::default(),
            warn_missing_context: true,
        }
    }
}

/// Over-approximation policy for member lookups.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Also record a potential-member edge on the holder, so any change to
    /// its membership invalidates the consumer (default).
    #[default]
    Conservative,
    /// Record only the looked-up member.
    Precise,
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    "deps".to_string()
}
