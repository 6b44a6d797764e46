//! Instrumentation policy.

use serde::{Deserialize, Serialize};

/// Where probes are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One probe per basic block
    #[default]
    BasicBlock,
    /// One probe on the first block of each source line; blocks without
    /// line information always get one
    Line,
}

/// Static method the probe sequence calls with `(segmentId, probeIndex)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeBridge {
    /// Internal name of the owning class
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl Default for ProbeBridge {
    fn default() -> Self {
        Self {
            owner: "bytecov/runtime/Probes".to_string(),
            name: "hit".to_string(),
            descriptor: "(II)V".to_string(),
        }
    }
}

/// Instrumentation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub granularity: Granularity,
    /// Method names never instrumented
    pub excluded_methods: Vec<String>,
    /// Annotation descriptor that opts a method out
    pub skip_annotation: Option<String>,
    pub bridge: ProbeBridge,
    /// Re-decode every rewritten class before handing it back
    pub self_check: bool,
}

pub const DEFAULT_SKIP_ANNOTATION: &str = "Lbytecov/runtime/DoNotTrack;";

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::BasicBlock,
            excluded_methods: vec!["<init>".to_string(), "<clinit>".to_string()],
            skip_annotation: Some(DEFAULT_SKIP_ANNOTATION.to_string()),
            bridge: ProbeBridge::default(),
            self_check: true,
        }
    }
}

impl InstrumentConfig {
    #[must_use]
    pub fn builder() -> InstrumentConfigBuilder {
        InstrumentConfigBuilder::default()
    }

    /// Whether `name` is in the exclusion list
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_methods.iter().any(|m| m == name)
    }
}

/// Builder for [`InstrumentConfig`], starting from the defaults
#[derive(Debug, Default)]
pub struct InstrumentConfigBuilder {
    config: InstrumentConfig,
}

impl InstrumentConfigBuilder {
    #[must_use]
    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.config.granularity = granularity;
        self
    }

    /// Replace the excluded method names
    #[must_use]
    pub fn excluded_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.excluded_methods = names.into_iter().map(Into::into).collect();
        self
    }

    /// Add one excluded method name
    #[must_use]
    pub fn exclude_method(mut self, name: impl Into<String>) -> Self {
        self.config.excluded_methods.push(name.into());
        self
    }

    /// Set or clear the opt-out annotation
    #[must_use]
    pub fn skip_annotation(mut self, descriptor: Option<String>) -> Self {
        self.config.skip_annotation = descriptor;
        self
    }

    #[must_use]
    pub fn bridge(mut self, bridge: ProbeBridge) -> Self {
        self.config.bridge = bridge;
        self
    }

    #[must_use]
    pub fn self_check(mut self, enabled: bool) -> Self {
        self.config.self_check = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> InstrumentConfig {
        self.config
    }
}
