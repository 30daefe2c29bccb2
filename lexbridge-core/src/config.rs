//! Bridge configuration.

use crate::error::Result;
use crate::region::{DEFAULT_PAGES, DEFAULT_STAGING_START, RegionLayout};
use serde::{Deserialize, Serialize};

/// When tokens reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Forward each step's tokens as soon as the step returns.
    ///
    /// Tokens delivered before a failure stay delivered.
    #[default]
    Streaming,
    /// Buffer copies of every token and release them only if the run succeeds.
    Atomic,
}

/// Names of the guest's exported entry points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryPoints {
    /// `(i32) -> ()`: reset scanner state for input at the given offset.
    pub setup: String,
    /// `() -> i32`: advance by one token.
    pub step: String,
    /// `() -> ()`: optional hook run once after instantiation.
    pub post_instantiate: String,
}

impl Default for EntryPoints {
    fn default() -> Self {
        Self {
            setup: "_xx_setup".to_string(),
            step: "_xx_run".to_string(),
            post_instantiate: "__post_instantiate".to_string(),
        }
    }
}

/// Configuration for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Region size in 64 KiB pages.
    pub pages: u32,
    /// Offset of the staging window.
    pub staging_start: u32,
    /// Upper bound on step calls per run.
    pub max_steps: Option<u64>,
    /// Token delivery mode.
    pub delivery: DeliveryMode,
    /// Guest entry point names.
    pub entry_points: EntryPoints,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pages: DEFAULT_PAGES,
            staging_start: DEFAULT_STAGING_START,
            max_steps: None,
            delivery: DeliveryMode::default(),
            entry_points: EntryPoints::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration for tests: small region and a step budget.
    pub fn testing() -> Self {
        Self {
            pages: 4,
            max_steps: Some(100_000),
            ..Self::default()
        }
    }

    /// Set the region size in pages.
    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    /// Set the staging window offset.
    pub fn with_staging_start(mut self, offset: u32) -> Self {
        self.staging_start = offset;
        self
    }

    /// Limit the number of steps per run.
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set the delivery mode.
    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    /// Override the guest entry point names.
    pub fn with_entry_points(mut self, entry_points: EntryPoints) -> Self {
        self.entry_points = entry_points;
        self
    }

    /// Validate and build the region layout.
    pub fn layout(&self) -> Result<RegionLayout> {
        RegionLayout::new(self.pages, self.staging_start)
    }

    /// Check the configuration without building anything.
    pub fn validate(&self) -> Result<()> {
        self.layout().map(|_| ())
    }
}
