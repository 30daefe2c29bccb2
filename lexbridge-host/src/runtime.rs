//! Scanner runtime management using Wasmtime.
//!
//! Provides engine configuration, module compilation, and caching so that
//! many bridges can be instantiated from one compiled scanner.

use dashmap::DashMap;
use lexbridge_core::region::{DEFAULT_PAGES, MAX_PAGES};
use lexbridge_core::{BridgeError, Result};
use std::sync::Arc;
use wasmtime::{Config, Engine, Module};

/// Default cap on region pages a bridge may request (64 MB).
const DEFAULT_MAX_MEMORY_PAGES: u32 = 1024;

/// Default fuel per run when fuel is enabled.
const DEFAULT_FUEL: u64 = 10_000_000;

/// Default epoch ticks a run may span when interruption is enabled.
const DEFAULT_EPOCH_DEADLINE: u64 = 1;

/// Configuration for the scanner runtime.
#[derive(Debug, Clone)]
pub struct ScannerRuntimeConfig {
    /// Largest region, in 64 KiB pages, a bridge may be built with.
    pub max_memory_pages: u32,
    /// Whether to meter guest execution with fuel.
    pub fuel_enabled: bool,
    /// Fuel granted at the start of every run.
    pub fuel_amount: u64,
    /// Whether to enable epoch-based interruption.
    pub epoch_interruption: bool,
    /// Epoch ticks a run may span before it is interrupted.
    pub epoch_deadline: u64,
    /// Whether to cache compiled modules.
    pub cache_modules: bool,
    /// Enable debug info in compiled modules.
    pub debug_info: bool,
}

impl Default for ScannerRuntimeConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: DEFAULT_MAX_MEMORY_PAGES,
            fuel_enabled: false,
            fuel_amount: DEFAULT_FUEL,
            epoch_interruption: false,
            epoch_deadline: DEFAULT_EPOCH_DEADLINE,
            cache_modules: true,
            debug_info: false,
        }
    }
}

impl ScannerRuntimeConfig {
    /// Create a configuration for long-running hosts.
    ///
    /// Runs are bounded by wall time through the epoch counter, which the
    /// host advances with [`ScannerRuntime::increment_epoch`].
    pub fn production() -> Self {
        Self {
            epoch_interruption: true,
            ..Self::default()
        }
    }

    /// Create a configuration for testing with stricter limits.
    pub fn testing() -> Self {
        Self {
            max_memory_pages: DEFAULT_PAGES * 2,
            fuel_enabled: true,
            fuel_amount: 1_000_000,
            epoch_interruption: false,
            epoch_deadline: DEFAULT_EPOCH_DEADLINE,
            cache_modules: false,
            debug_info: true,
        }
    }

    /// Set maximum memory pages.
    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = pages;
        self
    }

    /// Enable or disable fuel-based limiting.
    pub fn with_fuel(mut self, enabled: bool, amount: u64) -> Self {
        self.fuel_enabled = enabled;
        self.fuel_amount = amount;
        self
    }

    /// Enable or disable epoch interruption.
    pub fn with_epoch_interruption(mut self, enabled: bool) -> Self {
        self.epoch_interruption = enabled;
        self
    }

    /// Set the epoch deadline in ticks.
    pub fn with_epoch_deadline(mut self, ticks: u64) -> Self {
        self.epoch_deadline = ticks;
        self
    }

    /// Enable or disable module caching.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_modules = enabled;
        self
    }

    /// Check the configuration without building an engine.
    pub fn validate(&self) -> Result<()> {
        if self.max_memory_pages == 0 || self.max_memory_pages > MAX_PAGES {
            return Err(BridgeError::InvalidConfig {
                cause: format!(
                    "max_memory_pages must be in 1..={MAX_PAGES}, got {}",
                    self.max_memory_pages
                ),
            });
        }
        if self.epoch_interruption && self.epoch_deadline == 0 {
            return Err(BridgeError::InvalidConfig {
                cause: "epoch deadline of 0 would interrupt every run immediately".to_string(),
            });
        }
        Ok(())
    }

    fn to_wasmtime_config(&self) -> Config {
        let mut config = Config::new();

        config.epoch_interruption(self.epoch_interruption);
        config.consume_fuel(self.fuel_enabled);
        config.debug_info(self.debug_info);
        config.strategy(wasmtime::Strategy::Cranelift);

        config
    }
}

/// A compiled scanner module ready for instantiation.
pub struct CompiledScanner {
    /// The compiled Wasmtime module.
    module: Module,
    /// Hash of the original bytes (cache key).
    hash: u64,
    /// Name used in logs and errors.
    name: String,
}

impl CompiledScanner {
    /// Get the underlying Wasmtime module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Get the hash of this module.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Get the name the module was compiled under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether the module exports a function called `name`.
    pub fn exports_func(&self, name: &str) -> bool {
        self.module
            .get_export(name)
            .is_some_and(|ty| ty.func().is_some())
    }
}

impl std::fmt::Debug for CompiledScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScanner")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// Scanner runtime owning the Wasmtime engine and compiled modules.
pub struct ScannerRuntime {
    /// The Wasmtime engine (thread-safe, can be shared).
    engine: Engine,
    /// Configuration for this runtime.
    config: ScannerRuntimeConfig,
    /// Cache of compiled modules by their content hash.
    module_cache: DashMap<u64, Arc<CompiledScanner>>,
}

impl ScannerRuntime {
    /// Create a new runtime with the given configuration.
    pub fn new(config: ScannerRuntimeConfig) -> Result<Self> {
        config.validate()?;
        let engine = Engine::new(&config.to_wasmtime_config()).map_err(|e| BridgeError::Engine {
            cause: e.to_string(),
        })?;

        tracing::debug!(
            fuel = config.fuel_enabled,
            epoch = config.epoch_interruption,
            max_pages = config.max_memory_pages,
            "Scanner runtime created"
        );

        Ok(Self {
            engine,
            config,
            module_cache: DashMap::new(),
        })
    }

    /// Create a new runtime with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ScannerRuntimeConfig::default())
    }

    /// Get the Wasmtime engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &ScannerRuntimeConfig {
        &self.config
    }

    /// Compile a scanner module from bytes (binary or, with wasmtime's
    /// `wat` feature, text).
    ///
    /// If caching is enabled and identical bytes were compiled before, the
    /// cached module is returned.
    pub fn compile(&self, name: &str, wasm_bytes: &[u8]) -> Result<Arc<CompiledScanner>> {
        let hash = hash_bytes(wasm_bytes);

        if self.config.cache_modules {
            if let Some(cached) = self.module_cache.get(&hash) {
                tracing::trace!(module = name, hash, "Module cache hit");
                return Ok(Arc::clone(&cached));
            }
        }

        let module = Module::new(&self.engine, wasm_bytes).map_err(|e| BridgeError::ModuleLoad {
            module: name.to_string(),
            cause: e.to_string(),
        })?;

        let compiled = Arc::new(CompiledScanner {
            module,
            hash,
            name: name.to_string(),
        });

        if self.config.cache_modules {
            self.module_cache.insert(hash, Arc::clone(&compiled));
        }

        tracing::debug!(module = name, hash, size = wasm_bytes.len(), "Module compiled");
        Ok(compiled)
    }

    /// Validate module bytes without compiling them.
    pub fn validate(&self, wasm_bytes: &[u8]) -> Result<()> {
        Module::validate(&self.engine, wasm_bytes).map_err(|e| BridgeError::ModuleLoad {
            module: "validation".to_string(),
            cause: e.to_string(),
        })
    }

    /// Clear the module cache.
    pub fn clear_cache(&self) {
        self.module_cache.clear();
    }

    /// Get the number of cached modules.
    pub fn cache_size(&self) -> usize {
        self.module_cache.len()
    }

    /// Get the fuel granted to each run, if fuel is enabled.
    pub fn initial_fuel(&self) -> Option<u64> {
        if self.config.fuel_enabled {
            Some(self.config.fuel_amount)
        } else {
            None
        }
    }

    /// Get the epoch deadline armed for each run, if interruption is enabled.
    pub fn epoch_deadline(&self) -> Option<u64> {
        if self.config.epoch_interruption {
            Some(self.config.epoch_deadline)
        } else {
            None
        }
    }

    /// Advance the engine's epoch, interrupting runs past their deadline.
    pub fn increment_epoch(&self) {
        self.engine.increment_epoch();
    }
}

/// Compute a hash of bytes (for cache key).
fn hash_bytes(bytes: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_config_default() {
        let config = ScannerRuntimeConfig::default();
        assert_eq!(config.max_memory_pages, DEFAULT_MAX_MEMORY_PAGES);
        assert!(!config.fuel_enabled);
        assert!(!config.epoch_interruption);
        assert!(config.cache_modules);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn runtime_config_testing() {
        let config = ScannerRuntimeConfig::testing();
        assert!(config.fuel_enabled);
        assert!(config.debug_info);
        assert!(!config.cache_modules);
        assert!(config.max_memory_pages >= DEFAULT_PAGES);
    }

    #[test]
    fn runtime_config_validation() {
        let err = ScannerRuntimeConfig::default()
            .with_max_memory_pages(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "E401");

        let err = ScannerRuntimeConfig::production()
            .with_epoch_deadline(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "E401");
    }

    #[test]
    fn runtime_creation() {
        let runtime = ScannerRuntime::with_defaults().expect("Failed to create runtime");
        assert_eq!(runtime.cache_size(), 0);
        assert_eq!(runtime.initial_fuel(), None);
        assert_eq!(runtime.epoch_deadline(), None);
    }

    #[test]
    fn hash_bytes_consistency() {
        let data = b"(module)";
        assert_eq!(hash_bytes(data), hash_bytes(data));
        assert_ne!(hash_bytes(data), hash_bytes(b"(module $other)"));
    }
}
