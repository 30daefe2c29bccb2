//! lexbridge Wasmtime host.
//!
//! Runs compiled token scanners as WebAssembly guests. The host creates the
//! shared region, supplies the `env` imports the guest links against, and
//! exposes the instance as a [`Scanner`](lexbridge_core::Scanner) so the
//! core [`Bridge`] can drive it.
//!
//! # Guest ABI
//!
//! Guests must export:
//!
//! ```text
//! _xx_setup(start: i32)        // reset for input at `start`
//! _xx_run() -> i32             // one step: > 0 continue, 0 done, < 0 error
//! __post_instantiate()         // optional, called once
//! ```
//!
//! and may import from `env`: `memory`, `table`, `__memory_base`,
//! `__table_base`, `_memset`, `_memcpy`, `abort` and `_token_callback`.
//! See [`host`] for signatures.
//!
//! # Example
//!
//! ```ignore
//! use lexbridge_core::BridgeConfig;
//! use lexbridge_host::{ScannerRuntime, ScannerRuntimeConfig};
//!
//! let runtime = ScannerRuntime::new(ScannerRuntimeConfig::default())?;
//! let module = runtime.compile("scanner", &wasm_bytes)?;
//! let mut bridge = lexbridge_host::instantiate(&runtime, &module, BridgeConfig::default())?;
//!
//! bridge.run_bytes(b"let x = 1;", |token| {
//!     println!("{}:{} {:?}", token.line_no(), token.offset(), token.as_str());
//! })?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod host;
pub mod memory;
pub mod observability;
pub mod runtime;
pub mod scanner;

pub use host::{GuestAbort, HostState, HostStats, StrayToken, create_linker};
pub use memory::SharedRegion;
pub use runtime::{CompiledScanner, ScannerRuntime, ScannerRuntimeConfig};
pub use scanner::WasmScanner;

use lexbridge_core::{Bridge, BridgeConfig, Result};
use std::future::IntoFuture;
use std::sync::Arc;

/// Instantiate `module` and wrap it in a ready bridge.
pub fn instantiate(
    runtime: &ScannerRuntime,
    module: &CompiledScanner,
    config: BridgeConfig,
) -> Result<Bridge<WasmScanner>> {
    let scanner = WasmScanner::instantiate(runtime, module, &config)?;
    Bridge::new(scanner, config)
}

/// Wait for a compiled module, then instantiate it.
///
/// `module` is typically a compilation running elsewhere (a blocking task or
/// a module fetched and compiled on demand). The bridge is ready to run as
/// soon as this resolves.
pub async fn build<M>(
    runtime: &ScannerRuntime,
    module: M,
    config: BridgeConfig,
) -> Result<Bridge<WasmScanner>>
where
    M: IntoFuture<Output = Result<Arc<CompiledScanner>>>,
{
    let module = module.await?;
    instantiate(runtime, &module, config)
}
