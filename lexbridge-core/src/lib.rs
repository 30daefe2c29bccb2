//! lexbridge core library.
//!
//! Foundation types for running a compiled token scanner against a shared
//! memory region: the region layout and its bounds-checked primitives, the
//! token records a run produces, the [`Scanner`] capability, and the
//! [`Bridge`] run loop that drives any scanner to completion.
//!
//! # Key Components
//!
//! - **Region**: fixed-capacity buffer with a staging window for input
//! - **Scanner**: opaque setup/step/emit capability
//! - **Bridge**: stages input, steps the scanner, forwards tokens
//! - **TokenStream**: the same run, one step per `next()`
//!
//! # Example
//!
//! ```
//! use lexbridge_core::testing::WordScanner;
//! use lexbridge_core::{Bridge, BridgeConfig};
//!
//! let config = BridgeConfig::testing();
//! let scanner = WordScanner::new(config.layout()?);
//! let mut bridge = Bridge::new(scanner, config)?;
//!
//! let mut words = Vec::new();
//! bridge.run_bytes(b"let x = 1;", |token| {
//!     words.push(token.as_str().unwrap_or_default().to_string());
//! })?;
//! assert_eq!(words, ["let", "x", "=", "1", ";"]);
//! # Ok::<(), lexbridge_core::BridgeError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod region;
pub mod scanner;
pub mod status;
pub mod testing;
pub mod token;

pub use bridge::{Bridge, RunSummary, SharedBridge, TokenStream};
pub use config::{BridgeConfig, DeliveryMode, EntryPoints};
pub use error::{BridgeError, Result};
pub use region::{RegionFault, RegionLayout, RegionOp};
pub use scanner::{RawToken, Scanner};
pub use status::{ScannerCode, StepStatus};
pub use token::{OwnedToken, Token, TokenKind, TokenRecord};
