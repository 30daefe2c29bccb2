//! Host function bindings for scanner guests.
//!
//! Provides the `env` namespace imports a compiled scanner expects:
//!
//! ```text
//! memory                                        // the shared region
//! table                                         // funcref, min = max = 2
//! __memory_base: i32                            // guest stack base
//! __table_base: i32                             // first table slot
//! _memset(s, c, n) -> s                         // bounds-checked fill
//! _memcpy(dst, src, n) -> dst                   // bounds-checked move
//! abort(code)                                   // unwind the current step
//! _token_callback(p, len, line_no, type, special)
//! ```
//!
//! Faults are returned as typed errors so the scanner can downcast them back
//! into [`BridgeError`] once the guest call has unwound.

use crate::memory::SharedRegion;
use lexbridge_core::region::{TABLE_BASE, TABLE_SIZE};
use lexbridge_core::{BridgeError, RawToken, Result};
use thiserror::Error;
use wasmtime::{
    Caller, Engine, Global, GlobalType, Linker, Mutability, Ref, RefType, Store, Table, TableType,
    Val, ValType,
};

/// Namespace every guest import lives in.
pub const IMPORT_MODULE: &str = "env";

/// The guest called `abort`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("guest aborted with code {code}")]
pub struct GuestAbort {
    /// Value passed to `abort`.
    pub code: i32,
}

/// The guest called the token trampoline with no step in progress.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("token emitted outside of an active run")]
pub struct StrayToken;

/// Counters kept across the life of one instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// `_memset` calls that succeeded.
    pub fills: u64,
    /// `_memcpy` calls that succeeded.
    pub copies: u64,
    /// Tokens accepted by the trampoline.
    pub tokens: u64,
}

/// State provided to host functions.
///
/// The region handle is attached once, before instantiation. The token
/// binding is only present while a step call is executing.
#[derive(Debug, Default)]
pub struct HostState {
    region: Option<SharedRegion>,
    binding: Option<Vec<RawToken>>,
    stats: HostStats,
}

impl HostState {
    /// Create empty host state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the shared region.
    pub fn attach(&mut self, region: SharedRegion) {
        self.region = Some(region);
    }

    /// The attached region, if any.
    pub fn region(&self) -> Option<&SharedRegion> {
        self.region.as_ref()
    }

    /// Route trampoline calls into `sink` until [`unbind`](Self::unbind).
    pub fn bind(&mut self, sink: Vec<RawToken>) {
        self.binding = Some(sink);
    }

    /// Drop the binding and return everything collected into it.
    pub fn unbind(&mut self) -> Vec<RawToken> {
        self.binding.take().unwrap_or_default()
    }

    /// Whether the trampoline currently accepts tokens.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Host call counters.
    pub fn stats(&self) -> HostStats {
        self.stats
    }

    fn attached_region(&self) -> wasmtime::Result<SharedRegion> {
        self.region
            .ok_or_else(|| anyhow::anyhow!("no region attached to this store"))
    }

    fn accept(&mut self, token: RawToken) -> std::result::Result<(), StrayToken> {
        let sink = self.binding.as_mut().ok_or(StrayToken)?;
        sink.push(token);
        self.stats.tokens += 1;
        Ok(())
    }
}

fn host_function_error(function: &str, e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Instantiate {
        cause: format!("failed to register host function '{function}': {e}"),
    }
}

/// Register every host function with a Wasmtime linker.
///
/// Store-bound items (memory, table, globals) are added separately by
/// [`define_region`].
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<()> {
    register_region_functions(linker)?;
    register_control_functions(linker)?;
    Ok(())
}

/// Register `_memset` and `_memcpy`.
fn register_region_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // _memset(s: i32, c: i32, n: i32) -> i32
    linker
        .func_wrap(
            IMPORT_MODULE,
            "_memset",
            |mut caller: Caller<'_, HostState>,
             start: i32,
             value: i32,
             count: i32|
             -> wasmtime::Result<i32> {
                let region = caller.data().attached_region()?;
                let at = region.fill(&mut caller, start as u32, value as u8, count as u32)?;
                caller.data_mut().stats.fills += 1;
                Ok(at as i32)
            },
        )
        .map_err(|e| host_function_error("_memset", e))?;

    // _memcpy(dst: i32, src: i32, n: i32) -> i32
    linker
        .func_wrap(
            IMPORT_MODULE,
            "_memcpy",
            |mut caller: Caller<'_, HostState>,
             dst: i32,
             src: i32,
             count: i32|
             -> wasmtime::Result<i32> {
                let region = caller.data().attached_region()?;
                let at = region.copy(&mut caller, dst as u32, src as u32, count as u32)?;
                caller.data_mut().stats.copies += 1;
                Ok(at as i32)
            },
        )
        .map_err(|e| host_function_error("_memcpy", e))?;

    Ok(())
}

/// Register `abort` and the token trampoline.
fn register_control_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // abort(code: i32)
    linker
        .func_wrap(
            IMPORT_MODULE,
            "abort",
            |code: i32| -> wasmtime::Result<()> { Err(GuestAbort { code }.into()) },
        )
        .map_err(|e| host_function_error("abort", e))?;

    // _token_callback(p: i32, len: i32, line_no: i32, type: i32, special: i32)
    linker
        .func_wrap(
            IMPORT_MODULE,
            "_token_callback",
            |mut caller: Caller<'_, HostState>,
             ptr: i32,
             len: i32,
             line_no: i32,
             type_tag: i32,
             special: i32|
             -> wasmtime::Result<()> {
                caller.data_mut().accept(RawToken {
                    ptr: ptr as u32,
                    len: len as u32,
                    line_no: line_no as u32,
                    type_tag,
                    special: special as u32,
                })?;
                Ok(())
            },
        )
        .map_err(|e| host_function_error("_token_callback", e))?;

    Ok(())
}

/// Define the store-bound imports: `memory`, `table`, `__memory_base` and
/// `__table_base`.
pub fn define_region(
    linker: &mut Linker<HostState>,
    store: &mut Store<HostState>,
    region: &SharedRegion,
) -> Result<()> {
    let define_error = |name: &str, e: wasmtime::Error| BridgeError::Instantiate {
        cause: format!("failed to define import '{name}': {e}"),
    };

    let table = Table::new(
        &mut *store,
        TableType::new(RefType::FUNCREF, TABLE_SIZE, Some(TABLE_SIZE)),
        Ref::Func(None),
    )
    .map_err(|e| define_error("table", e))?;

    let const_i32 = GlobalType::new(ValType::I32, Mutability::Const);
    let memory_base = region.layout().memory_base();
    let memory_base = Global::new(&mut *store, const_i32.clone(), Val::I32(memory_base as i32))
        .map_err(|e| define_error("__memory_base", e))?;
    let table_base = Global::new(&mut *store, const_i32, Val::I32(TABLE_BASE as i32))
        .map_err(|e| define_error("__table_base", e))?;

    linker
        .define(&*store, IMPORT_MODULE, "memory", region.memory())
        .map_err(|e| define_error("memory", e))?;
    linker
        .define(&*store, IMPORT_MODULE, "table", table)
        .map_err(|e| define_error("table", e))?;
    linker
        .define(&*store, IMPORT_MODULE, "__memory_base", memory_base)
        .map_err(|e| define_error("__memory_base", e))?;
    linker
        .define(&*store, IMPORT_MODULE, "__table_base", table_base)
        .map_err(|e| define_error("__table_base", e))?;

    Ok(())
}

/// Create a linker with all host functions registered.
pub fn create_linker(engine: &Engine) -> Result<Linker<HostState>> {
    let mut linker = Linker::new(engine);
    register_host_functions(&mut linker)?;
    Ok(linker)
}
