//! Scanner implementation backed by a WebAssembly guest.
//!
//! Wraps one guest instance and its store. The bridge drives it through the
//! [`Scanner`] trait; this module only translates those calls into guest
//! calls and guest failures back into [`BridgeError`].

use crate::host::{GuestAbort, HostState, StrayToken, create_linker, define_region};
use crate::memory::SharedRegion;
use crate::runtime::{CompiledScanner, ScannerRuntime};
use lexbridge_core::region::RegionFault;
use lexbridge_core::{BridgeConfig, BridgeError, RawToken, Result, Scanner};
use wasmtime::{Instance, Store, Trap, TypedFunc};

/// A compiled scanner instantiated against its own shared region.
pub struct WasmScanner {
    store: Store<HostState>,
    region: SharedRegion,
    setup_fn: TypedFunc<i32, ()>,
    step_fn: TypedFunc<(), i32>,
    fuel: Option<u64>,
    epoch_deadline: Option<u64>,
    name: String,
}

impl WasmScanner {
    /// Instantiate `module` with a fresh region sized by `config`.
    ///
    /// Resolves the setup and step exports and runs the optional
    /// post-instantiation hook once.
    pub fn instantiate(
        runtime: &ScannerRuntime,
        module: &CompiledScanner,
        config: &BridgeConfig,
    ) -> Result<Self> {
        let layout = config.layout()?;
        let max_pages = runtime.config().max_memory_pages;
        if layout.pages() > max_pages {
            return Err(BridgeError::InvalidConfig {
                cause: format!(
                    "region of {} pages exceeds the runtime limit of {max_pages}",
                    layout.pages()
                ),
            });
        }

        let mut store = Store::new(runtime.engine(), HostState::new());
        arm(&mut store, runtime.initial_fuel(), runtime.epoch_deadline())?;

        let region = SharedRegion::new(&mut store, layout)?;
        store.data_mut().attach(region);

        let mut linker = create_linker(runtime.engine())?;
        define_region(&mut linker, &mut store, &region)?;

        let instance = linker
            .instantiate(&mut store, module.module())
            .map_err(|e| BridgeError::Instantiate {
                cause: format!("{e:#}"),
            })?;

        let entry_points = &config.entry_points;
        let setup_fn = typed_export::<i32, ()>(&instance, &mut store, &entry_points.setup)?;
        let step_fn = typed_export::<(), i32>(&instance, &mut store, &entry_points.step)?;

        if let Some(hook) = instance.get_func(&mut store, &entry_points.post_instantiate) {
            let hook = hook
                .typed::<(), ()>(&store)
                .map_err(|e| BridgeError::MissingExport {
                    name: entry_points.post_instantiate.clone(),
                    cause: e.to_string(),
                })?;
            hook.call(&mut store, ()).map_err(classify)?;
            tracing::debug!(module = module.name(), "Post-instantiate hook ran");
        }

        tracing::info!(
            module = module.name(),
            pages = layout.pages(),
            staging_start = layout.staging_start(),
            "Scanner instantiated"
        );

        Ok(Self {
            store,
            region,
            setup_fn,
            step_fn,
            fuel: runtime.initial_fuel(),
            epoch_deadline: runtime.epoch_deadline(),
            name: module.name().to_string(),
        })
    }

    /// Name of the module this instance was created from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared region.
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Host state of the underlying store.
    pub fn host(&self) -> &HostState {
        self.store.data()
    }

    /// Fuel left in the current run, if fuel is enabled.
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.fuel.and_then(|_| self.store.get_fuel().ok())
    }
}

impl Scanner for WasmScanner {
    fn memory(&self) -> &[u8] {
        self.region.data(&self.store)
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.region.data_mut(&mut self.store)
    }

    fn setup(&mut self, start: u32) -> Result<()> {
        arm(&mut self.store, self.fuel, self.epoch_deadline)?;
        self.setup_fn
            .call(&mut self.store, start as i32)
            .map_err(classify)
    }

    fn step(&mut self, emit: &mut Vec<RawToken>) -> Result<i32> {
        self.store.data_mut().bind(std::mem::take(emit));
        let result = self.step_fn.call(&mut self.store, ());
        *emit = self.store.data_mut().unbind();
        result.map_err(classify)
    }
}

impl std::fmt::Debug for WasmScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmScanner")
            .field("name", &self.name)
            .field("layout", self.region.layout())
            .field("fuel", &self.fuel)
            .field("epoch_deadline", &self.epoch_deadline)
            .finish_non_exhaustive()
    }
}

/// Refill fuel and re-arm the epoch deadline for the next run.
fn arm(store: &mut Store<HostState>, fuel: Option<u64>, epoch_deadline: Option<u64>) -> Result<()> {
    if let Some(fuel) = fuel {
        store.set_fuel(fuel).map_err(|e| BridgeError::Engine {
            cause: format!("failed to set fuel: {e}"),
        })?;
    }
    if let Some(ticks) = epoch_deadline {
        store.set_epoch_deadline(ticks);
    }
    Ok(())
}

fn typed_export<Params, Results>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &str,
) -> Result<TypedFunc<Params, Results>>
where
    Params: wasmtime::WasmParams,
    Results: wasmtime::WasmResults,
{
    instance
        .get_typed_func::<Params, Results>(&mut *store, name)
        .map_err(|e| BridgeError::MissingExport {
            name: name.to_string(),
            cause: e.to_string(),
        })
}

/// Map an error raised by a guest call back into a [`BridgeError`].
fn classify(err: wasmtime::Error) -> BridgeError {
    let mapped = if let Some(abort) = err.downcast_ref::<GuestAbort>() {
        BridgeError::GuestFault { code: abort.code }
    } else if let Some(fault) = err.downcast_ref::<RegionFault>() {
        BridgeError::from(*fault)
    } else if err.downcast_ref::<StrayToken>().is_some() {
        BridgeError::StrayToken
    } else {
        match err.downcast_ref::<Trap>() {
            Some(Trap::OutOfFuel) => BridgeError::FuelExhausted,
            Some(Trap::Interrupt) => BridgeError::Interrupted,
            _ => BridgeError::Trap {
                cause: format!("{err:#}"),
            },
        }
    };

    if mapped.is_guest_fault() {
        tracing::warn!(code = mapped.code(), error = %mapped, "Guest fault");
    }
    mapped
}
