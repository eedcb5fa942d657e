//! Bridge runtime implementation using wasmtime.
//!
//! Uses wasmtime-wasi preview1 so modules built for `wasm32-wasip1` link
//! without extra shims.

use std::path::Path;

use domlink_core::{Document, NodeId, Window};
use wasmtime::*;

use super::config::{BridgeConfig, ExportNames, WasiCapabilities};
use super::host_functions::DomHostFunctions;
use crate::codec::{self, GuestMemory, Region};
use crate::env::HostEnv;
use crate::error::{BridgeError, Result};
use crate::memory::{MemoryView, MemoryViewMut};
use crate::objects::{Handle, ObjectTable};
use crate::relay::{EventRelay, PendingDispatch};
use crate::shims::ShimContext;

/// Guest exports the host side needs while a shim runs.
#[derive(Clone)]
struct GuestExports {
    memory: Memory,
    allocate: TypedFunc<u32, u32>,
}

/// Store data for one session: the host context plus WASI and limits.
pub struct BridgeState {
    env: HostEnv,
    guest: Option<GuestExports>,
    preview1: wasmtime_wasi::preview1::WasiP1Ctx,
    limits: StoreLimits,
}

impl BridgeState {
    fn preview1(&mut self) -> &mut wasmtime_wasi::preview1::WasiP1Ctx {
        &mut self.preview1
    }

    /// The session's host context.
    pub fn env(&self) -> &HostEnv {
        &self.env
    }

    // unset while the module's start function runs
    fn guest(&self) -> Result<&GuestExports> {
        self.guest.as_ref().ok_or_else(|| {
            BridgeError::MissingExport("guest exports not bound before instantiation finished".to_string())
        })
    }
}

/// Turn a failed guest call into a bridge error, keeping the shim's own
/// error when a trap came from one.
fn call_error(export: &str, error: wasmtime::Error) -> BridgeError {
    match error.downcast::<BridgeError>() {
        Ok(error) => error,
        Err(error) => BridgeError::WasmError(format!("call to '{}' failed: {:#}", export, error)),
    }
}

impl GuestMemory for Caller<'_, BridgeState> {
    fn allocate(&mut self, len: u32) -> Result<u32> {
        let allocate = self.data().guest()?.allocate.clone();
        allocate
            .call(&mut *self, len)
            .map_err(|e| call_error("allocate", e))
    }

    fn view(&mut self) -> Result<MemoryView<'_>> {
        let memory = self.data().guest()?.memory;
        Ok(MemoryView::new(memory.data(&*self)))
    }

    fn view_mut(&mut self) -> Result<MemoryViewMut<'_>> {
        let memory = self.data().guest()?.memory;
        Ok(MemoryViewMut::new(memory.data_mut(&mut *self)))
    }
}

impl ShimContext for Caller<'_, BridgeState> {
    fn env(&mut self) -> &mut HostEnv {
        &mut self.data_mut().env
    }
}

/// Compiles modules and starts sessions.
pub struct Bridge {
    engine: Engine,
    config: BridgeConfig,
}

/// A compiled module.
pub struct BridgeModule {
    module: Module,
    name: String,
}

/// A launched module and the document it drives.
pub struct Session {
    store: Store<BridgeState>,
    instance: Instance,
    dispatch: TypedFunc<u32, ()>,
    exports: ExportNames,
    name: String,
}

impl Bridge {
    /// Create a bridge with the given configuration.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let mut engine_config = Config::new();

        engine_config.cranelift_opt_level(match config.optimization_level {
            0 => OptLevel::None,
            1 => OptLevel::Speed,
            _ => OptLevel::SpeedAndSize,
        });

        if config.fuel_limit.is_some() {
            engine_config.consume_fuel(true);
        }

        let engine = Engine::new(&engine_config)
            .map_err(|e| BridgeError::WasmError(format!("engine creation failed: {}", e)))?;

        Ok(Self { engine, config })
    }

    /// Load a module from a `.wasm` or `.wat` file.
    pub fn load_module(&self, path: impl AsRef<Path>) -> Result<BridgeModule> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let module = Module::from_file(&self.engine, path)
            .map_err(|e| BridgeError::WasmError(format!("module load failed: {}", e)))?;

        Ok(BridgeModule { module, name })
    }

    /// Load a module from binary or WAT text.
    pub fn load_module_bytes(&self, name: &str, bytes: &[u8]) -> Result<BridgeModule> {
        let module = Module::new(&self.engine, bytes)
            .map_err(|e| BridgeError::WasmError(format!("module creation failed: {}", e)))?;

        Ok(BridgeModule {
            module,
            name: name.to_string(),
        })
    }

    /// Instantiate `module` against `document` and run its launch export.
    ///
    /// A launch export returning `0` is [`BridgeError::LaunchFailed`]; the
    /// half-started session is dropped.
    pub fn launch(&self, module: &BridgeModule, document: Document, window: Box<dyn Window>) -> Result<Session> {
        let host_state = self.build_host_state(document, window)?;
        let mut store = Store::new(&self.engine, host_state);

        store.limiter(|state| &mut state.limits);

        if let Some(fuel) = self.config.fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| BridgeError::WasmError(format!("fuel setup failed: {}", e)))?;
        }

        let mut linker: Linker<BridgeState> = Linker::new(&self.engine);
        wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state| state.preview1())
            .map_err(|e| BridgeError::WasmError(format!("WASI link failed: {}", e)))?;

        DomHostFunctions::register(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module.module)
            .map_err(|e| BridgeError::WasmError(format!("instantiation failed: {}", e)))?;

        let names = self.config.exports.clone();
        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| BridgeError::MissingExport("memory".to_string()))?;
        let allocate = typed_export::<u32, u32>(&instance, &mut store, &names.allocate)?;
        let launch = typed_export::<(), u32>(&instance, &mut store, &names.launch)?;
        let dispatch = typed_export::<u32, ()>(&instance, &mut store, &names.dispatch)?;
        store.data_mut().guest = Some(GuestExports { memory, allocate });

        let launched = launch
            .call(&mut store, ())
            .map_err(|e| call_error(&names.launch, e))?;
        if launched == 0 {
            tracing::error!(module = %module.name, "launch export reported failure");
            return Err(BridgeError::LaunchFailed);
        }
        tracing::info!(module = %module.name, "session launched");

        Ok(Session {
            store,
            instance,
            dispatch,
            exports: names,
            name: module.name.clone(),
        })
    }

    fn build_host_state(&self, document: Document, window: Box<dyn Window>) -> Result<BridgeState> {
        let preview1 = build_wasi(&self.config.capabilities);

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory)
            .build();

        Ok(BridgeState {
            env: HostEnv::new(document, window, self.config.max_objects),
            guest: None,
            preview1,
            limits,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

fn build_wasi(caps: &WasiCapabilities) -> wasmtime_wasi::preview1::WasiP1Ctx {
    let mut builder = wasmtime_wasi::WasiCtxBuilder::new();

    if caps.stdout {
        builder.inherit_stdout();
    }
    if caps.stderr {
        builder.inherit_stderr();
    }

    for (key, value) in &caps.env_vars {
        builder.env(key, value);
    }

    builder.args(&caps.args);

    builder.build_p1()
}

fn typed_export<P, R>(instance: &Instance, store: &mut Store<BridgeState>, name: &str) -> Result<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(|e| BridgeError::MissingExport(format!("{}: {}", name, e)))
}

fn signature_is(ty: &FuncType, params: usize, results: usize) -> bool {
    ty.params().len() == params
        && ty.results().len() == results
        && ty.params().chain(ty.results()).all(|t| matches!(t, ValType::I32))
}

impl BridgeModule {
    /// Get the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get exported function names.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.module.exports().filter_map(|e| {
            if matches!(e.ty(), ExternType::Func(_)) {
                Some(e.name())
            } else {
                None
            }
        })
    }

    /// Get imported functions as `(module, name)` pairs.
    pub fn imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.module.imports().filter_map(|i| {
            if matches!(i.ty(), ExternType::Func(_)) {
                Some((i.module(), i.name()))
            } else {
                None
            }
        })
    }

    /// Verify the module exports `memory` and the three entry points with
    /// the signatures the bridge calls.
    pub fn check_exports(&self, names: &ExportNames) -> Result<()> {
        let find = |name: &str| self.module.exports().find(|e| e.name() == name).map(|e| e.ty());

        if !matches!(find("memory"), Some(ExternType::Memory(_))) {
            return Err(BridgeError::MissingExport("memory".to_string()));
        }
        // (params, results) for allocate, launch, dispatch
        let signatures = [(1, 1), (0, 1), (1, 0)];
        for (name, (params, results)) in names.iter().zip(signatures) {
            match find(name) {
                Some(ExternType::Func(ty)) if signature_is(&ty, params, results) => {}
                Some(_) => {
                    return Err(BridgeError::MissingExport(format!(
                        "{}: expected {} i32 param(s) and {} i32 result(s)",
                        name, params, results
                    )))
                }
                None => return Err(BridgeError::MissingExport(name.to_string())),
            }
        }
        Ok(())
    }
}

impl GuestMemory for Session {
    fn allocate(&mut self, len: u32) -> Result<u32> {
        let allocate = self.store.data().guest()?.allocate.clone();
        allocate
            .call(&mut self.store, len)
            .map_err(|e| call_error(&self.exports.allocate, e))
    }

    fn view(&mut self) -> Result<MemoryView<'_>> {
        let memory = self.store.data().guest()?.memory;
        Ok(MemoryView::new(memory.data(&self.store)))
    }

    fn view_mut(&mut self) -> Result<MemoryViewMut<'_>> {
        let memory = self.store.data().guest()?.memory;
        Ok(MemoryViewMut::new(memory.data_mut(&mut self.store)))
    }
}

impl Session {
    /// Module name the session was launched from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire `event` on `node` and deliver every matching listener.
    ///
    /// Returns how many dispatches ran. A trap in the module stops the
    /// remaining deliveries and is returned; the session stays usable.
    pub fn dispatch_event(&mut self, node: NodeId, event: &str) -> Result<usize> {
        let pending = {
            let env = &self.store.data().env;
            env.relay.route(&env.document, node, event)
        };
        self.relay(&pending)?;
        Ok(pending.len())
    }

    /// Like [`Session::dispatch_event`], addressing the target by handle.
    /// An unresolvable handle fires nothing.
    pub fn dispatch_event_on(&mut self, handle: Handle, event: &str) -> Result<usize> {
        match self.store.data().env.objects.resolve(handle).copied() {
            Some(node) => self.dispatch_event(node, event),
            None => {
                tracing::warn!(%handle, %event, "dispatch on unresolvable handle");
                Ok(0)
            }
        }
    }

    /// Deliver each record, in order, through the module's dispatch export.
    pub fn relay(&mut self, pending: &[PendingDispatch]) -> Result<()> {
        for dispatch in pending {
            tracing::debug!(
                dispatch_id = dispatch.dispatch_id,
                event = %dispatch.event,
                "relaying event"
            );
            self.dispatch
                .call(&mut self.store, dispatch.dispatch_id)
                .map_err(|e| call_error(&self.exports.dispatch, e))?;
        }
        Ok(())
    }

    /// Copy `text` into module memory and call `export(ptr, len)`.
    ///
    /// Empty text calls nothing and returns `false`.
    pub fn send_text(&mut self, export: &str, text: &str) -> Result<bool> {
        let func = typed_export::<(u32, u32), ()>(&self.instance, &mut self.store, export)?;
        let Some(region) = codec::encode_and_store(self, text)? else {
            tracing::debug!(%export, "nothing to send");
            return Ok(false);
        };
        func.call(&mut self.store, (region.ptr, region.len))
            .map_err(|e| call_error(export, e))?;
        Ok(true)
    }

    /// Call a no-argument export.
    pub fn invoke(&mut self, export: &str) -> Result<()> {
        let func = typed_export::<(), ()>(&self.instance, &mut self.store, export)?;
        func.call(&mut self.store, ()).map_err(|e| call_error(export, e))
    }

    /// Read bytes from module memory.
    pub fn read_memory(&mut self, ptr: u32, len: u32) -> Result<Vec<u8>> {
        codec::read_bytes(self, Region::new(ptr, len))
    }

    /// Write bytes to module memory.
    pub fn write_memory(&mut self, ptr: u32, data: &[u8]) -> Result<()> {
        self.view_mut()?.write_bytes(ptr, data)
    }

    /// Get remaining fuel (if fuel metering enabled).
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }

    /// The document the module drives.
    pub fn document(&self) -> &Document {
        &self.store.data().env.document
    }

    /// Mutable access for the embedder, e.g. to simulate user input.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.store.data_mut().env.document
    }

    /// Handles issued to the module.
    pub fn objects(&self) -> &ObjectTable<NodeId> {
        &self.store.data().env.objects
    }

    /// Listeners the module installed.
    pub fn relay_table(&self) -> &EventRelay {
        &self.store.data().env.relay
    }
}
