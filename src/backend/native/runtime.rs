//! Native runtime lifecycle.
//!
//! `llama_backend_init` is process-global: calling it twice, or freeing it
//! while a model is live, crashes the library. [`NativeRuntime`] owns the one
//! initialisation flag behind a single mutex and hands out [`RuntimeLease`]s:
//!
//! - the first lease initialises the runtime (NUMA disabled)
//! - dropping the last lease frees it
//! - once freed, it is never initialised again in this process
//!
//! [`ModelHandle`] is the scoped guard for a loaded model: it frees the handle
//! exactly once when it leaves scope, whatever the exit path.

use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::llama_ffi::{LlamaError, ModelParams, NativeApi, RawModel};

/// Lifecycle of the process-wide runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// `backend_init` has not been called.
    Uninitialized,
    /// Initialised and held by `leases` live backends.
    Live { leases: usize },
    /// `backend_free` has been called.
    Released,
}

/// Process-wide native runtime shared by every native backend.
pub struct NativeRuntime {
    api: Arc<dyn NativeApi>,
    state: Mutex<RuntimeState>,
}

impl NativeRuntime {
    /// Wrap a native function table. Nothing is initialised until the first
    /// [`NativeRuntime::acquire`].
    pub fn new(api: Arc<dyn NativeApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            state: Mutex::new(RuntimeState::Uninitialized),
        })
    }

    pub fn api(&self) -> &dyn NativeApi {
        self.api.as_ref()
    }

    pub fn state(&self) -> RuntimeState {
        *self.lock_state()
    }

    /// Take a lease on the runtime, initialising it on first use.
    pub fn acquire(self: &Arc<Self>) -> Result<RuntimeLease, LlamaError> {
        let mut state = self.lock_state();
        match *state {
            RuntimeState::Uninitialized => {
                self.api.backend_init(false);
                *state = RuntimeState::Live { leases: 1 };
                info!("Native runtime initialized");
            }
            RuntimeState::Live { leases } => {
                *state = RuntimeState::Live { leases: leases + 1 };
                debug!(leases = leases + 1, "Native runtime lease acquired");
            }
            RuntimeState::Released => return Err(LlamaError::RuntimeReleased),
        }
        Ok(RuntimeLease {
            runtime: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut state = self.lock_state();
        match *state {
            RuntimeState::Live { leases: 1 } => {
                self.api.backend_free();
                *state = RuntimeState::Released;
                info!("Native runtime released");
            }
            RuntimeState::Live { leases } => {
                *state = RuntimeState::Live { leases: leases - 1 };
                debug!(leases = leases - 1, "Native runtime lease dropped");
            }
            other => warn!(state = ?other, "Lease dropped on a runtime that is not live"),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Native runtime lock was poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

/// Proof that the native runtime is initialised. Dropping the last one frees it.
pub struct RuntimeLease {
    runtime: Arc<NativeRuntime>,
}

impl RuntimeLease {
    /// Load a model under this lease. The returned guard frees it on drop.
    pub fn load_model(
        &self,
        path: &CStr,
        params: ModelParams,
    ) -> Result<ModelHandle<'_>, LlamaError> {
        let api = self.runtime.api();
        let raw = api.load_model(path, params).ok_or_else(|| {
            LlamaError::ModelLoadFailed(format!(
                "library returned no model for {}",
                path.to_string_lossy()
            ))
        })?;
        debug!(model = %path.to_string_lossy(), "Model loaded");
        Ok(ModelHandle { api, raw })
    }
}

impl Drop for RuntimeLease {
    fn drop(&mut self) {
        self.runtime.release();
    }
}

/// A loaded model, freed when the guard goes out of scope.
///
/// Borrows the lease it was loaded under, so the runtime cannot be released
/// while the model is live.
pub struct ModelHandle<'a> {
    api: &'a dyn NativeApi,
    raw: RawModel,
}

impl ModelHandle<'_> {
    pub fn generate(
        &self,
        prompt: &CStr,
        max_tokens: i32,
        temperature: f32,
    ) -> Result<String, LlamaError> {
        // SAFETY: `raw` came from `load_model` on the same table and is only
        // freed in `drop`.
        unsafe { self.api.generate(self.raw, prompt, max_tokens, temperature) }
    }
}

impl Drop for ModelHandle<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle is live and this is the only place it is freed.
        unsafe { self.api.free_model(self.raw) };
        debug!("Model handle freed");
    }
}

/// The runtime shared by every native backend built from the real library.
static PROCESS_RUNTIME: Mutex<Option<Arc<NativeRuntime>>> = Mutex::new(None);

/// Return the process-wide runtime, creating it with `open` on first use.
///
/// `open` runs at most once per process, under the same lock that guards the
/// slot, so concurrent callers never open the library twice.
pub fn process_runtime<F>(open: F) -> Result<Arc<NativeRuntime>, LlamaError>
where
    F: FnOnce() -> Result<Arc<dyn NativeApi>, LlamaError>,
{
    let mut slot = PROCESS_RUNTIME
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(runtime) = slot.as_ref() {
        return Ok(Arc::clone(runtime));
    }
    let runtime = NativeRuntime::new(open()?);
    *slot = Some(Arc::clone(&runtime));
    Ok(runtime)
}
