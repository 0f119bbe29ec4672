//! FFI bindings to the llama.cpp generation shim.
//!
//! The shared library is opened at runtime with `libloading`; every symbol in
//! the table below is resolved up front so a broken install fails before any
//! native call is made.
//!
//! | symbol                       | signature                                              |
//! |------------------------------|--------------------------------------------------------|
//! | `llama_backend_init`         | `void (bool numa)`                                     |
//! | `llama_backend_free`         | `void (void)`                                          |
//! | `llama_load_model_from_file` | `void* (const char* path, ModelParams params)`         |
//! | `llama_free_model`           | `void (void* model)`                                   |
//! | `llama_generate`             | `const char* (void* model, const char*, int32, float)` |
//!
//! The buffer returned by `llama_generate` is owned by the library and stays
//! valid until the next call on the same model, so it is copied immediately.

use std::ffi::{c_char, c_void, CStr};
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LlamaError {
    #[error("Failed to open native library {path}: {source}")]
    LibraryOpen {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Native library is missing symbol `{symbol}`: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("Failed to load model: {0}")]
    ModelLoadFailed(String),

    #[error("Generation failed: {0}")]
    GenerateFailed(String),

    #[error("Native runtime was already released in this process")]
    RuntimeReleased,
}

/// Model parameters passed by value to `llama_load_model_from_file`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    /// Number of layers to offload to the GPU (0 = CPU only).
    pub n_gpu_layers: i32,

    /// Use memory mapping for the model file.
    pub use_mmap: bool,

    /// Use memory locking.
    pub use_mlock: bool,

    /// Context size in tokens.
    pub n_ctx: u32,

    /// Batch size for prompt processing.
    pub n_batch: u32,

    /// Threads used for generation.
    pub n_threads: u32,

    /// Threads used for batch (prompt) processing.
    pub n_threads_batch: u32,

    /// RNG seed (`u32::MAX` lets the library pick one).
    pub seed: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        let threads = num_cpus::get().max(1) as u32;
        Self {
            n_gpu_layers: 0,
            use_mmap: true,
            use_mlock: false,
            n_ctx: 4096,
            n_batch: 512,
            n_threads: threads,
            n_threads_batch: threads,
            seed: u32::MAX,
        }
    }
}

/// Non-null model handle returned by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawModel(NonNull<c_void>);

impl RawModel {
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// The native function table.
///
/// [`LlamaLibrary`] is the real implementation; anything else implementing
/// this trait (a test double, a statically linked build) can drive the same
/// runtime and backend code.
pub trait NativeApi: Send + Sync {
    fn backend_init(&self, numa: bool);

    fn backend_free(&self);

    /// Returns `None` when the library reports a null model.
    fn load_model(&self, path: &CStr, params: ModelParams) -> Option<RawModel>;

    /// # Safety
    /// `model` must come from [`NativeApi::load_model`] on this table and must
    /// not have been freed already.
    unsafe fn free_model(&self, model: RawModel);

    /// # Safety
    /// `model` must be a live handle from [`NativeApi::load_model`].
    unsafe fn generate(
        &self,
        model: RawModel,
        prompt: &CStr,
        max_tokens: i32,
        temperature: f32,
    ) -> Result<String, LlamaError>;
}

type BackendInitFn = unsafe extern "C" fn(bool);
type BackendFreeFn = unsafe extern "C" fn();
type LoadModelFn = unsafe extern "C" fn(*const c_char, ModelParams) -> *mut c_void;
type FreeModelFn = unsafe extern "C" fn(*mut c_void);
type GenerateFn = unsafe extern "C" fn(*mut c_void, *const c_char, i32, f32) -> *const c_char;

/// A dynamically loaded llama.cpp shim.
pub struct LlamaLibrary {
    path: PathBuf,
    backend_init: BackendInitFn,
    backend_free: BackendFreeFn,
    load_model: LoadModelFn,
    free_model: FreeModelFn,
    generate: GenerateFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl LlamaLibrary {
    /// Open the shared library at `path` and resolve the full function table.
    pub fn open(path: &Path) -> Result<Self, LlamaError> {
        // SAFETY: loading runs the library's initialisers; the library is a
        // llama.cpp build the user placed in the expected directory.
        let library = unsafe { Library::new(path) }.map_err(|source| LlamaError::LibraryOpen {
            path: path.to_path_buf(),
            source,
        })?;

        // SAFETY: each type alias matches the C signature documented above.
        let lib = unsafe {
            Self {
                path: path.to_path_buf(),
                backend_init: resolve(&library, "llama_backend_init")?,
                backend_free: resolve(&library, "llama_backend_free")?,
                load_model: resolve(&library, "llama_load_model_from_file")?,
                free_model: resolve(&library, "llama_free_model")?,
                generate: resolve(&library, "llama_generate")?,
                _library: library,
            }
        };

        debug!(path = %path.display(), "Resolved native function table");
        Ok(lib)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Look up `symbol` and copy out the function pointer.
///
/// # Safety
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, LlamaError> {
    library
        .get::<T>(symbol.as_bytes())
        .map(|sym| *sym)
        .map_err(|source| LlamaError::MissingSymbol { symbol, source })
}

impl fmt::Debug for LlamaLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlamaLibrary").field("path", &self.path).finish()
    }
}

impl NativeApi for LlamaLibrary {
    fn backend_init(&self, numa: bool) {
        // SAFETY: resolved from the library held in `self`.
        unsafe { (self.backend_init)(numa) }
    }

    fn backend_free(&self) {
        // SAFETY: resolved from the library held in `self`.
        unsafe { (self.backend_free)() }
    }

    fn load_model(&self, path: &CStr, params: ModelParams) -> Option<RawModel> {
        // SAFETY: `path` is NUL-terminated and outlives the call; `params` is
        // passed by value and not retained.
        let ptr = unsafe { (self.load_model)(path.as_ptr(), params) };
        RawModel::new(ptr)
    }

    unsafe fn free_model(&self, model: RawModel) {
        (self.free_model)(model.as_ptr())
    }

    unsafe fn generate(
        &self,
        model: RawModel,
        prompt: &CStr,
        max_tokens: i32,
        temperature: f32,
    ) -> Result<String, LlamaError> {
        let out = (self.generate)(model.as_ptr(), prompt.as_ptr(), max_tokens, temperature);
        if out.is_null() {
            return Err(LlamaError::GenerateFailed(
                "llama_generate returned null".to_string(),
            ));
        }
        CStr::from_ptr(out)
            .to_str()
            .map(str::to_owned)
            .map_err(|e| LlamaError::GenerateFailed(format!("output is not valid UTF-8: {e}")))
    }
}
