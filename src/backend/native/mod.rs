//! Local llama.cpp backend.
//!
//! - [`llama_ffi`]: native function table and dynamic library loading
//! - [`runtime`]: process-wide runtime state and scoped model handles
//!
//! Every filesystem check runs before the first native call. Each `generate`
//! loads the model, runs one generation and frees the model before returning.

pub mod llama_ffi;
pub mod runtime;

use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{BackendError, SYSTEM_PROMPT};
use llama_ffi::{LlamaLibrary, ModelParams, NativeApi};
use runtime::{process_runtime, NativeRuntime, RuntimeLease};

/// Maximum tokens produced per call.
pub const MAX_TOKENS: i32 = 2048;

/// Sampling temperature.
pub const TEMPERATURE: f32 = 0.7;

/// Library directory, relative to the user's home directory.
pub const LIBRARY_DIR: [&str; 2] = [".llama", "lib"];

/// The invoking user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// `~/.llama/lib` for the given home directory.
pub fn library_dir_in(home: &Path) -> PathBuf {
    LIBRARY_DIR.iter().fold(home.to_path_buf(), |p, c| p.join(c))
}

/// Platform file name of the shared library (`libllama.so`, `libllama.dylib`, `llama.dll`).
pub fn library_file_name() -> String {
    libloading::library_filename("llama")
        .to_string_lossy()
        .into_owned()
}

/// Resolve and check the shared library inside `dir`.
pub fn locate_library_in(dir: &Path) -> Result<PathBuf, BackendError> {
    if !dir.is_dir() {
        return Err(BackendError::Configuration(format!(
            "native library directory not found at {}. Build llama.cpp and place {} in this directory.",
            dir.display(),
            library_file_name()
        )));
    }

    if let Err(e) = std::fs::read_dir(dir) {
        return Err(BackendError::Configuration(format!(
            "native library directory is not readable: {} ({e})",
            dir.display()
        )));
    }

    let path = dir.join(library_file_name());
    if !path.is_file() {
        return Err(BackendError::Configuration(format!(
            "native library {} not found in {}. Build llama.cpp and install the shared library there.",
            library_file_name(),
            dir.display()
        )));
    }
    ensure_readable(&path, "native library")?;
    Ok(path)
}

/// Resolve the shared library under the invoking user's home directory.
pub fn locate_library() -> Result<PathBuf, BackendError> {
    let home = home_dir().ok_or_else(|| {
        BackendError::Configuration(
            "cannot locate the native library: home directory is not set".to_string(),
        )
    })?;
    locate_library_in(&library_dir_in(&home))
}

/// Check that `path` names an existing, readable model file.
pub fn check_model_path(path: &Path) -> Result<(), BackendError> {
    if !path.exists() {
        return Err(BackendError::Configuration(format!(
            "model file not found: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(BackendError::Configuration(format!(
            "model path is not a file: {}",
            path.display()
        )));
    }
    ensure_readable(path, "model file")
}

fn ensure_readable(path: &Path, what: &str) -> Result<(), BackendError> {
    File::open(path).map(drop).map_err(|e| {
        BackendError::Configuration(format!("{what} is not readable: {} ({e})", path.display()))
    })
}

/// Text generation through a locally loaded llama.cpp library.
pub struct NativeBackend {
    model_path: PathBuf,
    model_cpath: CString,
    params: ModelParams,
    // Last field: dropping it may free the process runtime.
    lease: RuntimeLease,
}

impl NativeBackend {
    /// Validate the install and the model path, then attach to the
    /// process-wide runtime built from `~/.llama/lib`.
    pub fn new(model_path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let model_path = model_path.into();
        let library_path = locate_library()?;
        check_model_path(&model_path)?;

        let runtime = process_runtime(|| {
            let library = LlamaLibrary::open(&library_path)?;
            info!(library = %library.path().display(), "Native library loaded");
            Ok(Arc::new(library) as Arc<dyn NativeApi>)
        })
        .map_err(|e| BackendError::generation("native initialization failed", e))?;

        Self::with_runtime(model_path, runtime)
    }

    /// Attach to an explicit runtime instead of the process-wide one.
    pub fn with_runtime(
        model_path: impl Into<PathBuf>,
        runtime: Arc<NativeRuntime>,
    ) -> Result<Self, BackendError> {
        let model_path = model_path.into();
        check_model_path(&model_path)?;

        let model_cpath = path_to_cstring(&model_path)?;
        let lease = runtime
            .acquire()
            .map_err(|e| BackendError::generation("native initialization failed", e))?;

        info!(model = %model_path.display(), "Native backend ready");
        Ok(Self {
            model_path,
            model_cpath,
            params: ModelParams::default(),
            lease,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Load the model, generate, free the model. Blocks the calling thread.
    pub fn generate_blocking(&self, prompt: &str) -> Result<String, BackendError> {
        if prompt.trim().is_empty() {
            return Err(BackendError::Configuration(
                "prompt cannot be empty".to_string(),
            ));
        }

        let request_id = Uuid::new_v4();
        let full_prompt = CString::new(format!("{SYSTEM_PROMPT}\n\n{prompt}"))
            .map_err(|e| BackendError::generation("prompt contains a NUL byte", e))?;

        debug!(
            %request_id,
            n_ctx = self.params.n_ctx,
            n_threads = self.params.n_threads,
            "Loading model"
        );
        let model = self
            .lease
            .load_model(&self.model_cpath, self.params)
            .map_err(|e| BackendError::generation("failed to load model", e))?;

        let text = model
            .generate(&full_prompt, MAX_TOKENS, TEMPERATURE)
            .map_err(|e| BackendError::generation("native generation failed", e))?;

        info!(%request_id, chars = text.len(), "Native generation complete");
        Ok(text)
    }
}

/// The model path as the loader sees it. On unix the raw bytes pass through
/// unchanged, so non-UTF-8 names reach the library intact.
#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Result<CString, BackendError> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| nul_in_path(path))
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Result<CString, BackendError> {
    let utf8 = path.to_str().ok_or_else(|| {
        BackendError::Configuration(format!(
            "model path is not valid Unicode: {}",
            path.display()
        ))
    })?;
    CString::new(utf8).map_err(|_| nul_in_path(path))
}

fn nul_in_path(path: &Path) -> BackendError {
    BackendError::Configuration(format!(
        "model path contains a NUL byte: {}",
        path.display()
    ))
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("model_path", &self.model_path)
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_library_dir_convention() {
        let dir = library_dir_in(Path::new("/home/alice"));
        assert_eq!(dir, Path::new("/home/alice/.llama/lib"));
    }

    #[test]
    fn test_locate_library_missing_dir() {
        let home = tempdir().unwrap();
        let dir = library_dir_in(home.path());
        let err = locate_library_in(&dir).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, BackendError::Configuration(_)));
        assert!(msg.contains("not found"));
        assert!(msg.contains(&dir.display().to_string()));
        assert!(msg.contains("Build llama.cpp"));
    }

    #[test]
    fn test_locate_library_missing_file() {
        let home = tempdir().unwrap();
        let dir = library_dir_in(home.path());
        std::fs::create_dir_all(&dir).unwrap();

        let err = locate_library_in(&dir).unwrap_err();
        assert!(err.to_string().contains(&library_file_name()));
    }

    #[test]
    fn test_locate_library_found() {
        let home = tempdir().unwrap();
        let dir = library_dir_in(home.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(library_file_name()), b"").unwrap();

        let path = locate_library_in(&dir).unwrap();
        assert_eq!(path, dir.join(library_file_name()));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_library_unreadable_dir() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempdir().unwrap();
        let dir = library_dir_in(home.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(library_file_name()), b"").unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o300)).unwrap();

        // Privileged users can list the directory regardless of its mode.
        let listable = std::fs::read_dir(&dir).is_ok();
        let result = locate_library_in(&dir);
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        if listable {
            assert!(result.is_ok());
        } else {
            let err = result.unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("not readable"));
            assert!(err.to_string().contains(&dir.display().to_string()));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_model_cpath_keeps_raw_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/models/model\xff.gguf"));
        let cpath = path_to_cstring(path).unwrap();
        assert_eq!(cpath.as_bytes(), b"/models/model\xff.gguf");

        let err = path_to_cstring(Path::new(OsStr::from_bytes(b"/models/a\0b"))).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_check_model_path() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("model.gguf");

        let err = check_model_path(&model).unwrap_err();
        assert!(err.to_string().contains("not found"));

        std::fs::write(&model, b"GGUF").unwrap();
        assert!(check_model_path(&model).is_ok());

        let err = check_model_path(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }
}
