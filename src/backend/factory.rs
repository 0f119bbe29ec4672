//! Backend factory.
//!
//! The only place a [`BackendKind`] and a configuration string are turned into
//! a [`Backend`]. Every check runs before an HTTP client is built or the
//! native library is opened.

use std::path::Path;

use tracing::info;

use crate::backend::native::{self, NativeBackend};
use crate::backend::remote::RemoteBackend;
use crate::backend::{Backend, BackendError, BackendKind};

/// Prefix every remote API key must carry.
pub const CREDENTIAL_SCHEME: &str = "sk-";

/// Check `config` for `kind` without touching the network or native code.
///
/// Same `(kind, config)` and the same filesystem give the same answer.
pub fn validate(kind: BackendKind, config: &str) -> Result<(), BackendError> {
    if config.is_empty() {
        return Err(BackendError::Configuration(
            "configuration cannot be empty".to_string(),
        ));
    }

    match kind {
        BackendKind::Remote => {
            if !config.starts_with(CREDENTIAL_SCHEME) {
                return Err(BackendError::Configuration(
                    "invalid credential format".to_string(),
                ));
            }
            Ok(())
        }
        BackendKind::Native => {
            native::check_model_path(Path::new(config))?;
            native::locate_library()?;
            Ok(())
        }
    }
}

/// Validate `config` and build the matching backend.
pub fn create(kind: BackendKind, config: &str) -> Result<Backend, BackendError> {
    validate(kind, config)?;

    let backend = match kind {
        BackendKind::Remote => Backend::Remote(RemoteBackend::new(config)?),
        BackendKind::Native => Backend::Native(NativeBackend::new(config)?),
    };

    info!(kind = %kind, "Backend created");
    Ok(backend)
}
