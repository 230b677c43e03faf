//! Shared error types across Vigil crates.

use thiserror::Error;

use crate::id::{ExtensionId, ModuleId};

/// Stable, host-facing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Owning module missing or exposes no code unit.
    InvalidModule,
    /// Target type or method could not be resolved.
    NotFound,
    /// Resolved method does not fit the extension kind.
    SignatureMismatch,
    /// Extension invoked before a successful Setup.
    NotBound,
    /// The extension itself failed.
    CallableFailed,
    /// Operation refused by policy.
    Denied,
    /// Invalid configuration or request.
    BadRequest,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal engine failure.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and host messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidModule => "INVALID_MODULE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::SignatureMismatch => "SIGNATURE_MISMATCH",
            ErrorCode::NotBound => "NOT_BOUND",
            ErrorCode::CallableFailed => "CALLABLE_FAILED",
            ErrorCode::Denied => "DENIED",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Failure of one Setup attempt, one variant per resolution stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("invalid module {module}: {detail}")]
    InvalidModule { module: ModuleId, detail: String },
    #[error("type {type_name} not found in module {module}")]
    TypeNotFound { module: ModuleId, type_name: String },
    #[error("method {method_name} not found on type {type_name}")]
    MethodNotFound {
        type_name: String,
        method_name: String,
    },
    #[error("signature mismatch for {method_name}: {detail}")]
    SignatureMismatch { method_name: String, detail: String },
    #[error("internal bind failure: {0}")]
    Internal(String),
}

impl BindError {
    /// Name of the resolution stage that failed (metrics label).
    pub fn stage(&self) -> &'static str {
        match self {
            BindError::InvalidModule { .. } => "module",
            BindError::TypeNotFound { .. } => "type",
            BindError::MethodNotFound { .. } => "method",
            BindError::SignatureMismatch { .. } => "signature",
            BindError::Internal(_) => "internal",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BindError::InvalidModule { .. } => ErrorCode::InvalidModule,
            BindError::TypeNotFound { .. } | BindError::MethodNotFound { .. } => {
                ErrorCode::NotFound
            }
            BindError::SignatureMismatch { .. } => ErrorCode::SignatureMismatch,
            BindError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Failure of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// Invoked before Setup succeeded (or after the owning module unloaded).
    #[error("extension is not bound")]
    NotBound,
    #[error("callable failed: {0}")]
    CallableFailed(String),
}

impl ExecError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExecError::NotBound => ErrorCode::NotBound,
            ExecError::CallableFailed(_) => ErrorCode::CallableFailed,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Unified error type used by core, engine and extension callables.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("extension {extension} failed to bind: {source}")]
    Bind {
        extension: ExtensionId,
        #[source]
        source: BindError,
    },
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("denied: {0}")]
    Denied(String),
    #[error("unknown extension: {0}")]
    UnknownExtension(ExtensionId),
    #[error("unknown module: {0}")]
    UnknownModule(ModuleId),
    #[error("module already loaded: {0}")]
    DuplicateModule(ModuleId),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl VigilError {
    /// Map to a stable host-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            VigilError::BadRequest(_) => ErrorCode::BadRequest,
            VigilError::Bind { source, .. } => source.code(),
            VigilError::Exec(e) => e.code(),
            VigilError::Denied(_) => ErrorCode::Denied,
            VigilError::UnknownExtension(_) | VigilError::UnknownModule(_) => ErrorCode::NotFound,
            VigilError::DuplicateModule(_) => ErrorCode::BadRequest,
            VigilError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            VigilError::Internal(_) => ErrorCode::Internal,
        }
    }
}
