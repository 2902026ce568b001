//! RPC Error Types
//!
//! Maps application errors to stable JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use vsl_core::domain::DomainError;
use vsl_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SYSTEM_ERROR: i32 = 5002;
}

/// Numeric code for an application error
pub fn error_code(err: &AppError) -> i32 {
    match err {
        AppError::Validation(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::LaunchAlreadyInProgress(_) => code::CONFLICT,
        AppError::Launch(_) => code::SYSTEM_ERROR,
        AppError::Internal(_) => code::INTERNAL_ERROR,
        AppError::Domain(e) => match e {
            DomainError::TaskNotFound(_) => code::NOT_FOUND,
            DomainError::TaskStillRunning(_) => code::CONFLICT,
        },
    }
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(error_code(&err), err.to_string(), None::<()>)
}
