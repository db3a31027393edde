//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use veriscan_domain::VeriScanError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub VeriScanError);

impl From<InfraError> for VeriScanError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<VeriScanError> for InfraError {
    fn from(value: VeriScanError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoVeriScanError {
    fn into_veriscan(self) -> VeriScanError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → VeriScanError */
/* -------------------------------------------------------------------------- */

impl IntoVeriScanError for SqlError {
    fn into_veriscan(self) -> VeriScanError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        VeriScanError::Storage("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        VeriScanError::Storage("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        VeriScanError::Storage("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        VeriScanError::Storage("foreign key constraint violation".into())
                    }
                    _ => VeriScanError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => VeriScanError::Storage("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                VeriScanError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                VeriScanError::Storage(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                VeriScanError::Storage("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                VeriScanError::Storage(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => {
                VeriScanError::Storage(format!("invalid database path: {}", path.to_string_lossy()))
            }
            RE::InvalidQuery => VeriScanError::Storage("invalid SQL query".into()),
            other => VeriScanError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_veriscan())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → VeriScanError */
/* -------------------------------------------------------------------------- */

impl IntoVeriScanError for PoolError {
    fn into_veriscan(self) -> VeriScanError {
        VeriScanError::Storage(format!("connection pool error: {self}"))
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(value.into_veriscan())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → VeriScanError */
/* -------------------------------------------------------------------------- */

impl IntoVeriScanError for HttpError {
    fn into_veriscan(self) -> VeriScanError {
        if self.is_timeout() {
            return VeriScanError::Timeout("HTTP request timed out".into());
        }

        if self.is_connect() {
            return VeriScanError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return VeriScanError::Parse(format!("failed to decode HTTP response: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => VeriScanError::Auth(message),
                _ => VeriScanError::Network(message),
            };
        }

        VeriScanError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_veriscan())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
