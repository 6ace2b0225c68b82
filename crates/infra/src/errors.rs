//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use storelink_domain::StoreLinkError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StoreLinkError);

impl From<InfraError> for StoreLinkError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StoreLinkError> for InfraError {
    fn from(value: StoreLinkError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoStoreLinkError {
    fn into_storelink(self) -> StoreLinkError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreLinkError */
/* -------------------------------------------------------------------------- */

impl IntoStoreLinkError for SqlError {
    fn into_storelink(self) -> StoreLinkError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        StoreLinkError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        StoreLinkError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        StoreLinkError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        StoreLinkError::Database("foreign key constraint violation".into())
                    }
                    _ => StoreLinkError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                StoreLinkError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                StoreLinkError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                StoreLinkError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                StoreLinkError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                StoreLinkError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => StoreLinkError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => StoreLinkError::Database("invalid SQL query".into()),
            other => StoreLinkError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_storelink())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → StoreLinkError */
/* -------------------------------------------------------------------------- */

impl IntoStoreLinkError for r2d2::Error {
    fn into_storelink(self) -> StoreLinkError {
        StoreLinkError::Database(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_storelink())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StoreLinkError */
/* -------------------------------------------------------------------------- */

impl IntoStoreLinkError for HttpError {
    fn into_storelink(self) -> StoreLinkError {
        if self.is_timeout() {
            StoreLinkError::Network("http request timed out".into())
        } else if self.is_connect() {
            StoreLinkError::Network(format!("connection failed: {self}"))
        } else if self.is_builder() {
            StoreLinkError::Config(format!("invalid http client configuration: {self}"))
        } else if self.is_decode() {
            StoreLinkError::Network(format!("failed to decode response body: {self}"))
        } else {
            StoreLinkError::Network(self.to_string())
        }
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_storelink())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_maps_to_not_found() {
        let err: InfraError = SqlError::QueryReturnedNoRows.into();
        assert!(matches!(StoreLinkError::from(err), StoreLinkError::NotFound(_)));
    }

    #[test]
    fn invalid_query_maps_to_database() {
        let err: InfraError = SqlError::InvalidQuery.into();
        assert!(matches!(StoreLinkError::from(err), StoreLinkError::Database(_)));
    }
}
