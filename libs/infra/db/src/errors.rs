// [libs/infra/db/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("[DB_CONN_FAULT]: connection uplink severed -> {0}")]
    ConnectionError(String),

    #[error("[DB_CONFIG_FAULT]: environment misconfigured -> {0}")]
    ConfigurationError(String),

    #[error("[DB_QUERY_FAULT]: query rejected -> {0}")]
    QueryError(#[from] libsql::Error),

    #[error("[DB_MAPPING_FAULT]: row mapping violation -> {0}")]
    MappingError(String),

    #[error("[DB_NOT_FOUND]: row not found")]
    NotFound,

    #[error("[DB_CONCURRENCY_FAULT]: updated_at version guard did not match, row changed underneath the write")]
    OptimisticConcurrencyConflict,

    #[error("[DB_UNIQUE_FAULT]: uniqueness constraint violated -> {0}")]
    UniqueViolation(String),
}
