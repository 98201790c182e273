//! Core error taxonomy shared by the storage facade, the table manager,
//! the node store, the graph facade, and the CEP data frame.
//!
//! Every variant corresponds to one of the failure classes named in the
//! component design: argument errors, backend errors, schema mismatches,
//! and CEP parse errors. Allocation failure has no variant here — safe
//! Rust aborts on OOM rather than returning an error for it.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("argument error: {0}")]
    InvalidArgument(String),

    #[error("sqlite backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("CEP parse error: {0}")]
    Csv(String),
}

pub type Result<T> = std::result::Result<T, Error>;
