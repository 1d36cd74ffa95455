use thiserror::Error;

/// Ways a single report export can fail.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The warehouse rejected or failed to run the query.
    #[error("query failed: {0:#}")]
    Query(anyhow::Error),

    /// The result set couldn't be serialized as CSV.
    #[error("failed to render CSV")]
    Render(#[from] csv::Error),

    /// The object couldn't be created in the bucket.
    #[error("upload failed: {0:#}")]
    Storage(anyhow::Error),
}
