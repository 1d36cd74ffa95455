//! The export operation: run a query and store its result as a CSV
//! object.

use tracing::{info, instrument, warn};

use crate::error::ExportError;
use crate::render::to_csv;
use crate::storage::{Storage, CONTENT_TYPE};
use crate::warehouse::{Query, Warehouse};

/// Execute `query` on the warehouse, render the full result as CSV
/// and upload it as a new object named `key` in `bucket`. Nothing is
/// uploaded unless the query succeeds, and no step is retried. The
/// header uses the query's column names when it names every column.
#[instrument(skip(warehouse, storage, query))]
pub async fn export(
    warehouse: &dyn Warehouse,
    storage: &dyn Storage,
    query: &Query,
    bucket: &str,
    key: &str,
) -> Result<(), ExportError> {
    let mut result = warehouse.execute(query).await.map_err(ExportError::Query)?;
    if !query.columns.is_empty() {
        if query.columns.len() == result.columns.len() {
            result.columns = query.columns.clone();
        } else {
            warn!(
                "Query names {} columns but the result has {}; keeping the warehouse's names",
                query.columns.len(),
                result.columns.len()
            );
        }
    }
    let body = to_csv(&result)?;
    info!(
        "Uploading {} rows ({} bytes) to {:?}",
        result.rows.len(),
        body.len(),
        key
    );
    storage
        .create_object(bucket, key, body, CONTENT_TYPE)
        .await
        .map_err(ExportError::Storage)?;
    Ok(())
}
