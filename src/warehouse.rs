//! Defines the warehouse collaborator: something that executes a
//! query and hands back the complete result set. The production
//! implementation runs queries on Athena.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_athena::types::{QueryExecutionState, ResultConfiguration, Row};
use aws_sdk_athena::Client;
use core::time::Duration;
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use crate::conf::Settings;

/// The time to wait between query status checks, in milliseconds.
const POLL_INTERVAL: u64 = 500;

/// A query to submit to the warehouse: its text plus the values
/// bound to its positional (`?`) parameters, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub parameters: Vec<String>,
    /// Names for the result columns, replacing the ones reported by
    /// the warehouse. Empty keeps the warehouse's names.
    pub columns: Vec<String>,
}

impl Query {
    /// A query without parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Query {
            text: text.into(),
            parameters: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Name the result columns, in order.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Bind the next positional parameter. Values are given as SQL
    /// literals, so strings must carry their own single quotes.
    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.parameters.push(value.into());
        self
    }
}

/// A fully materialized query result. Each row holds one value per
/// column, `None` standing for SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Executes queries to completion.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run the query, wait for it to finish, and return every row of
    /// its result.
    async fn execute(&self, query: &Query) -> Result<ResultSet>;
}

/// Athena-backed warehouse.
pub struct AthenaWarehouse {
    client: Client,
    workgroup: Option<String>,
    output_location: Option<String>,
}

impl AthenaWarehouse {
    /// Build a warehouse handle with a fresh Athena client.
    pub fn new(sdk_config: &SdkConfig, settings: &Settings) -> Self {
        AthenaWarehouse {
            client: Client::new(sdk_config),
            workgroup: settings.athena_workgroup.clone(),
            output_location: settings.athena_output_location.clone(),
        }
    }

    /// Submit the query and return its execution id.
    async fn start(&self, query: &Query) -> Result<String> {
        let mut operation = self
            .client
            .start_query_execution()
            .query_string(&query.text);
        if !query.parameters.is_empty() {
            operation = operation.set_execution_parameters(Some(query.parameters.clone()));
        }
        if let Some(workgroup) = &self.workgroup {
            operation = operation.work_group(workgroup);
        }
        if let Some(output_location) = &self.output_location {
            operation = operation.result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            );
        }
        let response = operation
            .send()
            .await
            .context("Failed to start query execution")?;
        response
            .query_execution_id()
            .map(String::from)
            .ok_or_else(|| anyhow!("Athena didn't return a query execution id"))
    }

    /// Block until the execution reaches a terminal state. Fails if
    /// the execution didn't succeed.
    async fn wait(&self, execution_id: &str) -> Result<()> {
        loop {
            let response = self
                .client
                .get_query_execution()
                .query_execution_id(execution_id)
                .send()
                .await
                .with_context(|| {
                    format!("Failed to get the status of query execution {:?}", execution_id)
                })?;
            let status = response.query_execution().and_then(|qe| qe.status());
            let state = status
                .and_then(|s| s.state())
                .cloned()
                .unwrap_or(QueryExecutionState::Queued);
            let reason = status.and_then(|s| s.state_change_reason());
            if is_finished(execution_id, &state, reason)? {
                return Ok(());
            }
            debug!(?state, "Query execution {:?} is not done yet", execution_id);
            sleep(Duration::from_millis(POLL_INTERVAL)).await;
        }
    }

    /// Fetches a single page of results, continuing from the given
    /// token.
    async fn fetch_page(&self, execution_id: &str, next: Option<String>) -> Result<Page> {
        let continued = next.is_some();
        let response = self
            .client
            .get_query_results()
            .query_execution_id(execution_id)
            .set_next_token(next)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch results of query execution {:?} \
                     using {} continuation token",
                    execution_id,
                    if continued { "a" } else { "no" }
                )
            })?;
        let result_set = response.result_set();
        let columns = result_set
            .and_then(|rs| rs.result_set_metadata())
            .and_then(|meta| meta.column_info())
            .unwrap_or_default()
            .iter()
            .map(|info| info.name().unwrap_or_default().to_string())
            .collect();
        let rows = result_set
            .and_then(|rs| rs.rows())
            .unwrap_or_default()
            .iter()
            .map(row_values)
            .collect();
        Ok(Page {
            columns,
            rows,
            header_echo: response.update_count().is_none(),
            next_token: response.next_token().map(String::from),
        })
    }
}

#[async_trait]
impl Warehouse for AthenaWarehouse {
    #[instrument(skip_all)]
    async fn execute(&self, query: &Query) -> Result<ResultSet> {
        let execution_id = self.start(query).await?;
        info!("Started query execution {:?}", execution_id);
        self.wait(&execution_id).await?;

        let id = execution_id.as_str();
        let result = collect_pages(move |next| self.fetch_page(id, next)).await?;
        info!(
            "Query execution {:?} returned {} rows",
            execution_id,
            result.rows.len()
        );
        Ok(result)
    }
}

/// Tell whether an execution in the given state is done. Failed and
/// cancelled executions are errors carrying Athena's reason.
fn is_finished(
    execution_id: &str,
    state: &QueryExecutionState,
    reason: Option<&str>,
) -> Result<bool> {
    let reason = reason.unwrap_or("no reason given");
    match state {
        QueryExecutionState::Succeeded => Ok(true),
        QueryExecutionState::Failed => {
            bail!("Query execution {:?} failed: {}", execution_id, reason)
        }
        QueryExecutionState::Cancelled => {
            bail!("Query execution {:?} was cancelled: {}", execution_id, reason)
        }
        _ => Ok(false),
    }
}

/// One page of query results.
#[derive(Debug)]
struct Page {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    /// Whether the first row repeats the column names, which Athena
    /// does for queries that report no update count.
    header_echo: bool,
    next_token: Option<String>,
}

/// Fetch pages until one comes without a continuation token, handing
/// each page's token to the next fetch. Columns are taken from the
/// first page, and only that page's header echo is dropped.
async fn collect_pages<F, Fut>(mut fetch: F) -> Result<ResultSet>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page>>,
{
    let mut result = ResultSet::default();
    let mut next = None;
    let mut first_page = true;
    loop {
        let page = fetch(next.take()).await?;
        let mut rows = page.rows.into_iter();
        if first_page {
            result.columns = page.columns;
            if page.header_echo {
                rows.next();
            }
        }
        result.rows.extend(rows);
        first_page = false;
        match page.next_token {
            Some(token) => next = Some(token),
            None => break,
        }
    }
    Ok(result)
}

/// Extract the values of an Athena row.
fn row_values(row: &Row) -> Vec<Option<String>> {
    row.data()
        .unwrap_or_default()
        .iter()
        .map(|datum| datum.var_char_value().map(String::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_athena::types::Datum;
    use std::collections::VecDeque;

    fn values(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    fn page(rows: &[&[&str]], header_echo: bool, next_token: Option<&str>) -> Page {
        Page {
            columns: vec!["mobilenum".into(), "url".into()],
            rows: rows.iter().map(|row| values(row)).collect(),
            header_echo,
            next_token: next_token.map(String::from),
        }
    }

    async fn collect(pages: Vec<Page>) -> (Result<ResultSet>, Vec<Option<String>>) {
        let mut pages = VecDeque::from(pages);
        let mut tokens = Vec::new();
        let result = collect_pages(|next| {
            tokens.push(next);
            let page = pages.pop_front();
            async move { page.ok_or_else(|| anyhow!("no more pages")) }
        })
        .await;
        (result, tokens)
    }

    #[tokio::test]
    async fn follows_tokens_across_pages() {
        let (result, tokens) = collect(vec![
            page(&[&["mobilenum", "url"], &["1", "a.com"]], true, Some("t1")),
            page(&[&["mobilenum", "url"], &["2", "b.com"]], true, Some("t2")),
            page(&[&["3", "c.com"]], true, None),
        ])
        .await;
        let result = result.unwrap();

        assert_eq!(
            tokens,
            vec![None, Some(String::from("t1")), Some(String::from("t2"))]
        );
        assert_eq!(result.columns, vec!["mobilenum", "url"]);
        assert_eq!(
            result.rows,
            vec![
                values(&["1", "a.com"]),
                values(&["mobilenum", "url"]),
                values(&["2", "b.com"]),
                values(&["3", "c.com"]),
            ]
        );
    }

    #[tokio::test]
    async fn columns_come_from_the_first_page() {
        let mut last = page(&[&["2", "b.com"]], false, None);
        last.columns = vec!["other".into()];
        let (result, _) = collect(vec![page(&[&["1", "a.com"]], false, Some("t1")), last]).await;
        assert_eq!(result.unwrap().columns, vec!["mobilenum", "url"]);
    }

    #[tokio::test]
    async fn keeps_first_row_without_header_echo() {
        let (result, _) = collect(vec![page(&[&["mobilenum", "url"]], false, None)]).await;
        assert_eq!(result.unwrap().rows, vec![values(&["mobilenum", "url"])]);
    }

    #[tokio::test]
    async fn header_only_page_yields_no_rows() {
        let (result, _) = collect(vec![page(&[&["mobilenum", "url"]], true, None)]).await;
        let result = result.unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.columns.len(), 2);
    }

    #[tokio::test]
    async fn page_failure_is_surfaced() {
        let (result, tokens) = collect(vec![page(&[&["1", "a.com"]], true, Some("t1"))]).await;
        assert!(result.unwrap_err().to_string().contains("no more pages"));
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn failed_execution_carries_reason() {
        let error = is_finished(
            "q-1",
            &QueryExecutionState::Failed,
            Some("TABLE_NOT_FOUND: line 2:6: Table does not exist"),
        )
        .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("q-1"));
        assert!(message.contains("TABLE_NOT_FOUND"));
    }

    #[test]
    fn cancelled_execution_is_an_error() {
        let error = is_finished("q-2", &QueryExecutionState::Cancelled, None).unwrap_err();
        assert!(error.to_string().contains("cancelled"));
    }

    #[test]
    fn pending_and_succeeded_states() {
        assert!(!is_finished("q", &QueryExecutionState::Queued, None).unwrap());
        assert!(!is_finished("q", &QueryExecutionState::Running, None).unwrap());
        assert!(is_finished("q", &QueryExecutionState::Succeeded, None).unwrap());
    }

    #[test]
    fn missing_values_are_nulls() {
        let row = Row::builder()
            .data(Datum::builder().var_char_value("555").build())
            .data(Datum::builder().build())
            .build();
        assert_eq!(row_values(&row), vec![Some("555".to_string()), None]);
    }

    #[test]
    fn binds_parameters_in_order() {
        let query = Query::new("select ? , ?").bind("'a'").bind("2");
        assert_eq!(query.parameters, vec!["'a'", "2"]);
    }
}
