//! Defines the fixed reports and how their queries and output
//! objects are named.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::warehouse::Query;

/// The database and table every report reads from, within the
/// configured project.
const SOURCE_DATABASE: &str = "data_lake";
const SOURCE_TABLE: &str = "subscriber_browsing";

/// A report: its sequence number and the query template producing
/// it. The `{table}` placeholder in the template is replaced by the
/// quoted, fully qualified source table.
#[derive(Debug)]
pub struct ReportDefinition {
    pub sequence: u16,
    pub template: &'static str,
    /// Header of the output file. Athena folds aliases to lowercase,
    /// so the names are restored from here.
    pub columns: &'static [&'static str],
}

/// The reports produced by each run, in execution order.
pub const REPORTS: [ReportDefinition; 2] = [
    ReportDefinition {
        sequence: 1,
        columns: &["mobileNum", "url", "totalBytesIn", "totalBytesOut"],
        template: "select mobileNum, url, sum(bytesIn) as totalBytesIn, sum(bytesOut) as totalBytesOut
from {table}
where url is not null
group by 1, 2",
    },
    ReportDefinition {
        sequence: 2,
        columns: &["mobileNum", "url", "totalSessionTimeSeconds"],
        template: "select mobileNum, url, sum(date_diff('second', cast(SessionStartTime as timestamp), cast(SessionEndTime as timestamp))) as totalSessionTimeSeconds
from {table}
where url is not null
group by 1, 2",
    },
];

impl ReportDefinition {
    /// Build the query for this report against the given project.
    pub fn query(&self, project: &str) -> Query {
        Query::new(self.template.replace("{table}", &table_reference(project)))
            .with_columns(self.columns.iter().copied())
    }

    /// The name of this report's output object for a run.
    pub fn object_name(&self, timestamp: &RunTimestamp) -> String {
        format!("report{:03}_{}.csv", self.sequence, timestamp)
    }
}

/// Quote an identifier, doubling any quotes it contains.
fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// The fully qualified source table for a project.
fn table_reference(project: &str) -> String {
    format!(
        "{}.{}.{}",
        quote_identifier(project),
        quote_identifier(SOURCE_DATABASE),
        quote_identifier(SOURCE_TABLE)
    )
}

/// The timestamp shared by every output of a run, displayed as
/// `YYYY-MM-DDTHH-MM-SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTimestamp(DateTime<Utc>);

impl RunTimestamp {
    pub fn now() -> Self {
        RunTimestamp(Utc::now())
    }
}

impl From<DateTime<Utc>> for RunTimestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        RunTimestamp(instant)
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H-%M-%S"))
    }
}
