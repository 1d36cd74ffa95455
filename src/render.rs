//! Renders result sets as CSV text.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::warehouse::ResultSet;

/// Serialize a result set as UTF-8 CSV: a header row of column
/// names followed by one record per row, comma-delimited and
/// newline-terminated. Fields are quoted only when they hold a
/// delimiter, a quote or a line break. NULL values are written as
/// empty fields.
pub fn to_csv(result: &ResultSet) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new()
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(|value| value.as_deref().unwrap_or_default()))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
