//! File Parsers (§4.6): map uploaded bytes to one or more logical tables.
//!
//! A factory dispatches by extension, case-insensitive. Each parser streams
//! its rows through a bounded channel rather than collecting them, so the
//! import worker can start canonicalizing the first batch before the parser
//! has finished reading the file (§5 "CPU-bound... parallelize trivially",
//! §4.6 "must not hold all rows in memory").

mod csv;
mod excel;
mod parquet;

use std::path::Path;

use crate::errors::{Result, RowledgerError};
use crate::model::{TableKey, TableSchema};
use crate::value::RowValue;

/// A bounded stream of rows for one logical table, produced incrementally
/// by a parser. The commit builder pulls batches of up to `batch_size`
/// before handing them off for canonicalization (§4.6 "recommended batch
/// size 1 000-10 000 rows").
pub type RowSequence = tokio::sync::mpsc::Receiver<Result<RowValue>>;

pub struct ParsedTable {
    pub table_key: TableKey,
    pub schema: TableSchema,
    pub rows: RowSequence,
}

/// `ParsedData` (§4.6): one or more logical tables read out of a single
/// uploaded file.
pub struct ParsedData {
    pub file_type: &'static str,
    pub tables: Vec<ParsedTable>,
}

#[async_trait::async_trait]
pub trait FileParser: Send + Sync {
    fn file_type(&self) -> &'static str;
    async fn parse(&self, path: &Path) -> Result<ParsedData>;
}

/// Selects a parser by the filename's extension. Unknown extensions fail
/// with a typed error (§4.6 "Unknown extensions fail with a typed error").
pub fn parser_for_filename(filename: &str) -> Result<Box<dyn FileParser>> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| {
            RowledgerError::InvalidInput(format!("`{filename}` has no file extension"))
        })?;

    match extension.as_str() {
        "csv" | "tsv" => Ok(Box::new(csv::CsvParser::new(&extension))),
        "parquet" => Ok(Box::new(parquet::ParquetParser)),
        "xlsx" | "xls" | "xlsm" => Ok(Box::new(excel::ExcelParser)),
        other => Err(RowledgerError::InvalidInput(format!(
            "unsupported file extension `.{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_known_extensions() {
        assert_eq!(parser_for_filename("sales.csv").unwrap().file_type(), "csv");
        assert_eq!(parser_for_filename("sales.TSV").unwrap().file_type(), "tsv");
        assert_eq!(
            parser_for_filename("sales.parquet").unwrap().file_type(),
            "parquet"
        );
        assert_eq!(parser_for_filename("sales.xlsx").unwrap().file_type(), "excel");
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(parser_for_filename("sales.docx").is_err());
    }

    #[test]
    fn rejects_missing_extension() {
        assert!(parser_for_filename("sales").is_err());
    }
}
