//! CSV/TSV parser (§4.6): single `primary` table, one column per header
//! field, delimiter chosen by extension (`,` for csv, tab for tsv).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::{Result, RowledgerError};
use crate::model::{ColumnDef, ColumnType, TableKey, TableSchema};
use crate::value::{CellValue, RowValue};

use super::{FileParser, ParsedData, ParsedTable};

const CHANNEL_CAPACITY: usize = 1_024;

pub struct CsvParser {
    delimiter: u8,
    file_type: &'static str,
}

impl CsvParser {
    pub fn new(extension: &str) -> Self {
        match extension {
            "tsv" => CsvParser {
                delimiter: b'\t',
                file_type: "tsv",
            },
            _ => CsvParser {
                delimiter: b',',
                file_type: "csv",
            },
        }
    }
}

#[async_trait]
impl FileParser for CsvParser {
    fn file_type(&self) -> &'static str {
        self.file_type
    }

    async fn parse(&self, path: &Path) -> Result<ParsedData> {
        let path = path.to_path_buf();
        let delimiter = self.delimiter;

        let mut reader = blocking_reader(&path, delimiter)?;
        let headers = reader
            .headers()
            .map_err(|e| parser_error(&path, e))?
            .clone();
        let column_names: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

        let schema = TableSchema {
            columns: column_names
                .iter()
                .map(|name| ColumnDef {
                    name: name.clone(),
                    column_type: ColumnType::String,
                })
                .collect(),
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::task::spawn_blocking(move || stream_rows(reader, column_names, tx, path));

        Ok(ParsedData {
            file_type: self.file_type,
            tables: vec![ParsedTable {
                table_key: TableKey::primary(),
                schema,
                rows: rx,
            }],
        })
    }
}

fn blocking_reader(path: &Path, delimiter: u8) -> Result<::csv::Reader<std::fs::File>> {
    ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| parser_error(path, e))
}

fn parser_error(path: &Path, err: ::csv::Error) -> RowledgerError {
    RowledgerError::Parser {
        filename: path.display().to_string(),
        message: err.to_string(),
    }
}

fn stream_rows(
    mut reader: ::csv::Reader<std::fs::File>,
    column_names: Vec<String>,
    tx: mpsc::Sender<Result<RowValue>>,
    path: PathBuf,
) {
    for record in reader.records() {
        let outcome = record
            .map_err(|e| parser_error(&path, e))
            .map(|record| record_to_row(&record, &column_names));
        if tx.blocking_send(outcome).is_err() {
            return;
        }
    }
}

fn record_to_row(record: &::csv::StringRecord, column_names: &[String]) -> RowValue {
    let pairs = column_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let raw = record.get(i).unwrap_or("");
            (name.clone(), infer_cell(raw))
        })
        .collect();
    RowValue::new(pairs)
}

/// CSV has no type system; every field is text. Numbers that round-trip
/// exactly are promoted so canonicalization matches a hand-typed import of
/// the same values, the empty string is kept distinct from null (§4.1).
fn infer_cell(raw: &str) -> CellValue {
    if raw.is_empty() {
        return CellValue::String(String::new());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return CellValue::Float(f);
    }
    CellValue::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_integers_and_floats_but_keeps_text_as_string() {
        assert_eq!(infer_cell("42"), CellValue::Integer(42));
        assert_eq!(infer_cell("3.14"), CellValue::Float(3.14));
        assert_eq!(infer_cell("Ana"), CellValue::String("Ana".to_string()));
        assert_eq!(infer_cell(""), CellValue::String(String::new()));
    }
}
