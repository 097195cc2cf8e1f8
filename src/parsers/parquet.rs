//! Parquet parser (§4.6): single `primary` table; the file's own schema
//! supplies the column order and types, read via row groups so large files
//! never sit fully in memory.

use std::path::Path;

use async_trait::async_trait;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tokio::sync::mpsc;

use crate::errors::{Result, RowledgerError};
use crate::model::{ColumnDef, ColumnType, TableKey, TableSchema};
use crate::value::{CellValue, RowValue};

use super::{FileParser, ParsedData, ParsedTable};

const CHANNEL_CAPACITY: usize = 1_024;

pub struct ParquetParser;

#[async_trait]
impl FileParser for ParquetParser {
    fn file_type(&self) -> &'static str {
        "parquet"
    }

    async fn parse(&self, path: &Path) -> Result<ParsedData> {
        let path = path.to_path_buf();
        let file = std::fs::File::open(&path).map_err(|e| parser_error(&path, &e.to_string()))?;
        let reader = SerializedFileReader::new(file)
            .map_err(|e| parser_error(&path, &e.to_string()))?;

        let column_names: Vec<String> = reader
            .metadata()
            .file_metadata()
            .schema()
            .get_fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();

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
            file_type: "parquet",
            tables: vec![ParsedTable {
                table_key: TableKey::primary(),
                schema,
                rows: rx,
            }],
        })
    }
}

fn parser_error(path: &Path, message: &str) -> RowledgerError {
    RowledgerError::Parser {
        filename: path.display().to_string(),
        message: message.to_string(),
    }
}

fn stream_rows(
    reader: SerializedFileReader<std::fs::File>,
    column_names: Vec<String>,
    tx: mpsc::Sender<Result<RowValue>>,
    path: std::path::PathBuf,
) {
    let iter = match reader.get_row_iter(None) {
        Ok(iter) => iter,
        Err(e) => {
            let _ = tx.blocking_send(Err(parser_error(&path, &e.to_string())));
            return;
        }
    };

    for row in iter {
        let outcome = row
            .map_err(|e| parser_error(&path, &e.to_string()))
            .map(|row| {
                let pairs = column_names
                    .iter()
                    .zip(row.get_column_iter())
                    .map(|(name, (_, field))| (name.clone(), field_to_cell(field)))
                    .collect();
                RowValue::new(pairs)
            });
        if tx.blocking_send(outcome).is_err() {
            return;
        }
    }
}

fn field_to_cell(field: &Field) -> CellValue {
    match field {
        Field::Null => CellValue::Null,
        Field::Bool(b) => CellValue::Bool(*b),
        Field::Byte(i) => CellValue::Integer(*i as i64),
        Field::Short(i) => CellValue::Integer(*i as i64),
        Field::Int(i) => CellValue::Integer(*i as i64),
        Field::Long(i) => CellValue::Integer(*i),
        Field::UByte(i) => CellValue::Integer(*i as i64),
        Field::UShort(i) => CellValue::Integer(*i as i64),
        Field::UInt(i) => CellValue::Integer(*i as i64),
        Field::ULong(i) => CellValue::Integer(*i as i64),
        Field::Float(f) => CellValue::Float(*f as f64),
        Field::Double(f) => CellValue::Float(*f),
        Field::Str(s) => CellValue::String(s.clone()),
        Field::Bytes(b) => CellValue::String(String::from_utf8_lossy(b.data()).into_owned()),
        Field::TimestampMillis(millis) => chrono::DateTime::from_timestamp_millis(*millis)
            .map(CellValue::Timestamp)
            .unwrap_or(CellValue::Null),
        Field::TimestampMicros(micros) => chrono::DateTime::from_timestamp_micros(*micros)
            .map(CellValue::Timestamp)
            .unwrap_or(CellValue::Null),
        other => CellValue::String(format!("{other}")),
    }
}
