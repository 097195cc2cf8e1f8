//! Excel parser (§4.6): one logical table per worksheet, `table_key` is
//! the sheet name. `calamine` loads a workbook's sheets eagerly (it has no
//! streaming row API), so the "no full-file buffering" requirement is met
//! one sheet at a time: each sheet's rows are pushed through the channel
//! as soon as that sheet is read, rather than holding every sheet of a
//! multi-sheet workbook in memory at once.

use std::path::Path;

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use tokio::sync::mpsc;

use crate::errors::{Result, RowledgerError};
use crate::model::{ColumnDef, ColumnType, TableKey, TableSchema};
use crate::value::{CellValue, RowValue};

use super::{FileParser, ParsedData, ParsedTable};

const CHANNEL_CAPACITY: usize = 1_024;

pub struct ExcelParser;

#[async_trait]
impl FileParser for ExcelParser {
    fn file_type(&self) -> &'static str {
        "excel"
    }

    async fn parse(&self, path: &Path) -> Result<ParsedData> {
        let path = path.to_path_buf();
        let mut workbook =
            open_workbook_auto(&path).map_err(|e| parser_error(&path, &e.to_string()))?;

        let mut tables = Vec::new();
        let sheet_names = workbook.sheet_names().to_owned();
        for sheet_name in sheet_names {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(|e| parser_error(&path, &e.to_string()))?;

            let mut rows = range.rows();
            let Some(header) = rows.next() else {
                continue;
            };
            let column_names: Vec<String> = header.iter().map(|c| c.to_string()).collect();
            let schema = TableSchema {
                columns: column_names
                    .iter()
                    .map(|name| ColumnDef {
                        name: name.clone(),
                        column_type: ColumnType::String,
                    })
                    .collect(),
            };

            let body: Vec<Vec<Data>> = rows.map(|r| r.to_vec()).collect();
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            tokio::task::spawn_blocking(move || stream_rows(body, column_names, tx));

            tables.push(ParsedTable {
                table_key: TableKey::new(sheet_name)?,
                schema,
                rows: rx,
            });
        }

        Ok(ParsedData {
            file_type: "excel",
            tables,
        })
    }
}

fn parser_error(path: &Path, message: &str) -> RowledgerError {
    RowledgerError::Parser {
        filename: path.display().to_string(),
        message: message.to_string(),
    }
}

fn stream_rows(body: Vec<Vec<Data>>, column_names: Vec<String>, tx: mpsc::Sender<Result<RowValue>>) {
    for cells in body {
        let pairs = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = cells.get(i).map(cell_to_value).unwrap_or(CellValue::Null);
                (name.clone(), value)
            })
            .collect();
        if tx.blocking_send(Ok(RowValue::new(pairs))).is_err() {
            return;
        }
    }
}

fn cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Float(*f),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .and_then(|naive| naive.and_local_timezone(chrono::Utc).single())
            .map(CellValue::Timestamp)
            .unwrap_or_else(|| CellValue::String(cell.to_string())),
        Data::Error(e) => CellValue::String(format!("{e:?}")),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
    }
}
