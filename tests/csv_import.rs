//! End-to-end parser test: writes a real CSV file to disk, dispatches it
//! through `parser_for_filename`, and drains the resulting row channel.

use rowledger::parsers::parser_for_filename;
use rowledger::value::CellValue;
use std::io::Write;

#[tokio::test]
async fn parses_csv_file_into_typed_rows() {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("create temp file");
    writeln!(file, "name,age,score").unwrap();
    writeln!(file, "Ana,29,91.5").unwrap();
    writeln!(file, "Bo,,").unwrap();
    file.flush().unwrap();

    let parser = parser_for_filename("upload.csv").unwrap();
    let mut parsed = parser.parse(file.path()).await.expect("parse csv");

    assert_eq!(parsed.tables.len(), 1);
    let mut table = parsed.tables.remove(0);
    assert_eq!(table.table_key.to_string(), "primary");
    assert_eq!(table.schema.columns.len(), 3);
    assert_eq!(table.schema.columns[0].name, "name");

    let first = table.rows.recv().await.unwrap().expect("row 1");
    assert_eq!(first.0[0], ("name".to_string(), CellValue::String("Ana".to_string())));
    assert_eq!(first.0[1], ("age".to_string(), CellValue::Integer(29)));
    assert_eq!(first.0[2], ("score".to_string(), CellValue::Float(91.5)));

    let second = table.rows.recv().await.unwrap().expect("row 2");
    assert_eq!(second.0[1], ("age".to_string(), CellValue::String(String::new())));

    assert!(table.rows.recv().await.is_none(), "channel closes after last row");
}

#[tokio::test]
async fn tsv_extension_selects_tab_delimiter() {
    let mut file = tempfile::Builder::new()
        .suffix(".tsv")
        .tempfile()
        .expect("create temp file");
    writeln!(file, "a\tb").unwrap();
    writeln!(file, "1\t2").unwrap();
    file.flush().unwrap();

    let parser = parser_for_filename("upload.tsv").unwrap();
    assert_eq!(parser.file_type(), "tsv");

    let mut parsed = parser.parse(file.path()).await.expect("parse tsv");
    let mut table = parsed.tables.remove(0);
    let row = table.rows.recv().await.unwrap().expect("row");
    assert_eq!(row.0[0], ("a".to_string(), CellValue::Integer(1)));
    assert_eq!(row.0[1], ("b".to_string(), CellValue::Integer(2)));
}

#[tokio::test]
async fn unsupported_extension_is_rejected_before_touching_disk() {
    let err = parser_for_filename("report.docx").unwrap_err();
    assert!(err.to_string().contains("docx"));
}
