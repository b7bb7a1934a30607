// src/tables.rs - JSON Lines source tables in, assignment tables out
use anyhow::{Context, Result};
use futures::future::try_join_all;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::models::core::RawNameRecord;

/// One input file, optionally stamped with a source tag for all of its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub source_tag: Option<String>,
    pub path: PathBuf,
}

impl TableSpec {
    /// Accepts `path` or `tag=path`. A prefix containing path characters is
    /// read as part of the path.
    pub fn parse(arg: &str) -> Self {
        if let Some((tag, path)) = arg.split_once('=') {
            let looks_like_tag = !tag.is_empty()
                && !path.is_empty()
                && tag
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if looks_like_tag {
                return Self {
                    source_tag: Some(tag.to_string()),
                    path: PathBuf::from(path),
                };
            }
        }
        Self {
            source_tag: None,
            path: PathBuf::from(arg),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub records: Vec<RawNameRecord>,
    pub malformed_rows: usize,
}

fn record_id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Parses one JSONL row. `None` means the row is malformed: not an object,
/// no usable record id, or no source tag from either the row or `tag_override`.
/// A missing or non-string `raw_name` is not malformed; it yields `raw_name: None`.
pub fn parse_record_line(line: &str, tag_override: Option<&str>) -> Option<RawNameRecord> {
    let value: Value = serde_json::from_str(line).ok()?;
    let obj = value.as_object()?;
    let record_id = obj.get("record_id").and_then(record_id_of)?;
    let source_tag = match tag_override {
        Some(tag) => tag.to_string(),
        None => obj
            .get("source_tag")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())?
            .to_string(),
    };
    let raw_name = obj
        .get("raw_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(RawNameRecord {
        source_tag,
        record_id,
        raw_name,
    })
}

pub async fn load_source_table(spec: &TableSpec) -> Result<SourceTable> {
    let file = tokio::fs::File::open(&spec.path)
        .await
        .with_context(|| format!("Failed to open source table {}", spec.path.display()))?;
    let mut reader = BufReader::new(file);
    let mut table = SourceTable::default();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .with_context(|| format!("Failed to read {}", spec.path.display()))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        // A row that is not UTF-8 is malformed, not a reason to stop reading.
        let Ok(line) = std::str::from_utf8(&buf) else {
            table.malformed_rows += 1;
            debug!("{}:{}: skipping row that is not UTF-8", spec.path.display(), line_no);
            continue;
        };
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        match parse_record_line(line, spec.source_tag.as_deref()) {
            Some(record) => table.records.push(record),
            None => {
                table.malformed_rows += 1;
                debug!("{}:{}: skipping malformed row", spec.path.display(), line_no);
            }
        }
    }

    if table.malformed_rows > 0 {
        warn!(
            "{}: skipped {} malformed rows",
            spec.path.display(),
            table.malformed_rows
        );
    }
    info!(
        "Loaded {} records from {}",
        table.records.len(),
        spec.path.display()
    );
    Ok(table)
}

/// Reads all tables concurrently; records keep the order of `specs`.
pub async fn load_source_tables(specs: &[TableSpec]) -> Result<SourceTable> {
    let tables = try_join_all(specs.iter().map(|spec| load_source_table(spec))).await?;
    let mut merged = SourceTable::default();
    for table in tables {
        merged.malformed_rows += table.malformed_rows;
        merged.records.extend(table.records);
    }
    Ok(merged)
}

/// Writes one JSON object per line.
pub fn write_jsonl<'a, T, I>(path: &Path, rows: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0usize;
    for row in rows {
        serde_json::to_writer(&mut writer, row)
            .with_context(|| format!("Failed to serialize row for {}", path.display()))?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(written)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::FirmAssignment;
    use tempfile::NamedTempFile;

    #[test]
    fn test_table_spec_parsing() {
        assert_eq!(
            TableSpec::parse("grant=data/grants.jsonl"),
            TableSpec {
                source_tag: Some("grant".into()),
                path: PathBuf::from("data/grants.jsonl")
            }
        );
        assert_eq!(TableSpec::parse("financial-filer=f.jsonl").source_tag.as_deref(), Some("financial-filer"));
        assert_eq!(TableSpec::parse("data/all.jsonl").source_tag, None);
        assert_eq!(TableSpec::parse("./a=b.jsonl").path, PathBuf::from("./a=b.jsonl"));
    }

    #[test]
    fn test_parse_record_line() {
        let rec = parse_record_line(r#"{"source_tag":"grant","record_id":"G1","raw_name":"Acme Corp"}"#, None)
            .unwrap();
        assert_eq!(rec, RawNameRecord::new("grant", "G1", "Acme Corp"));

        let numeric = parse_record_line(r#"{"source_tag":"grant","record_id":17,"raw_name":"Acme"}"#, None).unwrap();
        assert_eq!(numeric.record_id, "17");

        let override_tag =
            parse_record_line(r#"{"source_tag":"grant","record_id":"1","raw_name":"Acme"}"#, Some("assignee")).unwrap();
        assert_eq!(override_tag.source_tag, "assignee");
    }

    #[test]
    fn test_bad_names_are_kept_as_missing() {
        let null_name = parse_record_line(r#"{"source_tag":"grant","record_id":"1","raw_name":null}"#, None).unwrap();
        assert_eq!(null_name.raw_name, None);
        let number_name = parse_record_line(r#"{"source_tag":"grant","record_id":"1","raw_name":42}"#, None).unwrap();
        assert_eq!(number_name.raw_name, None);
        let absent = parse_record_line(r#"{"source_tag":"grant","record_id":"1"}"#, None).unwrap();
        assert_eq!(absent.raw_name, None);
    }

    #[test]
    fn test_malformed_rows() {
        assert!(parse_record_line("not json", None).is_none());
        assert!(parse_record_line("[1,2]", None).is_none());
        assert!(parse_record_line(r#"{"source_tag":"grant","raw_name":"Acme"}"#, None).is_none());
        assert!(parse_record_line(r#"{"source_tag":"grant","record_id":"  ","raw_name":"Acme"}"#, None).is_none());
        assert!(parse_record_line(r#"{"record_id":"1","raw_name":"Acme"}"#, None).is_none());
        assert!(parse_record_line(r#"{"record_id":"1","raw_name":"Acme"}"#, Some("grant")).is_some());
    }

    #[tokio::test]
    async fn test_load_source_tables() {
        let mut grants = NamedTempFile::new().unwrap();
        writeln!(grants, r#"{{"record_id":"g1","raw_name":"Acme Corp"}}"#).unwrap();
        writeln!(grants).unwrap();
        writeln!(grants, "garbage").unwrap();
        writeln!(grants, r#"{{"record_id":"g2","raw_name":null}}"#).unwrap();

        let mut mixed = NamedTempFile::new().unwrap();
        writeln!(mixed, r#"{{"source_tag":"assignee","record_id":5,"raw_name":"ACME CORP."}}"#).unwrap();

        let specs = vec![
            TableSpec {
                source_tag: Some("grant".into()),
                path: grants.path().to_path_buf(),
            },
            TableSpec {
                source_tag: None,
                path: mixed.path().to_path_buf(),
            },
        ];
        let table = load_source_tables(&specs).await.unwrap();
        assert_eq!(table.records.len(), 3);
        assert_eq!(table.malformed_rows, 1);
        assert_eq!(table.records[0].record_id, "g1");
        assert_eq!(table.records[1].raw_name, None);
        assert_eq!(table.records[2].source_tag, "assignee");
    }

    #[tokio::test]
    async fn test_non_utf8_row_is_skipped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"record_id":"g1","raw_name":"Acme Corp"}}"#).unwrap();
        file.write_all(b"{\"record_id\":\"g2\",\"raw_name\":\"\xff\xfe\"}\n").unwrap();
        file.write_all(b"{\"record_id\":\"g3\",\"raw_name\":\"Zenith\"}\r\n").unwrap();

        let spec = TableSpec {
            source_tag: Some("grant".into()),
            path: file.path().to_path_buf(),
        };
        let table = load_source_table(&spec).await.unwrap();
        assert_eq!(table.malformed_rows, 1);
        let ids: Vec<&str> = table.records.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g3"]);
        assert_eq!(table.records[1].raw_name.as_deref(), Some("Zenith"));
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let spec = TableSpec::parse("grant=/definitely/not/here.jsonl");
        assert!(load_source_table(&spec).await.is_err());
    }

    #[test]
    fn test_write_jsonl_nulls() {
        let out = NamedTempFile::new().unwrap();
        let rows = vec![
            FirmAssignment {
                source_tag: "grant".into(),
                record_id: "1".into(),
                firm_num: Some(100_000_000),
            },
            FirmAssignment {
                source_tag: "grant".into(),
                record_id: "2".into(),
                firm_num: None,
            },
        ];
        assert_eq!(write_jsonl(out.path(), &rows).unwrap(), 2);
        let text = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"{"source_tag":"grant","record_id":"1","firm_num":100000000}"#);
        assert_eq!(lines[1], r#"{"source_tag":"grant","record_id":"2","firm_num":null}"#);
    }
}
