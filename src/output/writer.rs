use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

/// CSV (`b','`) 或 TSV (`b'\t'`) 文字
pub fn to_delimited(headers: &[String], rows: &[Vec<String>], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

pub fn to_json(records: &[Record]) -> Result<Vec<u8>> {
    let mut data = serde_json::to_vec_pretty(records)?;
    data.push(b'\n');
    Ok(data)
}

/// 把已產生的檔案打包成一個 zip
pub fn zip_bundle(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for (name, data) in files {
        zip.start_file(name.as_str(), SimpleFileOptions::default())?;
        zip.write_all(data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;

    fn sample() -> (Vec<String>, Vec<Vec<String>>) {
        (
            vec!["Name".to_string(), "Note".to_string()],
            vec![vec!["Ada".to_string(), "likes, commas".to_string()]],
        )
    }

    #[test]
    fn test_csv_quotes_delimiters() {
        let (headers, rows) = sample();
        let csv = String::from_utf8(to_delimited(&headers, &rows, b',').unwrap()).unwrap();
        assert_eq!(csv, "Name,Note\nAda,\"likes, commas\"\n");
    }

    #[test]
    fn test_tsv_output() {
        let (headers, rows) = sample();
        let tsv = String::from_utf8(to_delimited(&headers, &rows, b'\t').unwrap()).unwrap();
        assert_eq!(tsv, "Name\tNote\nAda\tlikes, commas\n");
    }

    #[test]
    fn test_json_is_pretty_array() {
        let records = vec![Record::from_value(json!({"id": 1}))];
        let text = String::from_utf8(to_json(&records).unwrap()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!([{"id": 1}]));
        assert!(text.contains("\n  "));
    }

    #[test]
    fn test_zip_bundle_contains_files() {
        let files = vec![
            ("out.csv".to_string(), b"a\n1\n".to_vec()),
            ("out.json".to_string(), b"[]".to_vec()),
        ];
        let data = zip_bundle(&files).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut csv = String::new();
        archive
            .by_name("out.csv")
            .unwrap()
            .read_to_string(&mut csv)
            .unwrap();
        assert_eq!(csv, "a\n1\n");
    }
}
