use crate::domain::model::Record;
use crate::output::ColumnSpec;
use serde_json::Value;
use std::collections::HashSet;

/// 依點路徑取值，支援陣列索引 (`contacts.0.value`) 與選擇器 (`contacts[type=EMAIL].value`)
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for segment in path.split('.') {
        let (name, selector) = split_selector(segment);

        if !name.is_empty() {
            current = match current {
                Value::Object(map) => map.get(name)?,
                Value::Array(items) => items.get(name.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        if let Some((key, expected)) = selector {
            current = current.as_array()?.iter().find(|item| {
                item.get(key)
                    .map(|v| render(v) == expected)
                    .unwrap_or(false)
            })?;
        }
    }

    Some(current)
}

fn split_selector(segment: &str) -> (&str, Option<(&str, &str)>) {
    if let (Some(open), true) = (segment.find('['), segment.ends_with(']')) {
        let inner = &segment[open + 1..segment.len() - 1];
        if let Some((key, expected)) = inner.split_once('=') {
            return (&segment[..open], Some((key.trim(), expected.trim())));
        }
    }
    (segment, None)
}

/// 儲存格文字：字串原樣、null 為空、巢狀結構輸出緊湊 JSON
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 攤平成 `(路徑, 值)`，保留欄位出現順序
pub fn flatten(record: &Record) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (key, value) in &record.data {
        flatten_into(key.clone(), value, &mut out);
    }
    out
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{}.{}", prefix, key), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(format!("{}.{}", prefix, index), child, out);
            }
        }
        other => out.push((prefix, render(other))),
    }
}

/// 沒有設定欄位時，取所有記錄攤平後的欄位聯集
pub fn resolve_columns(records: &[Record], configured: &[ColumnSpec]) -> Vec<ColumnSpec> {
    if !configured.is_empty() {
        return configured.to_vec();
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for (path, _) in flatten(record) {
            if seen.insert(path.clone()) {
                columns.push(ColumnSpec::Path(path));
            }
        }
    }
    columns
}

pub fn to_rows(records: &[Record], columns: &[ColumnSpec]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|record| {
            let value = Value::Object(record.data.clone());
            columns
                .iter()
                .map(|column| lookup(&value, column.path()).map(render).unwrap_or_default())
                .collect()
        })
        .collect()
}
