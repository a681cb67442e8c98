use crate::utils::error::EtlError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API 回傳的一筆資源 (supporter、segment、activity、blast)，原樣保留
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    /// 非物件的值包成 `{"value": ...}`
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(data) => Self { data },
            other => {
                let mut data = Map::new();
                data.insert("value".to_string(), other);
                Self { data }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub processed_records: Vec<Record>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// 搜尋端點的一頁回應
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub count: u64,
    pub offset: Option<u64>,
    pub total: Option<u64>,
    pub records: Vec<Record>,
}

/// 分頁迴圈的結果；`interrupted` 有值時 `records` 只是部分結果
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub records: Vec<Record>,
    pub pages: usize,
    pub total: Option<u64>,
    pub interrupted: Option<EtlError>,
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}
