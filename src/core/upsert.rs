use crate::adapters::http::EngageClient;
use crate::domain::endpoint::Endpoint;
use crate::utils::error::{EtlError, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Engage 單次寫入的上限
pub const DEFAULT_BATCH_SIZE: usize = 20;

const DIRECT_FIELDS: [&str; 9] = [
    "supporterId",
    "firstName",
    "middleName",
    "lastName",
    "title",
    "suffix",
    "externalSystemId",
    "dateOfBirth",
    "gender",
];
const ADDRESS_FIELDS: [&str; 6] = [
    "addressLine1",
    "addressLine2",
    "city",
    "state",
    "postalCode",
    "country",
];
const CONTACT_FIELDS: [(&str, &str); 3] = [
    ("email", "EMAIL"),
    ("cellPhone", "CELL_PHONE"),
    ("homePhone", "HOME_PHONE"),
];
const EMAIL_STATUS: &str = "emailStatus";
const CUSTOM_PREFIX: &str = "custom.";

/// 讀取 CSV/TSV，每列轉成一個 supporter 物件；空白欄位略過
pub fn supporters_from_delimited(data: &[u8], delimiter: u8) -> Result<Vec<Value>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    for header in headers.iter() {
        if !is_known_header(header) {
            tracing::warn!("⚠️ Ignoring unknown column '{}'", header);
        }
    }

    let mut supporters = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let fields: Vec<(&str, &str)> = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, value)| !value.is_empty())
            .collect();
        // 第 1 列是標題
        supporters.push(supporter_from_fields(&fields, index + 2)?);
    }

    Ok(supporters)
}

fn is_known_header(header: &str) -> bool {
    DIRECT_FIELDS.contains(&header)
        || ADDRESS_FIELDS.contains(&header)
        || CONTACT_FIELDS.iter().any(|(name, _)| *name == header)
        || header == EMAIL_STATUS
        || header.starts_with(CUSTOM_PREFIX)
}

fn supporter_from_fields(fields: &[(&str, &str)], line: usize) -> Result<Value> {
    let mut supporter = Map::new();
    let mut address = Map::new();
    let mut contacts = Vec::new();
    let mut custom = Vec::new();

    let email_status = fields
        .iter()
        .find(|(name, _)| *name == EMAIL_STATUS)
        .map(|(_, value)| *value);

    for (name, value) in fields {
        if DIRECT_FIELDS.contains(name) {
            supporter.insert(name.to_string(), json!(value));
        } else if ADDRESS_FIELDS.contains(name) {
            address.insert(name.to_string(), json!(value));
        } else if let Some((_, contact_type)) = CONTACT_FIELDS.iter().find(|(n, _)| n == name) {
            let mut contact = json!({ "type": contact_type, "value": value });
            if *contact_type == "EMAIL" {
                if let Some(status) = email_status {
                    contact["status"] = json!(status);
                }
            }
            contacts.push(contact);
        } else if let Some(field_id) = name.strip_prefix(CUSTOM_PREFIX) {
            custom.push(json!({ "fieldId": field_id, "value": value }));
        }
    }

    let identified = supporter.contains_key("supporterId")
        || supporter.contains_key("externalSystemId")
        || fields.iter().any(|(name, _)| *name == "email");
    if !identified {
        return Err(EtlError::ValidationError {
            message: format!(
                "Line {}: a supporter needs supporterId, externalSystemId or email",
                line
            ),
        });
    }

    if !address.is_empty() {
        supporter.insert("address".to_string(), Value::Object(address));
    }
    if !contacts.is_empty() {
        supporter.insert("contacts".to_string(), Value::Array(contacts));
    }
    if !custom.is_empty() {
        supporter.insert("customFieldValues".to_string(), Value::Array(custom));
    }

    Ok(Value::Object(supporter))
}

/// 每批送出的 `payload`
pub fn batch_payloads(supporters: &[Value], batch_size: usize) -> Vec<Value> {
    supporters
        .chunks(batch_size.max(1))
        .map(|chunk| json!({ "supporters": chunk }))
        .collect()
}

#[derive(Debug, Default)]
pub struct UpsertSummary {
    pub batches_sent: usize,
    pub supporters_sent: usize,
    /// ADDED、UPDATED、VALIDATION_ERROR ... 的筆數
    pub results: BTreeMap<String, usize>,
    pub errors: Vec<String>,
    pub interrupted: Option<EtlError>,
}

impl UpsertSummary {
    fn record_response(&mut self, payload: &Value) {
        let Some(supporters) = payload.get("supporters").and_then(Value::as_array) else {
            return;
        };

        for supporter in supporters {
            let result = supporter
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN");
            *self.results.entry(result.to_string()).or_default() += 1;

            let who = supporter
                .get("supporterId")
                .or_else(|| supporter.get("externalSystemId"))
                .and_then(Value::as_str)
                .unwrap_or("<new supporter>");
            for error in supporter
                .get("errors")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                let field = error.get("fieldName").and_then(Value::as_str);
                self.errors.push(match field {
                    Some(field) => format!("{}: {} ({})", who, message, field),
                    None => format!("{}: {}", who, message),
                });
            }
        }
    }
}

/// 逐批 PUT supporters；某批失敗時停止並回傳目前為止的統計
pub async fn upsert_supporters(
    client: &EngageClient,
    supporters: &[Value],
    batch_size: usize,
) -> UpsertSummary {
    let descriptor = Endpoint::SupporterUpsert.descriptor();
    let batches = batch_payloads(supporters, batch_size);
    let total_batches = batches.len();
    let mut summary = UpsertSummary::default();

    for (index, payload) in batches.into_iter().enumerate() {
        let size = payload["supporters"].as_array().map(Vec::len).unwrap_or(0);

        match client.send_payload(&descriptor, payload).await {
            Ok(response) => {
                summary.batches_sent += 1;
                summary.supporters_sent += size;
                summary.record_response(&response);
                tracing::info!(
                    "📤 Batch {}/{} sent ({} supporters)",
                    index + 1,
                    total_batches,
                    size
                );
            }
            Err(e) => {
                tracing::error!("❌ Batch {}/{} failed: {}", index + 1, total_batches, e);
                summary.interrupted = Some(e);
                break;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
supporterId,firstName,lastName,email,emailStatus,city,state,custom.abc-123,favoriteColor
,Ada,Lovelace,ada@example.org,OPT_IN,London,,yes,blue
s-2,Grace,Hopper,,,,,,
";

    #[test]
    fn test_rows_become_supporters() {
        let supporters = supporters_from_delimited(CSV.as_bytes(), b',').unwrap();
        assert_eq!(supporters.len(), 2);

        assert_eq!(
            supporters[0],
            json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "address": {"city": "London"},
                "contacts": [{"type": "EMAIL", "value": "ada@example.org", "status": "OPT_IN"}],
                "customFieldValues": [{"fieldId": "abc-123", "value": "yes"}]
            })
        );
        assert_eq!(
            supporters[1],
            json!({"supporterId": "s-2", "firstName": "Grace", "lastName": "Hopper"})
        );
    }

    #[test]
    fn test_tsv_input() {
        let tsv = "email\tcellPhone\nada@example.org\t555-0100\n";
        let supporters = supporters_from_delimited(tsv.as_bytes(), b'\t').unwrap();
        assert_eq!(supporters[0]["contacts"][1]["type"], "CELL_PHONE");
    }

    #[test]
    fn test_unidentified_row_is_rejected_with_line_number() {
        let csv = "firstName,lastName\nNo,Email\n";
        let err = supporters_from_delimited(csv.as_bytes(), b',').unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_batches_respect_size() {
        let supporters: Vec<Value> = (0..45).map(|i| json!({ "supporterId": i.to_string() })).collect();
        let batches = batch_payloads(&supporters, DEFAULT_BATCH_SIZE);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2]["supporters"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_summary_counts_results_and_errors() {
        let mut summary = UpsertSummary::default();
        summary.record_response(&json!({
            "supporters": [
                {"supporterId": "s-1", "result": "UPDATED"},
                {"result": "ADDED"},
                {"result": "VALIDATION_ERROR", "errors": [
                    {"message": "invalid email", "fieldName": "email"}
                ]}
            ]
        }));

        assert_eq!(summary.results["UPDATED"], 1);
        assert_eq!(summary.results["VALIDATION_ERROR"], 1);
        assert_eq!(summary.errors, vec!["<new supporter>: invalid email (email)"]);
    }
}
