use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// 需要轉成 Engage 時間格式的過濾欄位
pub const DATE_FILTER_KEYS: [&str; 4] = ["modifiedFrom", "modifiedTo", "startDate", "endDate"];

/// 接受 `YYYY-MM-DD` 或 RFC 3339，輸出 `YYYY-MM-DDTHH:MM:SS.mmmZ` (UTC)
pub fn normalize_date(field_name: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(format_engage(parsed.with_timezone(&Utc)));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(format_engage(midnight.and_utc()));
        }
    }

    Err(EtlError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: "Expected a date like 2024-01-31 or 2024-01-31T08:00:00Z".to_string(),
    })
}

pub fn format_engage(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `--days N` 的起始時間；超出可表示的日期範圍時回傳設定錯誤
pub fn days_ago(days: u32, now: DateTime<Utc>) -> Result<String> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .map(format_engage)
        .ok_or_else(|| EtlError::InvalidConfigValueError {
            field: "days".to_string(),
            value: days.to_string(),
            reason: "Too many days, the start date is out of range".to_string(),
        })
}

/// 原地轉換過濾條件中的日期欄位
pub fn normalize_date_filters(filters: &mut Map<String, Value>) -> Result<()> {
    for key in DATE_FILTER_KEYS {
        let raw = filters.get(key).and_then(Value::as_str).map(str::to_owned);
        if let Some(raw) = raw {
            let normalized = normalize_date(key, &raw)?;
            filters.insert(key.to_string(), Value::String(normalized));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plain_date_becomes_midnight_utc() {
        assert_eq!(
            normalize_date("modifiedFrom", "2024-03-01").unwrap(),
            "2024-03-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_offset_timestamp_is_converted_to_utc() {
        assert_eq!(
            normalize_date("modifiedTo", "2024-03-01T08:30:00+02:00").unwrap(),
            "2024-03-01T06:30:00.000Z"
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = normalize_date("modifiedFrom", "last tuesday").unwrap_err();
        assert!(err.to_string().contains("modifiedFrom"));
    }

    #[test]
    fn test_days_ago() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(days_ago(7, now).unwrap(), "2024-03-03T12:00:00.000Z");
    }

    #[test]
    fn test_days_ago_out_of_range_is_config_error() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let err = days_ago(u32::MAX, now).unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfigValueError { ref field, .. } if field == "days"));
        assert_eq!(err.severity().exit_code(), 1);
    }

    #[test]
    fn test_normalize_filters_leaves_other_keys() {
        let mut filters = Map::new();
        filters.insert("modifiedFrom".into(), Value::String("2024-01-02".into()));
        filters.insert("type".into(), Value::String("PETITION".into()));
        normalize_date_filters(&mut filters).unwrap();
        assert_eq!(filters["modifiedFrom"], "2024-01-02T00:00:00.000Z");
        assert_eq!(filters["type"], "PETITION");
    }
}
