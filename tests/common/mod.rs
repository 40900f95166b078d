#![allow(dead_code)]

pub mod mocks;

use serde_json::{Value, json};
use submission_transfer::{
    item::csv::CsvRow,
    record::{REQUIRED_HEADERS, codec},
};

/// Installs the test logger once; later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn headers() -> Vec<String> {
    REQUIRED_HEADERS.iter().map(|h| h.to_string()).collect()
}

/// A complete import row for `form_id` with the given child collections.
pub fn submission_row(form_id: &str, fields: &Value, actions: &Value, errors: &Value) -> CsvRow {
    let mut row: CsvRow = headers().into_iter().map(|h| (h, String::new())).collect();
    row.insert("form_id".to_string(), form_id.to_string());
    row.insert("user_id".to_string(), "1".to_string());
    row.insert("status".to_string(), "success".to_string());
    row.insert("ip_address".to_string(), "10.0.0.7".to_string());
    row.insert("user_agent".to_string(), "Mozilla/5.0 (X11; Linux)".to_string());
    row.insert("is_viewed".to_string(), "0".to_string());
    row.insert("created_at".to_string(), "2024-05-01 08:30:00".to_string());
    row.insert("fields".to_string(), codec::encode(fields));
    row.insert("actions".to_string(), codec::encode(actions));
    row.insert("errors".to_string(), codec::encode(errors));
    row
}

pub fn sample_fields() -> Value {
    json!([
        {"field_name": "name", "field_value": "Zoë \"Z\" O'Brien", "field_type": "text"},
        {"field_name": "message", "field_value": "line one\nline two, with comma", "field_type": "textarea"},
        {"field_name": "site", "field_value": "https://example.com/a/b", "field_attrs": "{\"required\":true}"}
    ])
}

pub fn sample_actions() -> Value {
    json!([
        {"action_slug": "send_email", "action_id": 4, "on_event": "SUBMIT", "status": "success"},
        {"action_slug": "webhook", "action_id": 9}
    ])
}

pub fn sample_errors() -> Value {
    json!([{"name": "smtp", "message": "Connection timed out"}])
}
