//! Cookie list export and import planning.

use serde_json::Value;

use crate::cookies::{Cookie, CookieError};

/// Pretty JSON array of cookie records, as written to the export file.
pub fn export_cookies_json(cookies: &[Cookie]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(cookies)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CookieImportPlan {
    pub total: usize,
    pub invalid_count: usize,
    pub valid_entries: Vec<Cookie>,
}

/// Validates a pasted/imported cookie array. Entries that are not objects or lack a string
/// `name`, `value` or `domain` are counted as invalid; expirations already in the past are
/// dropped so the cookie comes back as a session cookie.
pub fn create_cookie_import_plan(payload: &Value, now_ms: i64) -> Result<CookieImportPlan, CookieError> {
    let Value::Array(items) = payload else {
        return Err(CookieError::NotAnArray);
    };

    let mut valid_entries = Vec::with_capacity(items.len());
    let mut invalid_count = 0;

    for item in items {
        match Cookie::deserialize_record(item) {
            Some(cookie) => valid_entries.push(cookie.without_past_expiration(now_ms)),
            None => invalid_count += 1,
        }
    }

    Ok(CookieImportPlan { total: items.len(), invalid_count, valid_entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn import_plan_counts_invalid_entries() {
        let payload = json!([
            { "name": "a", "value": "1", "domain": "example.com", "expirationDate": 10 },
            { "name": "b", "value": "2", "domain": "example.com", "expirationDate": 9_999_999_999u64 },
            { "name": "c", "domain": "example.com" },
            "nope",
        ]);
        let plan = create_cookie_import_plan(&payload, 20_000).unwrap();

        assert_eq!(plan.total, 4);
        assert_eq!(plan.invalid_count, 2);
        assert_eq!(plan.valid_entries.len(), 2);
        assert!(plan.valid_entries[0].is_session());
        assert!(!plan.valid_entries[1].is_session());
    }

    #[test]
    fn import_requires_an_array() {
        let err = create_cookie_import_plan(&json!({ "name": "a" }), 0).unwrap_err();
        assert_eq!(err.to_string(), "Input must be a JSON array.");
    }

    #[test]
    fn export_is_a_json_array() {
        let json = export_cookies_json(&[Cookie::new("a", "1", "example.com")]).unwrap();
        let back: Vec<Cookie> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0].name, "a");
    }
}
