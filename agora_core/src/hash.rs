//! Canonical serialization and content fingerprints.
//!
//! The digests computed here are the only evidence that two runs were
//! identical, so the byte layout is a contract:
//!
//! - JSON: object keys sorted at every depth, compact separators, floats in
//!   serde_json's shortest round-trip form, non-finite floats as `null`.
//! - NDJSON: one canonical JSON document per line, each `\n` terminated.
//! - CSV: header `tick,timestamp,<keys...>`, f64 in Rust's shortest
//!   round-trip `Display` form, absent values as empty cells, `\n` endings.
//! - Digest: SHA-256 of those bytes, first 16 lowercase hex chars.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::metrics::MetricsSample;

/// Number of hex characters kept from the SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 16;

/// Fingerprints of one run's canonical artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHashes {
    pub config: String,
    pub actions: String,
    pub metrics: String,
}

/// Short hex SHA-256 digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(DIGEST_HEX_LEN);
    hex
}

/// Rebuilds `value` with object keys in sorted order at every depth.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Canonical compact JSON of an already-parsed value.
pub fn canonical_value(value: Value) -> String {
    // Serializing a `Value` cannot fail
    sort_keys(value).to_string()
}

/// Canonical compact JSON of any serializable value.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    Ok(canonical_value(serde_json::to_value(value)?))
}

/// Canonical NDJSON: one canonical document per line.
pub fn canonical_ndjson<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&canonical_json(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Formats a metric value for CSV output.
pub fn format_metric(value: f64) -> String {
    format!("{}", value)
}

/// Renders the metrics time series in its canonical CSV form.
pub fn metrics_csv(keys: &[String], samples: &[MetricsSample]) -> String {
    let mut out = String::from("tick,timestamp");
    for key in keys {
        out.push(',');
        out.push_str(key);
    }
    out.push('\n');

    for sample in samples {
        out.push_str(&sample.tick.to_string());
        out.push(',');
        out.push_str(&sample.timestamp.to_string());
        for key in keys {
            out.push(',');
            if let Some(v) = sample.values.get(key) {
                out.push_str(&format_metric(*v));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_digest_is_short_hex() {
        let d = digest(b"agora");
        assert_eq!(d.len(), DIGEST_HEX_LEN);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(d, digest(b"agora"));
        assert_ne!(d, digest(b"agorb"));
    }

    #[test]
    fn test_digest_known_value() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb924...
        assert_eq!(digest(b""), "e3b0c44298fc1c14");
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [ {"y": 1, "x": 2} ], "c": null}});
        assert_eq!(
            canonical_value(value),
            r#"{"a":{"c":null,"z":[{"x":2,"y":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_reformatting_does_not_change_digest() {
        let compact = r#"{"seed":42,"name":"m","ticks":50}"#;
        let pretty = "{\n  \"ticks\": 50,\n  \"name\": \"m\",\n  \"seed\": 42\n}";

        let a: Value = serde_json::from_str(compact).unwrap();
        let b: Value = serde_json::from_str(pretty).unwrap();
        assert_eq!(
            digest(canonical_value(a).as_bytes()),
            digest(canonical_value(b).as_bytes())
        );
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        let mut m = BTreeMap::new();
        m.insert("bad", f64::NAN);
        assert_eq!(canonical_json(&m).unwrap(), r#"{"bad":null}"#);
    }

    #[test]
    fn test_canonical_ndjson_lines() {
        let records = vec![json!({"b": 2, "a": 1}), json!({"c": 3})];
        assert_eq!(
            canonical_ndjson(&records).unwrap(),
            "{\"a\":1,\"b\":2}\n{\"c\":3}\n"
        );
    }

    #[test]
    fn test_float_round_trip_is_stable() {
        let text = canonical_json(&json!({"price": 0.1 + 0.2})).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(canonical_value(reparsed), text);
    }

    #[test]
    fn test_metrics_csv_layout() {
        let mut values = BTreeMap::new();
        values.insert("volume".to_string(), 1000.0);
        values.insert("price".to_string(), 1.25);
        let samples = vec![
            MetricsSample { tick: 0, timestamp: 0, values: values.clone() },
            MetricsSample { tick: 10, timestamp: 120, values: BTreeMap::new() },
        ];
        let keys = vec!["volume".to_string(), "price".to_string()];

        assert_eq!(
            metrics_csv(&keys, &samples),
            "tick,timestamp,volume,price\n0,0,1000,1.25\n10,120,,\n"
        );
    }

    #[test]
    fn test_hashing_same_content_twice() {
        let keys = vec!["volume".to_string()];
        let samples = vec![MetricsSample { tick: 0, timestamp: 0, values: BTreeMap::new() }];
        let first = digest(metrics_csv(&keys, &samples).as_bytes());
        let second = digest(metrics_csv(&keys, &samples).as_bytes());
        assert_eq!(first, second);
    }
}
