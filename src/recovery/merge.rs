//! One payload per service.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::ledger::SecretRecord;

/// Folds records into `service -> payload`.
///
/// When several records name the same service the one at the greatest height
/// wins; equal heights fall back to the greater transaction hash so the
/// result does not depend on input order.
pub fn merge_by_service<'a, I>(records: I) -> BTreeMap<String, Map<String, Value>>
where
    I: IntoIterator<Item = &'a SecretRecord>,
{
    let mut latest: BTreeMap<&str, &SecretRecord> = BTreeMap::new();
    for record in records {
        let newer = match latest.get(record.service.as_str()) {
            Some(current) => (record.height, &record.tx_hash) > (current.height, &current.tx_hash),
            None => true,
        };
        if newer {
            latest.insert(record.service.as_str(), record);
        }
    }
    latest
        .into_iter()
        .map(|(service, record)| (service.to_string(), record.payload.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(hash: &str, height: u64, service: &str, token: &str) -> SecretRecord {
        SecretRecord {
            tx_hash: hash.into(),
            height,
            amount_code: 1001,
            service: service.into(),
            payload: json!({ "service": service, "token": token }).as_object().cloned().unwrap(),
            timestamp: None,
        }
    }

    #[test]
    fn test_latest_height_wins() {
        let records = [
            record("A", 20, "db", "new"),
            record("B", 10, "db", "old"),
            record("C", 15, "bot", "x"),
        ];
        let merged = merge_by_service(&records);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["db"]["token"], json!("new"));
        assert_eq!(merged["bot"]["token"], json!("x"));

        let reversed: Vec<_> = records.iter().rev().collect();
        assert_eq!(merge_by_service(reversed), merged);
    }

    #[test]
    fn test_equal_heights_are_deterministic() {
        let a = record("A", 5, "db", "a");
        let b = record("B", 5, "db", "b");
        assert_eq!(merge_by_service([&a, &b])["db"]["token"], json!("b"));
        assert_eq!(merge_by_service([&b, &a])["db"]["token"], json!("b"));
    }
}
