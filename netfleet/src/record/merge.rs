//! Hostname-keyed decorating merge of two record collections.

use indexmap::IndexMap;
use serde_json::Value;

use super::{FieldRecord, SummaryRecord};

/// Merge two heterogeneous record collections into per-device summary views.
///
/// The field universe is the union of field names across both collections.
/// Each primary record starts from an all-`Null` map, overlays its own fields,
/// then overlays every secondary record sharing its hostname (later secondary
/// records win per field). Output order follows the primary collection;
/// secondary records with no matching primary are dropped — this decorates the
/// primary view, it is not a full outer join.
pub fn merge_by_hostname<P, S>(primary: &[P], secondary: &[S]) -> Vec<SummaryRecord>
where
    P: FieldRecord,
    S: FieldRecord,
{
    let mut universe: IndexMap<String, Value> = IndexMap::new();
    for record in primary.iter().map(FieldRecord::to_fields) {
        for name in record.into_keys() {
            universe.entry(name).or_insert(Value::Null);
        }
    }
    for record in secondary.iter().map(FieldRecord::to_fields) {
        for name in record.into_keys() {
            universe.entry(name).or_insert(Value::Null);
        }
    }

    primary
        .iter()
        .map(|record| {
            let mut fields = universe.clone();
            for (name, value) in record.to_fields() {
                fields.insert(name, value);
            }
            for other in secondary.iter().filter(|s| s.hostname() == record.hostname()) {
                for (name, value) in other.to_fields() {
                    fields.insert(name, value);
                }
            }
            SummaryRecord {
                hostname: record.hostname().to_string(),
                fields,
            }
        })
        .collect()
}
