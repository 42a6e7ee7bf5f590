use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Points at an output field of an earlier call in the call tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackReference {
    pub sequence_no: usize,
    pub field: String,
}

impl fmt::Display for BackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$$PREV[{}]", self.sequence_no)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEntry {
    pub reference: BackReference,
    pub value: Value,
}

/// Produced field name to the latest successful call that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceTable {
    entries: BTreeMap<String, ProvenanceEntry>,
}

impl ProvenanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records every output field of call `sequence_no`. Later calls replace earlier
    /// producers of the same field.
    pub fn record_outputs(&mut self, sequence_no: usize, outputs: &Map<String, Value>) -> usize {
        for (field, value) in outputs {
            self.entries.insert(
                field.clone(),
                ProvenanceEntry {
                    reference: BackReference {
                        sequence_no,
                        field: field.clone(),
                    },
                    value: value.clone(),
                },
            );
        }
        outputs.len()
    }

    /// The producer of `value`, preferring a field named like the argument, then the most
    /// recent call. `null` is never bound.
    pub fn reference_for(&self, argument: &str, value: &Value) -> Option<&BackReference> {
        if value.is_null() {
            return None;
        }
        if let Some(entry) = self.entries.get(argument) {
            if entry.value == *value {
                return Some(&entry.reference);
            }
        }
        self.entries
            .values()
            .filter(|entry| entry.value == *value)
            .max_by_key(|entry| entry.reference.sequence_no)
            .map(|entry| &entry.reference)
    }

    pub fn known_values(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(field, entry)| (field.clone(), entry.value.clone()))
            .collect()
    }

    /// Known values as a JSON object for the argument prompt.
    pub fn render_known_values(&self) -> String {
        if self.entries.is_empty() {
            return "{}".to_string();
        }
        serde_json::to_string_pretty(&Value::Object(self.known_values()))
            .unwrap_or_else(|_| "{}".to_string())
    }
}

/// One argument as executed: its literal value and, when it came from an earlier call, the
/// reference to that call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundArgument {
    pub name: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<BackReference>,
}

/// Binds each argument against the provenance table, keeping argument order.
pub fn bind_arguments(
    arguments: &Map<String, Value>,
    table: &ProvenanceTable,
) -> Vec<BoundArgument> {
    arguments
        .iter()
        .map(|(name, value)| BoundArgument {
            name: name.clone(),
            value: value.clone(),
            reference: table.reference_for(name, value).cloned(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub sequence_no: usize,
    pub api_name: String,
    pub arguments: Vec<BoundArgument>,
    pub status: i64,
    pub outputs: Map<String, Value>,
}

/// Append-only record of executed calls. `sequence_no` always equals the record's position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallTree {
    records: Vec<CallRecord>,
}

impl CallTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sequence_no(&self) -> usize {
        self.records.len()
    }

    /// Appends a call and returns its sequence number.
    pub fn append(
        &mut self,
        api_name: impl Into<String>,
        arguments: Vec<BoundArgument>,
        status: i64,
        outputs: Map<String, Value>,
    ) -> usize {
        let sequence_no = self.records.len();
        self.records.push(CallRecord {
            sequence_no,
            api_name: api_name.into(),
            arguments,
            status,
            outputs,
        });
        sequence_no
    }

    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn back_reference_renders_as_prev_token() {
        let reference = BackReference {
            sequence_no: 3,
            field: "id".to_string(),
        };
        assert_eq!(reference.to_string(), "$$PREV[3]");
    }

    #[test]
    fn same_named_field_wins_over_more_recent_duplicate_value() {
        let mut table = ProvenanceTable::new();
        table.record_outputs(0, &outputs(json!({"owned_by": "DEVU-1"})));
        table.record_outputs(1, &outputs(json!({"created_by": "DEVU-1"})));

        let by_name = table
            .reference_for("owned_by", &json!("DEVU-1"))
            .expect("bound");
        assert_eq!(by_name.sequence_no, 0);

        let by_recency = table
            .reference_for("applies_to", &json!("DEVU-1"))
            .expect("bound");
        assert_eq!(by_recency.sequence_no, 1);
        assert_eq!(by_recency.field, "created_by");
    }

    #[test]
    fn unmatched_and_null_values_stay_literal() {
        let mut table = ProvenanceTable::new();
        table.record_outputs(0, &outputs(json!({"id": "A", "cleared": null})));
        assert!(table.reference_for("id", &json!("B")).is_none());
        assert!(table.reference_for("cleared", &Value::Null).is_none());
    }

    #[test]
    fn bind_keeps_argument_order() {
        let mut table = ProvenanceTable::new();
        table.record_outputs(0, &outputs(json!({"id": "DEVU-1"})));
        let bound = bind_arguments(
            &outputs(json!({"type": ["issue"], "owned_by": ["DEVU-1"], "user": "DEVU-1"})),
            &table,
        );
        let names = bound.iter().map(|arg| arg.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["type", "owned_by", "user"]);
        assert!(bound[0].reference.is_none());
        assert!(bound[1].reference.is_none());
        assert_eq!(
            bound[2].reference.as_ref().map(|r| r.sequence_no),
            Some(0)
        );
    }

    #[test]
    fn call_tree_sequence_numbers_equal_positions() {
        let mut tree = CallTree::new();
        for name in ["a", "b", "c"] {
            let expected = tree.next_sequence_no();
            assert_eq!(tree.append(name, Vec::new(), 200, Map::new()), expected);
        }
        for (position, record) in tree.records().iter().enumerate() {
            assert_eq!(record.sequence_no, position);
        }
    }

    #[test]
    fn known_values_render_as_json_object() {
        let mut table = ProvenanceTable::new();
        assert_eq!(table.render_known_values(), "{}");
        table.record_outputs(2, &outputs(json!({"sprint_id": "S-9"})));
        let rendered: Value =
            serde_json::from_str(&table.render_known_values()).expect("json");
        assert_eq!(rendered, json!({"sprint_id": "S-9"}));
    }
}
