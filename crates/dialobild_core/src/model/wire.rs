//! Wire projection of graph nodes.
//!
//! # Responsibility
//! - Define the node record exchanged with editor clients.
//! - Accept client-local ids given as JSON numbers or strings.
//!
//! # Invariants
//! - `rules` maps every rule code known to the project to its targets; a code
//!   without edges maps to an empty list rather than being omitted.

use crate::model::graph::{NodeId, Position};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Node id as sent by a client.
///
/// Persisted nodes are referenced by their numeric id; nodes created in the
/// editor since the last save carry an arbitrary client-local id. Both are
/// kept in canonical string form so one key space covers both: any value
/// that parses as an integer is stored in its decimal form, so `5`, `"5"`
/// and `"05"` are the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        match trimmed.parse::<NodeId>() {
            Ok(id) => Self::from(id),
            Err(_) => Self(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the persisted id this client id names, if it is numeric.
    pub fn as_node_id(&self) -> Option<NodeId> {
        self.0.parse::<NodeId>().ok()
    }
}

impl From<NodeId> for ClientId {
    fn from(value: NodeId) -> Self {
        Self(value.to_string())
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawClientId {
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawClientId::deserialize(deserializer)? {
            RawClientId::Number(value) => Ok(Self::from(value)),
            RawClientId::Text(value) => Ok(Self::new(value)),
        }
    }
}

impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_node_id() {
            Some(id) => serializer.serialize_i64(id),
            None => serializer.serialize_str(&self.0),
        }
    }
}

/// Grid location as serialized on the wire.
pub type Location = Position;

/// Rule code -> ordered target ids.
pub type RuleMap = BTreeMap<String, Vec<ClientId>>;

/// Node record in request and response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode {
    pub id: ClientId,
    pub node_type: String,
    pub content: String,
    pub location: Location,
    #[serde(default)]
    pub rules: RuleMap,
}

#[cfg(test)]
mod tests {
    use super::{ClientId, WireNode};
    use serde_json::json;

    #[test]
    fn client_id_accepts_numbers_and_strings() {
        let numeric: ClientId = serde_json::from_value(json!(12)).unwrap();
        let text: ClientId = serde_json::from_value(json!("tmp-3")).unwrap();
        let numeric_text: ClientId = serde_json::from_value(json!("12")).unwrap();

        assert_eq!(numeric, numeric_text);
        assert_eq!(numeric.as_node_id(), Some(12));
        assert_eq!(text.as_node_id(), None);
        assert_eq!(serde_json::to_value(&numeric).unwrap(), json!(12));
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("tmp-3"));
    }

    #[test]
    fn integer_aliases_share_one_key() {
        let padded: ClientId = serde_json::from_value(json!("007")).unwrap();
        let spaced: ClientId = serde_json::from_value(json!(" 7 ")).unwrap();
        let signed: ClientId = serde_json::from_value(json!("+7")).unwrap();

        assert_eq!(padded, ClientId::from(7));
        assert_eq!(spaced, ClientId::from(7));
        assert_eq!(signed, ClientId::from(7));
        assert_eq!(padded.as_str(), "7");
        assert_eq!(ClientId::new(" tmp "), ClientId::new("tmp"));
    }

    #[test]
    fn wire_node_defaults_missing_rules_to_empty() {
        let node: WireNode = serde_json::from_value(json!({
            "id": 1,
            "nodeType": "statement",
            "content": "Hello",
            "location": {"x": 0, "y": 0}
        }))
        .unwrap();
        assert!(node.rules.is_empty());
        assert_eq!(node.node_type, "statement");
    }

    #[test]
    fn wire_node_requires_location() {
        let result = serde_json::from_value::<WireNode>(json!({
            "id": 1,
            "nodeType": "statement",
            "content": "Hello"
        }));
        assert!(result.is_err());
    }
}
