//! Decoded routing snapshot from Traefik's `/api/rawdata`.
//!
//! ## Shape
//! Only `routers` is read. Each router value is classified into a
//! [`RouterEntry`] instead of being trusted blindly, so the transformer can
//! tell "rule absent", "rule of the wrong type" and "not an object" apart.
//! The top-level document itself must be an object with a `routers` object;
//! anything else is a [`FetchError`].

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{json_kind, FetchError};

/// The one field this system needs from a router definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterDescriptor {
    /// Predicate expression, e.g. ``Host(`app.example.com`)``.
    pub rule: String,
}

/// One value of the `routers` mapping, classified by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEntry {
    WellFormed(RouterDescriptor),
    /// An object without a `rule` field.
    RuleMissing,
    /// `rule` exists but is not a string.
    RuleNotString { found: &'static str },
    /// The router value is not an object at all.
    NotAnObject { found: &'static str },
}

impl From<&Value> for RouterEntry {
    fn from(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return RouterEntry::NotAnObject { found: json_kind(value) };
        };
        match obj.get("rule") {
            None => RouterEntry::RuleMissing,
            Some(Value::String(rule)) => RouterEntry::WellFormed(RouterDescriptor { rule: rule.clone() }),
            Some(other) => RouterEntry::RuleNotString { found: json_kind(other) },
        }
    }
}

/// Point-in-time copy of the source proxy's routers, keyed by router name.
///
/// Iteration is in ascending name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingSnapshot {
    pub routers: BTreeMap<String, RouterEntry>,
}

impl RoutingSnapshot {
    /// Decode a raw response body.
    ///
    /// # Errors
    /// - [`FetchError::Decode`] when the body is not a JSON object.
    /// - [`FetchError::RoutersMissing`] when there is no `routers` field.
    /// - [`FetchError::RoutersNotObject`] when `routers` is not an object.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FetchError> {
        let raw: Value = serde_json::from_slice(bytes).map_err(|e| FetchError::Decode {
            detail: e.to_string(),
        })?;
        Self::from_value(&raw)
    }

    pub fn from_value(raw: &Value) -> Result<Self, FetchError> {
        let Some(doc) = raw.as_object() else {
            return Err(FetchError::Decode {
                detail: format!("expected a JSON object, found {}", json_kind(raw)),
            });
        };
        let routers = match doc.get("routers") {
            None => return Err(FetchError::RoutersMissing),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| (name.clone(), RouterEntry::from(value)))
                .collect(),
            Some(other) => {
                return Err(FetchError::RoutersNotObject { found: json_kind(other) });
            }
        };
        Ok(Self { routers })
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_well_formed_router() {
        let snap = RoutingSnapshot::from_slice(
            br#"{"routers":{"myapp@docker":{"rule":"Host(`app.example.com`)","service":"x"}}}"#,
        )
        .unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(
            snap.routers["myapp@docker"],
            RouterEntry::WellFormed(RouterDescriptor {
                rule: "Host(`app.example.com`)".to_string()
            })
        );
    }

    #[test]
    fn classifies_bad_entries() {
        let snap = RoutingSnapshot::from_value(&json!({
            "routers": {
                "a": "not-an-object",
                "b": {"service": "x"},
                "c": {"rule": 42},
                "d": {"rule": null},
            }
        }))
        .unwrap();
        assert_eq!(snap.routers["a"], RouterEntry::NotAnObject { found: "string" });
        assert_eq!(snap.routers["b"], RouterEntry::RuleMissing);
        assert_eq!(snap.routers["c"], RouterEntry::RuleNotString { found: "number" });
        assert_eq!(snap.routers["d"], RouterEntry::RuleNotString { found: "null" });
    }

    #[test]
    fn other_top_level_fields_ignored() {
        let snap = RoutingSnapshot::from_value(&json!({
            "routers": {},
            "services": {"x": {}},
            "middlewares": {},
        }))
        .unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn missing_routers_is_distinct_error() {
        let err = RoutingSnapshot::from_value(&json!({"services": {}})).unwrap_err();
        assert!(matches!(err, FetchError::RoutersMissing));
    }

    #[test]
    fn mistyped_routers_is_distinct_error() {
        let err = RoutingSnapshot::from_value(&json!({"routers": ["a"]})).unwrap_err();
        assert!(matches!(err, FetchError::RoutersNotObject { found: "array" }));
    }

    #[test]
    fn non_json_body_is_decode_error() {
        let err = RoutingSnapshot::from_slice(b"<html>502</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn non_object_document_is_decode_error() {
        let err = RoutingSnapshot::from_slice(b"[1,2]").unwrap_err();
        match err {
            FetchError::Decode { detail } => assert!(detail.contains("array"), "{detail}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn iteration_is_name_ordered() {
        let snap = RoutingSnapshot::from_value(&json!({
            "routers": {"zeta": {"rule": "x"}, "alpha": {"rule": "y"}, "mid": {"rule": "z"}}
        }))
        .unwrap();
        let names: Vec<&str> = snap.routers.keys().map(String::as_str).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }
}
