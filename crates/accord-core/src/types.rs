use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lookup key used when a target points at another action or the RFC itself.
pub const SIGNATURE_LOOKUP_KEY: &str = "signature";

// Well-known keys within an Action's data map.
pub const COMMENT_KEY: &str = "comment";
pub const COMMENTER_KEY: &str = "commenter";
pub const NOTE_KEY: &str = "note";
pub const STATUS_KEY: &str = "status";
pub const REQUESTER_KEY: &str = "requester";
pub const REVIEWER_KEY: &str = "reviewer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Add,
    Update,
    Comment,
    Load,
    Approve,
    RequestChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Item,
    Action,
    Rfc,
}

/// Locates what an [`Action`] acts upon: a schema item, another action, or
/// the RFC as a whole. `target_descriptor` names the schema entity category
/// and only carries meaning for `item` targets; `lookup_key`/`lookup_value`
/// form a single equality predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub target_type: TargetType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_descriptor: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lookup_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lookup_value: String,
}

impl Target {
    /// Target another action (or the RFC) by its content signature.
    pub fn by_signature(target_type: TargetType, signature: impl Into<String>) -> Self {
        Self {
            target_type,
            target_descriptor: String::new(),
            lookup_key: SIGNATURE_LOOKUP_KEY.to_string(),
            lookup_value: signature.into(),
        }
    }
}

/// One unit of intent or history within an RFC.
///
/// `data` is an open mapping whose meaning is action-type-specific. It is a
/// `BTreeMap` so that canonical serialization (and therefore signing) is
/// deterministic regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl Action {
    pub fn new(action_type: ActionType, target: Option<Target>) -> Self {
        Self {
            action_type,
            target,
            signature: String::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// A proposal for change to the shared schema: an ordered, signed sequence
/// of actions. Order is meaningful, later actions may reference earlier ones
/// by signature.
///
/// `signature` and `identifier` are omitted from the persisted artifact when
/// empty; the identifier is assigned at submission and never user-supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rfc {
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identifier: String,
}

/// Progress of handing an RFC off to the downstream schema store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    LoadRequested,
    NotApplicable,
    Loading,
    Successful,
    Failed,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadRequested => "load_requested",
            Self::NotApplicable => "not_applicable",
            Self::Loading => "loading",
            Self::Successful => "successful",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
