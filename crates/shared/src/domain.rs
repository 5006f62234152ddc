use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Backend identifier of a resource row.
///
/// Collections disagree on whether ids are strings or integers, so both are
/// accepted on the wire and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for ResourceId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Int(n) => Self(n.to_string()),
        })
    }
}

pub trait Resource: DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &ResourceId;
}

/// Untyped row: the id plus whatever fields the backend sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "_id")]
    pub id: ResourceId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Best human-readable label for table output.
    pub fn label(&self) -> String {
        ["name", "title", "email", "username"]
            .iter()
            .find_map(|key| self.fields.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

impl Resource for Record {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Users,
    Exercises,
    Foods,
    Meals,
    Workouts,
    Plans,
    Muscles,
    Equipment,
    Payments,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Users,
        ResourceKind::Exercises,
        ResourceKind::Foods,
        ResourceKind::Meals,
        ResourceKind::Workouts,
        ResourceKind::Plans,
        ResourceKind::Muscles,
        ResourceKind::Equipment,
        ResourceKind::Payments,
    ];

    /// Path segment under `/api`.
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::Users => "users",
            ResourceKind::Exercises => "exercises",
            ResourceKind::Foods => "foods",
            ResourceKind::Meals => "meals",
            ResourceKind::Workouts => "workouts",
            ResourceKind::Plans => "plans",
            ResourceKind::Muscles => "muscles",
            ResourceKind::Equipment => "equipment",
            ResourceKind::Payments => "payments",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource '{0}'")]
pub struct UnknownResource(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = match wanted.as_str() {
            "user" => "users",
            "exercise" => "exercises",
            "food" => "foods",
            "meal" => "meals",
            "workout" => "workouts",
            "plan" => "plans",
            "muscle" => "muscles",
            "payment" | "memberships" | "membership" => "payments",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|kind| kind.path() == wanted)
            .ok_or_else(|| UnknownResource(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_accepts_string_and_integer() {
        let text: ResourceId = serde_json::from_str("\"64f1a\"").expect("string id");
        let int: ResourceId = serde_json::from_str("42").expect("integer id");
        assert_eq!(text, ResourceId::new("64f1a"));
        assert_eq!(int, ResourceId::new("42"));
    }

    #[test]
    fn record_reads_mongo_style_id() {
        let record: Record =
            serde_json::from_str(r#"{"_id":"abc","name":"Bench press","sets":4}"#).expect("record");
        assert_eq!(record.id.as_str(), "abc");
        assert_eq!(record.label(), "Bench press");
        assert_eq!(record.field("sets"), Some(&Value::from(4)));
    }

    #[test]
    fn resource_kind_parses_singular_and_aliases() {
        assert_eq!("meal".parse::<ResourceKind>(), Ok(ResourceKind::Meals));
        assert_eq!("Memberships".parse::<ResourceKind>(), Ok(ResourceKind::Payments));
        assert!("spaceships".parse::<ResourceKind>().is_err());
    }
}
