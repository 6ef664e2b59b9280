use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// Newtype wrappers for type safety.
//
// Identifiers are assigned by the backend. Some endpoints hand out numeric
// ids, so deserialization accepts both JSON strings and integers.

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(#[serde(deserialize_with = "deserialize_id")] String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh random identifier, used by in-process backends
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a workflow definition
    WorkflowId
);
string_id!(
    /// Identifier of an approval queue entry
    ApprovalId
);
string_id!(
    /// Identifier of an execution log entry
    ExecutionId
);
string_id!(
    /// Identifier of a quick-win suggestion
    SuggestionId
);
string_id!(
    /// Identifier of the detection rule that produced a suggestion
    RuleId
);

/// Social platform an interaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "youtube" => Ok(Platform::Youtube),
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "twitter" | "x" => Ok(Platform::Twitter),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Kind of interaction being answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Dm,
    Comment,
    Mention,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Dm => "dm",
            InteractionType::Comment => "comment",
            InteractionType::Mention => "mention",
        }
    }
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dm" => Ok(InteractionType::Dm),
            "comment" => Ok(InteractionType::Comment),
            "mention" => Ok(InteractionType::Mention),
            _ => Err(format!("Unknown interaction type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_accepts_numbers_and_strings() {
        let id: SuggestionId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");

        let id: WorkflowId = serde_json::from_str("\"wf-7\"").unwrap();
        assert_eq!(id, WorkflowId::new("wf-7"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"wf-7\"");
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::Youtube);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
        assert!("myspace".parse::<Platform>().is_err());
        assert_eq!(
            serde_json::to_string(&InteractionType::Dm).unwrap(),
            "\"dm\""
        );
    }
}
