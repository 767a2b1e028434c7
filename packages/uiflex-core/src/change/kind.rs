use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tagged change kind.
///
/// Built-in kinds have dedicated variants; anything else is carried as
/// `Custom` with its string tag. Serialized as the bare tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    Hide,
    Unhide,
    AddChild,
    RemoveChild,
    Move,
    SetProperty,
    Rename,
    Custom(String),
}

impl ChangeKind {
    /// Built-in kinds in registration order.
    pub const BUILTIN: [ChangeKind; 7] = [
        ChangeKind::Hide,
        ChangeKind::Unhide,
        ChangeKind::AddChild,
        ChangeKind::RemoveChild,
        ChangeKind::Move,
        ChangeKind::SetProperty,
        ChangeKind::Rename,
    ];

    /// Parses a string tag. Unrecognized tags become `Custom`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "hide" => ChangeKind::Hide,
            "unhide" => ChangeKind::Unhide,
            "addChild" => ChangeKind::AddChild,
            "removeChild" => ChangeKind::RemoveChild,
            "move" => ChangeKind::Move,
            "setProperty" => ChangeKind::SetProperty,
            "rename" => ChangeKind::Rename,
            other => ChangeKind::Custom(other.to_string()),
        }
    }

    /// Returns the string tag.
    pub fn tag(&self) -> &str {
        match self {
            ChangeKind::Hide => "hide",
            ChangeKind::Unhide => "unhide",
            ChangeKind::AddChild => "addChild",
            ChangeKind::RemoveChild => "removeChild",
            ChangeKind::Move => "move",
            ChangeKind::SetProperty => "setProperty",
            ChangeKind::Rename => "rename",
            ChangeKind::Custom(tag) => tag,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, ChangeKind::Custom(_))
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<&str> for ChangeKind {
    fn from(tag: &str) -> Self {
        ChangeKind::from_tag(tag)
    }
}

impl Serialize for ChangeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for ChangeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ChangeKind::from_tag(&tag))
    }
}
