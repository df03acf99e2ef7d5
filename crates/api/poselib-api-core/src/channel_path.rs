//! ChannelPath parsing and formatting.
//!
//! Grammar (the subset of host data paths the engines touch):
//!   pose.bones["<bone>"].<attribute>
//!   pose.bones["<bone>"]["<custom property>"]
//!   <attribute>                      (object-level channel, no bone)
//! where `<attribute>` is one of `location`, `rotation_euler`, `rotation_quaternion`,
//! `rotation_axis_angle`, `scale`, `rotation_mode`.
//!   Examples:
//!   `pose.bones["spine01"].location` -> bone=Some("spine01"), kind=Location
//!   `pose.bones["hand.L"]["ik_fk"]`  -> bone=Some("hand.L"), kind=Property("ik_fk")
//!
//! Channel paths replace runtime attribute-path evaluation: every channel an f-curve
//! can address is one variant of [`ChannelKind`].

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const BONES_PREFIX: &str = "pose.bones[\"";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("invalid channel path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("channel {channel} has {arity} components, index {index} is out of range")]
    IndexOutOfRange {
        channel: String,
        arity: usize,
        index: i32,
    },
    #[error("channel {channel} is a vector channel and needs a component index")]
    MissingIndex { channel: String },
    #[error("channel {channel} is scalar and cannot be indexed with {index}")]
    UnexpectedIndex { channel: String, index: i32 },
    #[error("channel {channel}: {reason}")]
    TypeMismatch { channel: String, reason: String },
    #[error("no custom property '{key}'")]
    MissingProperty { key: String },
}

/// The channel kinds a bone (or object) exposes to keyframing and blending.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Location,
    RotationEuler,
    RotationQuaternion,
    RotationAxisAngle,
    Scale,
    RotationMode,
    Property(String),
}

impl ChannelKind {
    /// Number of components for vector channels, `None` for scalar channels.
    pub fn arity(&self) -> Option<usize> {
        match self {
            ChannelKind::Location | ChannelKind::RotationEuler | ChannelKind::Scale => Some(3),
            ChannelKind::RotationQuaternion | ChannelKind::RotationAxisAngle => Some(4),
            ChannelKind::RotationMode | ChannelKind::Property(_) => None,
        }
    }

    /// Attribute name in the data-path grammar. Properties have none.
    pub fn attribute(&self) -> Option<&'static str> {
        match self {
            ChannelKind::Location => Some("location"),
            ChannelKind::RotationEuler => Some("rotation_euler"),
            ChannelKind::RotationQuaternion => Some("rotation_quaternion"),
            ChannelKind::RotationAxisAngle => Some("rotation_axis_angle"),
            ChannelKind::Scale => Some("scale"),
            ChannelKind::RotationMode => Some("rotation_mode"),
            ChannelKind::Property(_) => None,
        }
    }

    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "location" => Some(ChannelKind::Location),
            "rotation_euler" => Some(ChannelKind::RotationEuler),
            "rotation_quaternion" => Some(ChannelKind::RotationQuaternion),
            "rotation_axis_angle" => Some(ChannelKind::RotationAxisAngle),
            "scale" => Some(ChannelKind::Scale),
            "rotation_mode" => Some(ChannelKind::RotationMode),
            _ => None,
        }
    }

    /// Rest value of one component: 1 for scale, quaternion w and the axis-angle
    /// Y axis, 0 otherwise. Properties and rotation mode have none.
    pub fn neutral(&self, index: usize) -> Option<f32> {
        match self {
            ChannelKind::Location | ChannelKind::RotationEuler => Some(0.0),
            ChannelKind::Scale => Some(1.0),
            ChannelKind::RotationQuaternion => Some(if index == 0 { 1.0 } else { 0.0 }),
            ChannelKind::RotationAxisAngle => Some(if index == 2 { 1.0 } else { 0.0 }),
            ChannelKind::RotationMode | ChannelKind::Property(_) => None,
        }
    }

    /// Validate an f-curve style index (`-1` means scalar) against this channel and
    /// return the component index, if any.
    pub fn component(&self, index: i32) -> Result<Option<usize>, ChannelError> {
        match (self.arity(), index) {
            (Some(arity), i) if i >= 0 && (i as usize) < arity => Ok(Some(i as usize)),
            (Some(_), -1) => Err(ChannelError::MissingIndex {
                channel: self.to_string(),
            }),
            (Some(arity), i) => Err(ChannelError::IndexOutOfRange {
                channel: self.to_string(),
                arity,
                index: i,
            }),
            (None, -1) => Ok(None),
            // Vector-valued custom properties are indexed; range is checked on write.
            (None, i) if i >= 0 && matches!(self, ChannelKind::Property(_)) => {
                Ok(Some(i as usize))
            }
            (None, i) => Err(ChannelError::UnexpectedIndex {
                channel: self.to_string(),
                index: i,
            }),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Property(key) => write!(f, "[\"{}\"]", escape(key)),
            other => f.write_str(other.attribute().unwrap_or_default()),
        }
    }
}

/// A channel addressed by optional bone name and channel kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelPath {
    /// Owning bone (None for object-level channels)
    pub bone: Option<String>,
    pub kind: ChannelKind,
}

impl ChannelPath {
    pub fn new(bone: Option<String>, kind: ChannelKind) -> Self {
        Self { bone, kind }
    }

    /// Channel on a named bone.
    pub fn bone(bone: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            bone: Some(bone.into()),
            kind,
        }
    }

    /// Custom property on a named bone.
    pub fn property(bone: impl Into<String>, key: impl Into<String>) -> Self {
        Self::bone(bone, ChannelKind::Property(key.into()))
    }

    pub fn bone_name(&self) -> Option<&str> {
        self.bone.as_deref()
    }

    /// Parse a host data path according to the grammar described above.
    pub fn parse(s: &str) -> Result<Self, ChannelError> {
        let invalid = |reason: &str| ChannelError::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };
        if s.is_empty() {
            return Err(invalid("empty path"));
        }

        let Some(rest) = s.strip_prefix(BONES_PREFIX) else {
            if s.starts_with("[\"") {
                let (key, tail) = read_quoted(&s[2..]).ok_or_else(|| invalid("unterminated key"))?;
                if tail != "]" {
                    return Err(invalid("trailing characters after property key"));
                }
                return Ok(ChannelPath::new(None, ChannelKind::Property(key)));
            }
            let kind = ChannelKind::from_attribute(s).ok_or_else(|| invalid("unknown attribute"))?;
            return Ok(ChannelPath::new(None, kind));
        };

        let (bone, tail) = read_quoted(rest).ok_or_else(|| invalid("unterminated bone name"))?;
        if bone.is_empty() {
            return Err(invalid("empty bone name"));
        }
        let tail = tail
            .strip_prefix(']')
            .ok_or_else(|| invalid("missing ']' after bone name"))?;

        if let Some(attr) = tail.strip_prefix('.') {
            let kind =
                ChannelKind::from_attribute(attr).ok_or_else(|| invalid("unknown attribute"))?;
            return Ok(ChannelPath::bone(bone, kind));
        }
        if let Some(prop) = tail.strip_prefix("[\"") {
            let (key, after) = read_quoted(prop).ok_or_else(|| invalid("unterminated key"))?;
            if after != "]" {
                return Err(invalid("trailing characters after property key"));
            }
            if key.is_empty() {
                return Err(invalid("empty property key"));
            }
            return Ok(ChannelPath::property(bone, key));
        }
        Err(invalid("expected '.attribute' or '[\"key\"]' after bone"))
    }

    /// Extract only the bone name of a bone channel path, without validating the
    /// attribute part. Used to group channels by bone.
    pub fn bone_of(path: &str) -> Option<String> {
        let rest = path.strip_prefix(BONES_PREFIX)?;
        read_quoted(rest).map(|(bone, _)| bone)
    }
}

/// Read a `"`-terminated string honouring `\"` and `\\` escapes.
/// Returns the unescaped content and the remainder after the closing quote.
fn read_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, next) = chars.next()?;
                out.push(next);
            }
            '"' => return Some((out, &s[i + 1..])),
            _ => out.push(c),
        }
    }
    None
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for ChannelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(bone) = &self.bone {
            write!(f, "{}{}\"]", BONES_PREFIX, escape(bone))?;
            if self.kind.attribute().is_some() {
                f.write_str(".")?;
            }
        }
        write!(f, "{}", self.kind)
    }
}

impl FromStr for ChannelPath {
    type Err = ChannelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelPath::parse(s)
    }
}

// Serde support: serialize as the data-path string
impl Serialize for ChannelPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChannelPath {
    fn deserialize<D>(deserializer: D) -> Result<ChannelPath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChannelPath::parse(&s).map_err(de::Error::custom)
    }
}
