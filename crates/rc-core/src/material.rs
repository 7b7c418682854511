//! Material catalog as the single source of truth for labels, class ids and credits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recyclable material categories recognized by the assistant.
///
/// The set is closed: the detector's class ids and the user-facing labels
/// both map onto exactly these four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Material {
    Cardboard,
    Metal,
    Paper,
    Plastic,
}

impl Material {
    /// Every material, in catalog order.
    pub const ALL: [Self; 4] = [Self::Cardboard, Self::Metal, Self::Paper, Self::Plastic];

    /// Credit awarded for one recycled item of this material.
    #[must_use]
    pub const fn credits(self) -> u32 {
        match self {
            Self::Cardboard => 7,
            Self::Metal => 10,
            Self::Paper => 5,
            Self::Plastic => 6,
        }
    }

    /// Maps a detector class id onto the catalog.
    pub fn from_class_id(class_id: i64) -> Result<Self, UnknownMaterial> {
        match class_id {
            0 => Ok(Self::Cardboard),
            1 => Ok(Self::Metal),
            2 => Ok(Self::Paper),
            3 => Ok(Self::Plastic),
            _ => Err(UnknownMaterial::ClassId(class_id)),
        }
    }

    /// The detector class id for this material.
    #[must_use]
    pub const fn class_id(self) -> i64 {
        match self {
            Self::Cardboard => 0,
            Self::Metal => 1,
            Self::Paper => 2,
            Self::Plastic => 3,
        }
    }

    /// Lower-case label used for storage, file names and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cardboard => "cardboard",
            Self::Metal => "metal",
            Self::Paper => "paper",
            Self::Plastic => "plastic",
        }
    }

    /// Capitalized label for human-readable output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Cardboard => "Cardboard",
            Self::Metal => "Metal",
            Self::Paper => "Paper",
            Self::Plastic => "Plastic",
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Material {
    type Err = UnknownMaterial;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|material| material.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownMaterial::Label(s.to_string()))
    }
}

impl Serialize for Material {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Material {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A label or class id outside the material catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownMaterial {
    #[error("unknown material: {0}")]
    Label(String),
    #[error("unknown material class id: {0}")]
    ClassId(i64),
}
