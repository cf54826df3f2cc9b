use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix shared by every namespace tag; the version suffix follows it.
pub const NAMESPACE_PREFIX: &str = "https://veml.dev/schema/";

/// Every schema revision a document may declare, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
    V1_4,
    V2_0,
    V2_1,
    V2_2,
    V2_3,
    V2_4,
    V3_0,
}

impl SchemaVersion {
    pub const ALL: [SchemaVersion; 11] = [
        SchemaVersion::V1_0,
        SchemaVersion::V1_1,
        SchemaVersion::V1_2,
        SchemaVersion::V1_3,
        SchemaVersion::V1_4,
        SchemaVersion::V2_0,
        SchemaVersion::V2_1,
        SchemaVersion::V2_2,
        SchemaVersion::V2_3,
        SchemaVersion::V2_4,
        SchemaVersion::V3_0,
    ];

    /// The newest revision; every migration ends here.
    pub const CANONICAL: SchemaVersion = SchemaVersion::V3_0;

    pub fn label(self) -> &'static str {
        match self {
            SchemaVersion::V1_0 => "1.0",
            SchemaVersion::V1_1 => "1.1",
            SchemaVersion::V1_2 => "1.2",
            SchemaVersion::V1_3 => "1.3",
            SchemaVersion::V1_4 => "1.4",
            SchemaVersion::V2_0 => "2.0",
            SchemaVersion::V2_1 => "2.1",
            SchemaVersion::V2_2 => "2.2",
            SchemaVersion::V2_3 => "2.3",
            SchemaVersion::V2_4 => "2.4",
            SchemaVersion::V3_0 => "3.0",
        }
    }

    pub fn namespace(self) -> String {
        format!("{NAMESPACE_PREFIX}{}", self.label())
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        let label = namespace.trim().trim_end_matches('/').strip_prefix(NAMESPACE_PREFIX)?;
        Self::ALL.into_iter().find(|version| version.label() == label)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The revision directly after this one, or `None` for the canonical revision.
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_canonical(self) -> bool {
        self == Self::CANONICAL
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VEML {}", self.label())
    }
}
