use serde_json::Value as JsonValue;
use veml_schema::{SchemaVersion, VersionedDocument};

use crate::error::DocumentError;
use crate::migration::{migrate_to_canonical, Migration};

/// Identifies the revision a raw document declares and reads it into the
/// versioned model for that revision.
pub fn detect_version(bytes: &[u8]) -> Result<VersionedDocument, DocumentError> {
    let value: JsonValue = serde_json::from_slice(bytes)
        .map_err(|source| DocumentError::Malformed {
            version: None,
            source,
        })?;

    let namespace = value.get("xmlns").and_then(JsonValue::as_str);
    let version = namespace
        .and_then(SchemaVersion::from_namespace)
        .ok_or_else(|| DocumentError::UnknownVersion {
            namespace: namespace.map(str::to_string),
        })?;

    let mut document: VersionedDocument =
        serde_json::from_value(value).map_err(|source| DocumentError::Malformed {
            version: Some(version),
            source,
        })?;
    document.version = version;
    Ok(document)
}

/// Detects, migrates and lowers raw bytes into the canonical typed model.
pub fn load_document(bytes: &[u8]) -> Result<Migration, DocumentError> {
    let document = detect_version(bytes)?;
    Ok(migrate_to_canonical(document)?)
}
