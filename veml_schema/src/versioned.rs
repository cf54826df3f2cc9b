//! Revision-agnostic document model used for every schema revision.
//!
//! Historical revisions differ only in which entity kinds, payload fields,
//! transform kinds and background variants they define. Those differences are
//! described by tables in `veml_runtime::migration`; this model keeps the
//! structural skeleton typed (metadata, entity tree, common entity fields) and
//! carries kind-specific payloads as untyped JSON maps until the document
//! reaches the canonical revision.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use crate::document::{InputEventBinding, PlacementSocket};
use crate::version::SchemaVersion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    /// Revision the content currently conforms to. Set by detection and by
    /// every migration step, never read from the wire.
    #[serde(skip, default = "canonical")]
    pub version: SchemaVersion,
    #[serde(rename = "xmlns")]
    pub namespace: String,
    #[serde(default)]
    pub metadata: RawMetadata,
    #[serde(default)]
    pub environment: RawEnvironment,
}

fn canonical() -> SchemaVersion {
    SchemaVersion::CANONICAL
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "script")]
    pub scripts: Vec<String>,
    #[serde(default, rename = "inputevent")]
    pub input_events: Vec<InputEventBinding>,
    #[serde(default, rename = "synchronizationservice")]
    pub synchronization_services: Vec<RawSynchronizationService>,
    #[serde(default, rename = "capability")]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSynchronizationService {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub session: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEnvironment {
    /// Single-member object naming the background variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<JsonMap<String, JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<JsonValue>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<RawEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<RawTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_load_event: Option<String>,
    #[serde(default, rename = "placement-socket")]
    pub placement_sockets: Vec<PlacementSocket>,
    #[serde(default)]
    pub children: Vec<RawEntity>,
    #[serde(flatten)]
    pub payload: JsonMap<String, JsonValue>,
}

impl RawEntity {
    /// Copy of this node without its children.
    pub fn shallow_clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            id: self.id,
            tag: self.tag.clone(),
            transform: self.transform.clone(),
            synchronizer: self.synchronizer.clone(),
            on_load_event: self.on_load_event.clone(),
            placement_sockets: self.placement_sockets.clone(),
            children: Vec::new(),
            payload: self.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransform {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: JsonMap<String, JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_collects_kind_specific_fields() {
        let json = r#"{
            "type": "meshentity",
            "tag": "crate",
            "mesh-resource": "crate.glb",
            "children": [{"type": "entity", "tag": "child"}]
        }"#;
        let entity: RawEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.kind, "meshentity");
        assert_eq!(entity.payload.get("mesh-resource").unwrap(), "crate.glb");
        assert!(!entity.payload.contains_key("tag"));
        assert_eq!(entity.children.len(), 1);
        assert!(entity.shallow_clone().children.is_empty());
    }
}
