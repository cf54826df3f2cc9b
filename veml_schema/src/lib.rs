//! Data contracts for VEML documents.
//!
//! [`document`] holds the canonical typed model; [`versioned`] holds the
//! revision-agnostic model every historical document is read into before it
//! is migrated.

pub mod capability;
pub mod document;
pub mod math;
pub mod version;
pub mod versioned;

pub use capability::CapabilityHints;
pub use document::{
    default_sync_transport, AirplanePayload, AudioPayload, AutomobilePayload, AutomobileWheel, Background,
    ButtonPayload, CharacterPayload, Document, Effects, Entity, EntityKind, Environment,
    HtmlPayload, ImagePayload, InputEventBinding, InputPayload, LightPayload, LightType,
    LiteFog, MeshPayload, Metadata, PlacementSocket, PrimitivePayload, ProceduralSky,
    ScriptEntry, SynchronizationService, TerrainLayer, TerrainPayload, TerrainType,
    TextPayload, Transform, TransformKind, WaterPayload,
};
pub use math::{Quat, Rgba, Vec2, Vec3};
pub use version::{SchemaVersion, NAMESPACE_PREFIX};
pub use versioned::{
    RawEntity, RawEnvironment, RawMetadata, RawSynchronizationService, RawTransform,
    VersionedDocument,
};
