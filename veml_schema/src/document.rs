//! Canonical (newest revision) document model.
//!
//! Every historical revision is migrated into these types before validation,
//! flattening, or loading. Field names on the wire are kebab-case.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::math::{Quat, Vec2, Vec3};
use crate::version::SchemaVersion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    #[serde(rename = "xmlns")]
    pub namespace: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub environment: Environment,
}

impl Document {
    pub fn new(metadata: Metadata, environment: Environment) -> Self {
        Self {
            namespace: SchemaVersion::CANONICAL.namespace(),
            metadata,
            environment,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Inline script bodies or `.js` resource references, in execution order.
    #[serde(default, rename = "script")]
    pub scripts: Vec<String>,
    #[serde(default, rename = "inputevent")]
    pub input_events: Vec<InputEventBinding>,
    #[serde(default, rename = "synchronizationservice")]
    pub synchronization_services: Vec<SynchronizationService>,
    #[serde(default, rename = "capability")]
    pub capabilities: Vec<String>,
}

impl Metadata {
    pub fn script_entries(&self) -> impl Iterator<Item = ScriptEntry<'_>> {
        self.scripts.iter().map(|script| ScriptEntry::classify(script))
    }
}

/// A metadata script entry, split by whether it must be fetched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEntry<'a> {
    Inline(&'a str),
    Resource(&'a str),
}

impl<'a> ScriptEntry<'a> {
    pub fn classify(entry: &'a str) -> Self {
        let trimmed = entry.trim();
        if trimmed.to_ascii_lowercase().ends_with(".js") && !trimmed.contains(char::is_whitespace)
        {
            ScriptEntry::Resource(trimmed)
        } else {
            ScriptEntry::Inline(entry)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InputEventBinding {
    pub input: String,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SynchronizationService {
    pub id: String,
    pub address: String,
    pub session: String,
    #[serde(rename = "type", default = "default_sync_transport")]
    pub transport: String,
}

pub fn default_sync_transport() -> String {
    "tcp".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(default)]
    pub effects: Effects,
    #[serde(default, rename = "entity")]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum Background {
    /// Named color keyword, `#RRGGBB`/`#RRGGBBAA`, or a relative texture URI.
    #[serde(rename = "color")]
    Color(String),
    #[serde(rename = "panorama")]
    Panorama(String),
    #[serde(rename = "liteproceduralsky")]
    LiteProceduralSky(ProceduralSky),
}

impl Background {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Background::Color(_) => "color",
            Background::Panorama(_) => "panorama",
            Background::LiteProceduralSky(_) => "liteproceduralsky",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProceduralSky {
    pub day_sky_color: Option<String>,
    pub horizon_color: Option<String>,
    pub night_sky_color: Option<String>,
    pub horizon_height: Option<f32>,
    pub sun_size: Option<f32>,
    pub enable_clouds: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct Effects {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lite_fog: Option<LiteFog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct LiteFog {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub density: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct Entity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_load_event: Option<String>,
    #[serde(default, rename = "placement-socket")]
    pub placement_sockets: Vec<PlacementSocket>,
    #[serde(default)]
    pub children: Vec<Entity>,
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(kind: EntityKind, tag: impl Into<String>, transform: Option<Transform>) -> Self {
        Self {
            id: None,
            tag: tag.into(),
            transform,
            synchronizer: None,
            on_load_event: None,
            placement_sockets: Vec::new(),
            children: Vec::new(),
            kind,
        }
    }

    pub fn with_children(mut self, children: Vec<Entity>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlacementSocket {
    pub position: Vec3,
    pub rotation: Quat,
    pub connecting_offset: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Transform {
    Scale {
        #[serde(default)]
        position: Vec3,
        #[serde(default)]
        rotation: Quat,
        #[serde(default = "Vec3::one")]
        scale: Vec3,
    },
    Size {
        #[serde(default)]
        position: Vec3,
        #[serde(default)]
        rotation: Quat,
        #[serde(default = "Vec3::one")]
        size: Vec3,
    },
    #[serde(rename_all = "kebab-case")]
    Canvas {
        #[serde(default)]
        position_percent: Vec2,
        #[serde(default)]
        size_percent: Vec2,
    },
}

impl Transform {
    pub fn identity_scale() -> Self {
        Transform::Scale {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn empty_canvas() -> Self {
        Transform::Canvas {
            position_percent: Vec2::ZERO,
            size_percent: Vec2::ZERO,
        }
    }

    pub fn kind(&self) -> TransformKind {
        match self {
            Transform::Scale { .. } => TransformKind::Scale,
            Transform::Size { .. } => TransformKind::Size,
            Transform::Canvas { .. } => TransformKind::Canvas,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Scale,
    Size,
    Canvas,
}

impl TransformKind {
    pub fn name(self) -> &'static str {
        match self {
            TransformKind::Scale => "scale",
            TransformKind::Size => "size",
            TransformKind::Canvas => "canvas",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum EntityKind {
    #[serde(rename = "entity")]
    Container,
    #[serde(rename = "meshentity")]
    Mesh(MeshPayload),
    #[serde(rename = "characterentity")]
    Character(CharacterPayload),
    #[serde(rename = "lightentity")]
    Light(LightPayload),
    #[serde(rename = "terrainentity")]
    Terrain(TerrainPayload),
    #[serde(rename = "textentity")]
    Text(TextPayload),
    #[serde(rename = "buttonentity")]
    Button(ButtonPayload),
    #[serde(rename = "canvasentity")]
    Canvas,
    #[serde(rename = "inputentity")]
    Input(InputPayload),
    #[serde(rename = "voxelentity")]
    Voxel,
    #[serde(rename = "htmlentity")]
    Html(HtmlPayload),
    #[serde(rename = "imageentity")]
    Image(ImagePayload),
    #[serde(rename = "audioentity")]
    Audio(AudioPayload),
    #[serde(rename = "waterentity")]
    Water(WaterPayload),
    #[serde(rename = "waterblockerentity")]
    WaterBlocker,
    #[serde(rename = "automobileentity")]
    Automobile(AutomobilePayload),
    #[serde(rename = "airplaneentity")]
    Airplane(AirplanePayload),
    #[serde(rename = "cubemeshentity")]
    CubeMesh(PrimitivePayload),
    #[serde(rename = "spheremeshentity")]
    SphereMesh(PrimitivePayload),
    #[serde(rename = "capsulemeshentity")]
    CapsuleMesh(PrimitivePayload),
    #[serde(rename = "cylindermeshentity")]
    CylinderMesh(PrimitivePayload),
    #[serde(rename = "conemeshentity")]
    ConeMesh(PrimitivePayload),
    #[serde(rename = "planemeshentity")]
    PlaneMesh(PrimitivePayload),
    #[serde(rename = "torusmeshentity")]
    TorusMesh(PrimitivePayload),
    #[serde(rename = "prismmeshentity")]
    PrismMesh(PrimitivePayload),
    #[serde(rename = "archmeshentity")]
    ArchMesh(PrimitivePayload),
}

impl EntityKind {
    /// The wire tag carried in the entity's `type` member.
    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::Container => "entity",
            EntityKind::Mesh(_) => "meshentity",
            EntityKind::Character(_) => "characterentity",
            EntityKind::Light(_) => "lightentity",
            EntityKind::Terrain(_) => "terrainentity",
            EntityKind::Text(_) => "textentity",
            EntityKind::Button(_) => "buttonentity",
            EntityKind::Canvas => "canvasentity",
            EntityKind::Input(_) => "inputentity",
            EntityKind::Voxel => "voxelentity",
            EntityKind::Html(_) => "htmlentity",
            EntityKind::Image(_) => "imageentity",
            EntityKind::Audio(_) => "audioentity",
            EntityKind::Water(_) => "waterentity",
            EntityKind::WaterBlocker => "waterblockerentity",
            EntityKind::Automobile(_) => "automobileentity",
            EntityKind::Airplane(_) => "airplaneentity",
            EntityKind::CubeMesh(_) => "cubemeshentity",
            EntityKind::SphereMesh(_) => "spheremeshentity",
            EntityKind::CapsuleMesh(_) => "capsulemeshentity",
            EntityKind::CylinderMesh(_) => "cylindermeshentity",
            EntityKind::ConeMesh(_) => "conemeshentity",
            EntityKind::PlaneMesh(_) => "planemeshentity",
            EntityKind::TorusMesh(_) => "torusmeshentity",
            EntityKind::PrismMesh(_) => "prismmeshentity",
            EntityKind::ArchMesh(_) => "archmeshentity",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct MeshPayload {
    pub mesh_name: Option<String>,
    pub mesh_resource: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct CharacterPayload {
    pub mesh_name: Option<String>,
    pub mesh_resource: Option<Vec<String>>,
    pub mesh_offset: Option<Vec3>,
    pub mesh_rotation: Option<Quat>,
    pub label_offset: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    Point,
    Spot,
    Directional,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct LightPayload {
    pub light_type: Option<LightType>,
    pub color: Option<String>,
    pub intensity: Option<f32>,
    pub range: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TerrainType {
    Heightmap,
    Hybrid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct TerrainPayload {
    pub terrain_type: Option<TerrainType>,
    pub length: f32,
    pub width: f32,
    pub height: f32,
    /// `;`-separated rows of `,`-separated height samples.
    pub heights: Option<String>,
    pub layers: Vec<TerrainLayer>,
    /// One grid per layer, separated by `|`.
    pub layer_masks: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct TerrainLayer {
    pub diffuse_texture: Option<String>,
    pub normal_texture: Option<String>,
    pub mask_texture: Option<String>,
    pub specular: Option<String>,
    pub metallic: f32,
    pub smoothness: f32,
    pub size_factor: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct TextPayload {
    pub text: Option<String>,
    pub font_size: Option<u32>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct ButtonPayload {
    pub on_click_event: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct InputPayload {
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct HtmlPayload {
    pub url: Option<String>,
    pub on_message_event: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImagePayload {
    pub image_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct AudioPayload {
    pub audio_file: Option<String>,
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub volume: Option<f32>,
    pub pitch: Option<f32>,
    pub pan: Option<f32>,
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct WaterPayload {
    pub shallow_color: Option<String>,
    pub deep_color: Option<String>,
    pub wave_height: Option<f32>,
    pub wave_speed: Option<f32>,
    pub smoothness: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct AutomobileWheel {
    pub submesh: String,
    pub radius: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct AutomobilePayload {
    pub mesh_name: Option<String>,
    pub mesh_resource: Option<Vec<String>>,
    pub wheels: Vec<AutomobileWheel>,
    pub mass: Option<f32>,
    pub automobile_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct AirplanePayload {
    pub mesh_name: Option<String>,
    pub mesh_resource: Option<Vec<String>>,
    pub mass: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct PrimitivePayload {
    pub color: Option<String>,
}
