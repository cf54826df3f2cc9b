//! Table-driven forward migration between schema revisions.
//!
//! One generic step function applies a [`MigrationStep`] row to a
//! [`VersionedDocument`]; chaining it from the detected revision reaches the
//! canonical revision without skipping any intermediate one. The result is
//! then lowered into the typed canonical [`Document`].

mod lower;
mod profile;
mod table;

pub use profile::{profile, VersionProfile};
pub use table::{
    step_from, DefaultValue, FieldChange, MigrationStep, TransformNames, BASE_KIND,
    FALLBACK_BACKGROUND_COLOR, STEPS, UI_KINDS,
};

use serde_json::{Map as JsonMap, Value as JsonValue};
use veml_schema::{Document, RawEntity, RawTransform, SchemaVersion, TransformKind, VersionedDocument};

use crate::error::{MigrationError, MigrationWarning};
use crate::forest::map_forest;

/// A document brought to the canonical revision.
#[derive(Debug, Clone)]
pub struct Migration {
    pub document: Document,
    pub source_version: SchemaVersion,
    pub warnings: Vec<MigrationWarning>,
}

impl Migration {
    pub fn steps_applied(&self) -> usize {
        SchemaVersion::CANONICAL.index() - self.source_version.index()
    }
}

/// Advances `document` by exactly one revision. Canonical documents are
/// returned unchanged.
pub fn migrate_step(
    document: VersionedDocument,
    warnings: &mut Vec<MigrationWarning>,
) -> VersionedDocument {
    let Some(step) = step_from(document.version) else {
        return document;
    };
    let source = profile(step.from);
    let target = profile(step.to);

    let VersionedDocument {
        mut metadata,
        mut environment,
        ..
    } = document;

    for service in &mut metadata.synchronization_services {
        if !source.sync_transport {
            service.transport = None;
        }
        if let Some(default) = step.sync_transport_default {
            service.transport.get_or_insert_with(|| default.to_string());
        }
    }

    if let Some(background) = environment.background.take() {
        environment.background = Some(carry_background(background, source, warnings));
    }

    let entities = std::mem::take(&mut environment.entities);
    environment.entities = map_forest(entities, |entity| {
        Ok::<_, std::convert::Infallible>(migrate_entity(entity, step, source, target, warnings))
    })
    .unwrap_or_else(|never| match never {});

    VersionedDocument {
        version: step.to,
        namespace: step.to.namespace(),
        metadata,
        environment,
    }
}

/// Chains [`migrate_step`] until the canonical revision is reached.
pub fn migrate_to_latest(
    mut document: VersionedDocument,
    warnings: &mut Vec<MigrationWarning>,
) -> VersionedDocument {
    while !document.version.is_canonical() {
        document = migrate_step(document, warnings);
    }
    document
}

/// Migrates to the canonical revision and lowers into the typed model.
pub fn migrate_to_canonical(document: VersionedDocument) -> Result<Migration, MigrationError> {
    let source_version = document.version;
    let mut warnings = Vec::new();
    let latest = migrate_to_latest(document, &mut warnings);
    let document = lower::lower_document(latest, &mut warnings)?;
    Ok(Migration {
        document,
        source_version,
        warnings,
    })
}

fn migrate_entity(
    mut entity: RawEntity,
    step: &MigrationStep,
    source: &VersionProfile,
    target: &VersionProfile,
    warnings: &mut Vec<MigrationWarning>,
) -> RawEntity {
    let tag = entity.tag.clone().unwrap_or_default();

    if !source.knows_kind(&entity.kind) {
        warnings.push(MigrationWarning::UnknownEntityKind {
            version: source.version,
            tag: tag.clone(),
            kind: entity.kind.clone(),
        });
        entity.kind = BASE_KIND.to_string();
        entity.payload.clear();
    }

    let kind = entity.kind.clone();
    let mut payload = std::mem::take(&mut entity.payload);
    payload.retain(|field, _| source.knows_field(&kind, field));

    for rename in step.field_renames.iter().filter(|rename| rename.kind == kind) {
        if let Some(value) = payload.remove(rename.from) {
            payload.insert(rename.to.to_string(), value);
        }
    }
    for conversion in step
        .field_conversions
        .iter()
        .filter(|conversion| conversion.kind == kind)
    {
        if let Some(value) = payload.remove(conversion.field) {
            if let Some(converted) = convert_field(value, conversion.change) {
                payload.insert(conversion.field.to_string(), converted);
            }
        }
    }

    let mut migrated = JsonMap::new();
    for field in target.fields(&kind).unwrap_or_default() {
        if let Some(value) = payload.remove(*field) {
            migrated.insert(field.to_string(), value);
        } else if let Some(default) = step.introduced_default(&kind, field) {
            migrated.insert(field.to_string(), default_value(default));
        }
    }
    entity.payload = migrated;

    entity.transform = entity
        .transform
        .take()
        .map(|transform| migrate_transform(transform, &kind, &tag, step, source, target, warnings));
    entity
}

fn migrate_transform(
    transform: RawTransform,
    entity_kind: &str,
    tag: &str,
    step: &MigrationStep,
    source: &VersionProfile,
    target: &VersionProfile,
    warnings: &mut Vec<MigrationWarning>,
) -> RawTransform {
    let Some(kind) = source.transforms.kind_of(&transform.kind) else {
        warnings.push(MigrationWarning::UnknownTransform {
            version: source.version,
            tag: tag.to_string(),
            kind: transform.kind,
        });
        return RawTransform {
            kind: target.transforms.name(generic_transform(entity_kind)).to_string(),
            fields: JsonMap::new(),
        };
    };

    let mut fields = transform.fields;
    for rename in step
        .transform_field_renames
        .iter()
        .filter(|rename| rename.transform == kind)
    {
        if let Some(value) = fields.remove(rename.from) {
            fields.insert(rename.to.to_string(), value);
        }
    }
    RawTransform {
        kind: target.transforms.name(kind).to_string(),
        fields,
    }
}

/// Transform substituted when an entity's transform cannot be recognized.
pub fn generic_transform(entity_kind: &str) -> TransformKind {
    if UI_KINDS.contains(&entity_kind) {
        TransformKind::Canvas
    } else {
        TransformKind::Scale
    }
}

fn carry_background(
    background: JsonMap<String, JsonValue>,
    source: &VersionProfile,
    warnings: &mut Vec<MigrationWarning>,
) -> JsonMap<String, JsonValue> {
    match single_variant(&background) {
        Some(variant) if source.knows_background(variant) => background,
        _ => {
            warnings.push(MigrationWarning::UnknownBackground {
                version: source.version,
                variant: describe_variant(&background),
            });
            fallback_background()
        }
    }
}

pub(crate) fn single_variant(background: &JsonMap<String, JsonValue>) -> Option<&str> {
    let mut keys = background.keys();
    match (keys.next(), keys.next()) {
        (Some(variant), None) => Some(variant.as_str()),
        _ => None,
    }
}

pub(crate) fn describe_variant(background: &JsonMap<String, JsonValue>) -> String {
    background.keys().cloned().collect::<Vec<_>>().join("+")
}

pub(crate) fn fallback_background() -> JsonMap<String, JsonValue> {
    let mut map = JsonMap::new();
    map.insert(
        "color".to_string(),
        JsonValue::String(FALLBACK_BACKGROUND_COLOR.to_string()),
    );
    map
}

fn convert_field(value: JsonValue, change: FieldChange) -> Option<JsonValue> {
    match change {
        FieldChange::WrapInList => match value {
            JsonValue::Null => None,
            JsonValue::Array(_) => Some(value),
            other => Some(JsonValue::Array(vec![other])),
        },
    }
}

fn default_value(default: DefaultValue) -> JsonValue {
    match default {
        DefaultValue::Bool(value) => JsonValue::Bool(value),
        DefaultValue::Integer(value) => JsonValue::from(value),
        DefaultValue::Number(value) => JsonValue::from(value),
        DefaultValue::Text(value) => JsonValue::String(value.to_string()),
        DefaultValue::EmptyList => JsonValue::Array(Vec::new()),
    }
}
