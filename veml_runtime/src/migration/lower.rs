//! Conversion of a canonical-revision [`VersionedDocument`] into the typed
//! [`Document`] model.

use serde_json::{Map as JsonMap, Value as JsonValue};
use veml_schema::{
    default_sync_transport, Background, Document, Effects, Entity, EntityKind, Environment,
    Metadata, RawEntity, RawMetadata, RawTransform, SchemaVersion, SynchronizationService,
    Transform, VersionedDocument,
};

use super::{
    describe_variant, fallback_background, generic_transform, profile, single_variant,
    VersionProfile,
};
use crate::error::{MigrationError, MigrationWarning};
use crate::forest::map_forest;

pub(super) fn lower_document(
    document: VersionedDocument,
    warnings: &mut Vec<MigrationWarning>,
) -> Result<Document, MigrationError> {
    debug_assert!(document.version.is_canonical());
    let canonical = profile(SchemaVersion::CANONICAL);
    let environment = document.environment;

    let background = environment
        .background
        .map(|background| lower_background(background, canonical, warnings))
        .transpose()?;
    let effects = match environment.effects {
        Some(effects) => {
            serde_json::from_value::<Effects>(effects).map_err(MigrationError::InvalidEffects)?
        }
        None => Effects::default(),
    };
    let entities = map_forest(environment.entities, |entity| {
        lower_entity(entity, canonical, warnings)
    })?;

    Ok(Document::new(
        lower_metadata(document.metadata),
        Environment {
            background,
            effects,
            entities,
        },
    ))
}

fn lower_metadata(metadata: RawMetadata) -> Metadata {
    Metadata {
        title: metadata.title,
        scripts: metadata.scripts,
        input_events: metadata.input_events,
        synchronization_services: metadata
            .synchronization_services
            .into_iter()
            .map(|service| SynchronizationService {
                id: service.id,
                address: service.address,
                session: service.session,
                transport: service.transport.unwrap_or_else(default_sync_transport),
            })
            .collect(),
        capabilities: metadata.capabilities,
    }
}

fn lower_background(
    background: JsonMap<String, JsonValue>,
    canonical: &VersionProfile,
    warnings: &mut Vec<MigrationWarning>,
) -> Result<Background, MigrationError> {
    let background = match single_variant(&background) {
        Some(variant) if canonical.knows_background(variant) => background,
        _ => {
            warnings.push(MigrationWarning::UnknownBackground {
                version: canonical.version,
                variant: describe_variant(&background),
            });
            fallback_background()
        }
    };
    serde_json::from_value(JsonValue::Object(background)).map_err(MigrationError::InvalidBackground)
}

fn lower_entity(
    entity: RawEntity,
    canonical: &VersionProfile,
    warnings: &mut Vec<MigrationWarning>,
) -> Result<Entity, MigrationError> {
    let tag = entity.tag.unwrap_or_default();

    let kind = if canonical.knows_kind(&entity.kind) {
        let mut object = entity.payload;
        object.insert("type".to_string(), JsonValue::String(entity.kind.clone()));
        serde_json::from_value::<EntityKind>(JsonValue::Object(object)).map_err(|source| {
            MigrationError::InvalidPayload {
                tag: tag.clone(),
                kind: entity.kind.clone(),
                source,
            }
        })?
    } else {
        warnings.push(MigrationWarning::UnknownEntityKind {
            version: canonical.version,
            tag: tag.clone(),
            kind: entity.kind.clone(),
        });
        EntityKind::Container
    };

    let transform = entity
        .transform
        .map(|transform| lower_transform(transform, kind.tag(), &tag, canonical, warnings))
        .transpose()?;

    Ok(Entity {
        id: entity.id,
        tag,
        transform,
        synchronizer: entity.synchronizer,
        on_load_event: entity.on_load_event,
        placement_sockets: entity.placement_sockets,
        children: Vec::new(),
        kind,
    })
}

fn lower_transform(
    transform: RawTransform,
    entity_kind: &str,
    tag: &str,
    canonical: &VersionProfile,
    warnings: &mut Vec<MigrationWarning>,
) -> Result<Transform, MigrationError> {
    let (kind, mut fields) = match canonical.transforms.kind_of(&transform.kind) {
        Some(kind) => (kind, transform.fields),
        None => {
            warnings.push(MigrationWarning::UnknownTransform {
                version: canonical.version,
                tag: tag.to_string(),
                kind: transform.kind,
            });
            (generic_transform(entity_kind), JsonMap::new())
        }
    };
    fields.insert(
        "type".to_string(),
        JsonValue::String(kind.name().to_string()),
    );
    serde_json::from_value(JsonValue::Object(fields)).map_err(|source| {
        MigrationError::InvalidTransform {
            tag: tag.to_string(),
            kind: kind.name().to_string(),
            source,
        }
    })
}
