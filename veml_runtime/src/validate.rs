//! Required-field and transform compatibility checks on canonical documents.
//!
//! Validation stops at the first failure; a failed document is not loaded.

use std::fmt;

use thiserror::Error;
use veml_schema::{Document, Entity, EntityKind, Transform, TransformKind};

use crate::csv_grid::{decode_grid, decode_layer_masks, GridError};
use crate::flatten::EntityGraph;
use crate::forest::walk_breadth_first;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'{}", entity_suffix(.entity))]
    MissingRequiredField {
        field: &'static str,
        entity: Option<String>,
    },
    #[error("entity '{entity}' of kind {kind} cannot use a {transform} transform (allowed: {allowed})")]
    IncompatibleTransform {
        entity: String,
        kind: &'static str,
        transform: &'static str,
        allowed: TransformRule,
    },
    #[error("entity '{entity}' has an invalid {field} grid: {source}")]
    InvalidGrid {
        entity: String,
        field: &'static str,
        #[source]
        source: GridError,
    },
}

fn entity_suffix(entity: &Option<String>) -> String {
    entity
        .as_ref()
        .map(|entity| format!(" on entity '{entity}'"))
        .unwrap_or_default()
}

/// Transform kinds an entity kind may be placed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformRule {
    CanvasOnly,
    ScaleOnly,
    /// Scale or size, never canvas.
    Spatial,
    Any,
}

impl TransformRule {
    pub fn for_kind(kind: &EntityKind) -> Self {
        match kind {
            EntityKind::Text(_)
            | EntityKind::Button(_)
            | EntityKind::Input(_)
            | EntityKind::Canvas => TransformRule::CanvasOnly,
            EntityKind::Container
            | EntityKind::Mesh(_)
            | EntityKind::Light(_)
            | EntityKind::Voxel
            | EntityKind::CubeMesh(_)
            | EntityKind::SphereMesh(_)
            | EntityKind::CapsuleMesh(_)
            | EntityKind::CylinderMesh(_)
            | EntityKind::ConeMesh(_)
            | EntityKind::PlaneMesh(_)
            | EntityKind::TorusMesh(_)
            | EntityKind::PrismMesh(_)
            | EntityKind::ArchMesh(_) => TransformRule::ScaleOnly,
            EntityKind::Character(_)
            | EntityKind::Terrain(_)
            | EntityKind::Audio(_)
            | EntityKind::Water(_)
            | EntityKind::WaterBlocker
            | EntityKind::Automobile(_)
            | EntityKind::Airplane(_) => TransformRule::Spatial,
            EntityKind::Image(_) | EntityKind::Html(_) => TransformRule::Any,
        }
    }

    pub fn allows(self, transform: TransformKind) -> bool {
        match self {
            TransformRule::CanvasOnly => transform == TransformKind::Canvas,
            TransformRule::ScaleOnly => transform == TransformKind::Scale,
            TransformRule::Spatial => transform != TransformKind::Canvas,
            TransformRule::Any => true,
        }
    }
}

impl fmt::Display for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransformRule::CanvasOnly => "canvas",
            TransformRule::ScaleOnly => "scale",
            TransformRule::Spatial => "scale or size",
            TransformRule::Any => "any",
        };
        f.write_str(text)
    }
}

/// Validates metadata, environment and every flattened entity in flatten order.
pub fn validate(document: &Document, graph: &EntityGraph) -> Result<(), ValidationError> {
    validate_header(document)?;
    graph
        .iter()
        .try_for_each(|entry| validate_entity(&entry.entity))
}

/// Same checks as [`validate`], walking the nested forest directly.
pub fn validate_document(document: &Document) -> Result<(), ValidationError> {
    validate_header(document)?;
    walk_breadth_first(&document.environment.entities)
        .try_for_each(|(entity, _)| validate_entity(entity))
}

fn validate_header(document: &Document) -> Result<(), ValidationError> {
    let title_present = document
        .metadata
        .title
        .as_deref()
        .is_some_and(|title| !title.trim().is_empty());
    if !title_present {
        return Err(ValidationError::MissingRequiredField {
            field: "metadata.title",
            entity: None,
        });
    }
    if document.environment.background.is_none() {
        return Err(ValidationError::MissingRequiredField {
            field: "environment.background",
            entity: None,
        });
    }
    Ok(())
}

pub fn validate_entity(entity: &Entity) -> Result<(), ValidationError> {
    if entity.tag.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "tag",
            entity: entity.id.map(|id| id.to_string()),
        });
    }
    let missing = |field: &'static str| ValidationError::MissingRequiredField {
        field,
        entity: Some(entity.tag.clone()),
    };

    let transform: &Transform = entity.transform.as_ref().ok_or_else(|| missing("transform"))?;
    let rule = TransformRule::for_kind(&entity.kind);
    if !rule.allows(transform.kind()) {
        return Err(ValidationError::IncompatibleTransform {
            entity: entity.tag.clone(),
            kind: entity.kind.tag(),
            transform: transform.kind().name(),
            allowed: rule,
        });
    }

    match &entity.kind {
        EntityKind::Mesh(mesh) => {
            let resources_present = mesh
                .mesh_resource
                .as_ref()
                .is_some_and(|resources| !resources.is_empty());
            if !resources_present {
                return Err(missing("mesh-resource"));
            }
            let name_present = mesh
                .mesh_name
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty());
            if !name_present {
                return Err(missing("mesh-name"));
            }
        }
        EntityKind::Terrain(terrain) => {
            let invalid = |field: &'static str| {
                let tag = entity.tag.clone();
                move |source| ValidationError::InvalidGrid {
                    entity: tag,
                    field,
                    source,
                }
            };
            if let Some(heights) = &terrain.heights {
                decode_grid(heights).map_err(invalid("heights"))?;
            }
            if let Some(masks) = &terrain.layer_masks {
                decode_layer_masks(masks).map_err(invalid("layer-masks"))?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::assign_and_flatten;
    use veml_schema::{
        Background, Environment, MeshPayload, Metadata, TerrainPayload, TextPayload,
    };

    fn document(entities: Vec<Entity>) -> Document {
        Document::new(
            Metadata {
                title: Some("Room".to_string()),
                ..Metadata::default()
            },
            Environment {
                background: Some(Background::Color("black".to_string())),
                entities,
                ..Environment::default()
            },
        )
    }

    fn mesh(tag: &str) -> Entity {
        Entity::new(
            EntityKind::Mesh(MeshPayload {
                mesh_name: Some("Chair".to_string()),
                mesh_resource: Some(vec!["chair.glb".to_string(), "chair.bin".to_string()]),
            }),
            tag,
            Some(Transform::identity_scale()),
        )
    }

    fn check(mut document: Document) -> Result<(), ValidationError> {
        let graph = assign_and_flatten(&mut document.environment.entities).unwrap();
        validate(&document, &graph)
    }

    #[test]
    fn accepts_minimal_valid_document() {
        check(document(vec![mesh("chair")])).unwrap();
        validate_document(&document(vec![mesh("chair")])).unwrap();
    }

    #[test]
    fn missing_title_and_background() {
        let mut doc = document(vec![]);
        doc.metadata.title = Some("  ".to_string());
        let err = check(doc).expect_err("blank title");
        assert!(err.to_string().contains("metadata.title"));

        let mut doc = document(vec![]);
        doc.environment.background = None;
        let err = check(doc).expect_err("no background");
        assert!(matches!(
            err,
            ValidationError::MissingRequiredField {
                field: "environment.background",
                ..
            }
        ));
    }

    #[test]
    fn text_with_scale_transform_is_incompatible() {
        let label = Entity::new(
            EntityKind::Text(TextPayload::default()),
            "label",
            Some(Transform::identity_scale()),
        );
        let root = Entity::new(EntityKind::Container, "root", Some(Transform::identity_scale()))
            .with_children(vec![mesh("chair"), label]);
        let err = check(document(vec![root])).expect_err("text requires canvas");
        match err {
            ValidationError::IncompatibleTransform {
                entity,
                kind,
                transform,
                allowed,
            } => {
                assert_eq!(entity, "label");
                assert_eq!(kind, "textentity");
                assert_eq!(transform, "scale");
                assert_eq!(allowed, TransformRule::CanvasOnly);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn container_rejects_size_transform() {
        let boxed = Entity::new(
            EntityKind::Container,
            "group",
            Some(Transform::Size {
                position: Default::default(),
                rotation: Default::default(),
                size: veml_schema::Vec3::ONE,
            }),
        );
        assert!(matches!(
            check(document(vec![boxed])),
            Err(ValidationError::IncompatibleTransform { .. })
        ));
    }

    #[test]
    fn missing_transform_and_tag() {
        let mut untransformed = mesh("floating");
        untransformed.transform = None;
        let err = check(document(vec![untransformed])).expect_err("no transform");
        assert!(err.to_string().contains("floating"));

        let untagged = mesh("");
        let err = check(document(vec![untagged])).expect_err("no tag");
        assert!(matches!(
            err,
            ValidationError::MissingRequiredField { field: "tag", entity: Some(_) }
        ));
    }

    #[test]
    fn mesh_requires_resources_and_name() {
        let mut no_resources = mesh("crate");
        no_resources.kind = EntityKind::Mesh(MeshPayload {
            mesh_name: Some("Crate".to_string()),
            mesh_resource: Some(Vec::new()),
        });
        assert!(matches!(
            check(document(vec![no_resources])),
            Err(ValidationError::MissingRequiredField { field: "mesh-resource", .. })
        ));

        let mut no_name = mesh("crate");
        no_name.kind = EntityKind::Mesh(MeshPayload {
            mesh_name: None,
            mesh_resource: Some(vec!["crate.glb".to_string()]),
        });
        assert!(matches!(
            check(document(vec![no_name])),
            Err(ValidationError::MissingRequiredField { field: "mesh-name", .. })
        ));
    }

    #[test]
    fn terrain_grids_must_decode() {
        let terrain = Entity::new(
            EntityKind::Terrain(TerrainPayload {
                heights: Some("0,1;1,oops".to_string()),
                ..TerrainPayload::default()
            }),
            "ground",
            Some(Transform::identity_scale()),
        );
        let err = check(document(vec![terrain])).expect_err("bad height cell");
        assert!(matches!(
            err,
            ValidationError::InvalidGrid { field: "heights", .. }
        ));
    }
}
