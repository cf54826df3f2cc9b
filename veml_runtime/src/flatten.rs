//! Identifier assignment and breadth-first flattening of the entity forest.

use std::collections::VecDeque;

use ahash::AHashMap;
use thiserror::Error;
use uuid::Uuid;
use veml_schema::Entity;

use crate::forest::walk_breadth_first;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("entity '{tag}' has no id")]
    MissingId { tag: String },
    #[error("duplicate entity id {id} (second occurrence on '{tag}')")]
    DuplicateId { id: Uuid, tag: String },
}

/// Gives every entity without an id a fresh random UUID. Existing ids are
/// kept, so running this twice changes nothing the second time. Returns the
/// number of ids assigned.
pub fn assign_ids(roots: &mut [Entity]) -> usize {
    assign_ids_with(roots, Uuid::new_v4)
}

pub fn assign_ids_with<F>(roots: &mut [Entity], mut generate: F) -> usize
where
    F: FnMut() -> Uuid,
{
    let mut assigned = 0;
    let mut queue: VecDeque<&mut Entity> = roots.iter_mut().collect();
    while let Some(entity) = queue.pop_front() {
        if entity.id.is_none() {
            entity.id = Some(generate());
            assigned += 1;
        }
        queue.extend(entity.children.iter_mut());
    }
    assigned
}

/// One entity of the flattened forest. `entity` is a copy of the node
/// without its children.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntity {
    pub id: Uuid,
    pub parent: Option<Uuid>,
    pub depth: usize,
    pub entity: Entity,
}

/// Flattened forest in breadth-first discovery order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entries: Vec<FlatEntity>,
    index: AHashMap<Uuid, usize>,
}

impl EntityGraph {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlatEntity> {
        self.entries.iter()
    }

    pub fn get(&self, id: &Uuid) -> Option<&FlatEntity> {
        self.index.get(id).map(|&slot| &self.entries[slot])
    }

    pub fn parent_of(&self, id: &Uuid) -> Option<Uuid> {
        self.get(id).and_then(|entry| entry.parent)
    }

    pub fn roots(&self) -> impl Iterator<Item = &FlatEntity> {
        self.entries.iter().filter(|entry| entry.parent.is_none())
    }

    /// Ids in flatten order.
    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }
}

impl<'a> IntoIterator for &'a EntityGraph {
    type Item = &'a FlatEntity;
    type IntoIter = std::slice::Iter<'a, FlatEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub fn flatten(roots: &[Entity]) -> Result<EntityGraph, FlattenError> {
    let mut graph = EntityGraph::default();
    let mut depths: AHashMap<Uuid, usize> = AHashMap::new();

    for (entity, parent) in walk_breadth_first(roots) {
        let id = entity.id.ok_or_else(|| FlattenError::MissingId {
            tag: entity.tag.clone(),
        })?;
        // Parents are always recorded before their children.
        let parent = parent.and_then(|parent| parent.id);
        let depth = parent
            .and_then(|parent| depths.get(&parent))
            .map_or(0, |depth| depth + 1);

        if graph.index.contains_key(&id) {
            return Err(FlattenError::DuplicateId {
                id,
                tag: entity.tag.clone(),
            });
        }
        graph.index.insert(id, graph.entries.len());
        depths.insert(id, depth);
        graph.entries.push(FlatEntity {
            id,
            parent,
            depth,
            entity: detached(entity),
        });
    }
    Ok(graph)
}

/// Assigns missing ids in place, then flattens.
pub fn assign_and_flatten(roots: &mut [Entity]) -> Result<EntityGraph, FlattenError> {
    assign_ids(roots);
    flatten(roots)
}

fn detached(entity: &Entity) -> Entity {
    Entity {
        id: entity.id,
        tag: entity.tag.clone(),
        transform: entity.transform,
        synchronizer: entity.synchronizer.clone(),
        on_load_event: entity.on_load_event.clone(),
        placement_sockets: entity.placement_sockets.clone(),
        children: Vec::new(),
        kind: entity.kind.clone(),
    }
}
