//! Breadth-first traversal helpers for nested entity forests.
//!
//! All walks use an explicit queue so adversarially deep documents cannot
//! exhaust the stack.

use std::collections::VecDeque;

use veml_schema::{Entity, RawEntity};

pub trait TreeNode: Sized {
    fn children(&self) -> &[Self];
    fn children_mut(&mut self) -> &mut Vec<Self>;
}

impl TreeNode for Entity {
    fn children(&self) -> &[Self] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

impl TreeNode for RawEntity {
    fn children(&self) -> &[Self] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

/// Rebuilds a forest node by node in breadth-first order, converting each node
/// without its children and re-parenting the converted nodes afterwards.
///
/// Child order within every parent is preserved.
pub fn map_forest<S, T, E, F>(roots: Vec<S>, mut convert: F) -> Result<Vec<T>, E>
where
    S: TreeNode,
    T: TreeNode,
    F: FnMut(S) -> Result<T, E>,
{
    let mut arena: Vec<(T, Option<usize>)> = Vec::new();
    let mut queue: VecDeque<(S, Option<usize>)> =
        roots.into_iter().map(|root| (root, None)).collect();

    while let Some((mut node, parent)) = queue.pop_front() {
        let children = std::mem::take(node.children_mut());
        let index = arena.len();
        arena.push((convert(node)?, parent));
        queue.extend(children.into_iter().map(|child| (child, Some(index))));
    }

    // Descendants always sit at higher indices than their ancestors, so
    // draining from the back completes every subtree before it is attached.
    let mut pending: Vec<Vec<T>> = Vec::with_capacity(arena.len());
    pending.resize_with(arena.len(), Vec::new);
    let mut rebuilt = Vec::new();
    while let Some((mut node, parent)) = arena.pop() {
        let index = arena.len();
        let mut children = std::mem::take(&mut pending[index]);
        children.reverse();
        *node.children_mut() = children;
        match parent {
            Some(parent) => pending[parent].push(node),
            None => rebuilt.push(node),
        }
    }
    rebuilt.reverse();
    Ok(rebuilt)
}

/// Visits every node breadth-first together with its parent.
pub fn walk_breadth_first<T: TreeNode>(roots: &[T]) -> BreadthFirst<'_, T> {
    BreadthFirst {
        queue: roots.iter().map(|root| (root, None)).collect(),
    }
}

pub struct BreadthFirst<'a, T> {
    queue: VecDeque<(&'a T, Option<&'a T>)>,
}

impl<'a, T: TreeNode> Iterator for BreadthFirst<'a, T> {
    type Item = (&'a T, Option<&'a T>);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, parent) = self.queue.pop_front()?;
        self.queue
            .extend(node.children().iter().map(|child| (child, Some(node))));
        Some((node, parent))
    }
}

pub fn count_nodes<T: TreeNode>(roots: &[T]) -> usize {
    walk_breadth_first(roots).count()
}
