// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Component Tree
//!
//! Arena-indexed hierarchy of components. Every node except the root has
//! exactly one parent; children are kept in insertion order and indexed by
//! name. A node's full name is fixed when it is attached.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Parent/child structure, per-node domain and phase state

use crate::domain::object::Component;
use crate::domain::phase::{PhaseId, PhaseImp};
use crate::domain::report::{ids, Verbosity};
use crate::domain::schedule::DomainId;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Index of a node in the [`ComponentTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// The implicit top of every hierarchy.
    pub const ROOT: ComponentId = ComponentId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Name of the root node. Its full name is empty so children are addressed
/// by their own name.
pub const ROOT_NAME: &str = "__top__";

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Cannot add a child named '{name}' to '{parent}': a different component already uses that name")]
    NameCollision { parent: String, name: String },

    #[error("Component '{existing}' cannot be added to '{parent}' as '{name}': it already has a parent")]
    AlreadyChild {
        parent: String,
        name: String,
        existing: String,
    },

    #[error("Illegal component name '{0}': names must be non-empty and may not contain '.'")]
    InvalidName(String),

    #[error("Unknown component id {0:?}")]
    UnknownComponent(ComponentId),
}

impl TreeError {
    /// Report category for this error.
    pub fn report_id(&self) -> &'static str {
        match self {
            TreeError::NameCollision { .. } => ids::BDCLD,
            TreeError::AlreadyChild { .. } => ids::BDCHLD,
            TreeError::InvalidName(_) => ids::INVCHR,
            TreeError::UnknownComponent(_) => ids::BDCLD,
        }
    }
}

/// Placeholder behaviour for the root node.
pub struct RootComponent;

impl Component for RootComponent {
    fn type_name(&self) -> &'static str {
        "tb_root"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct TreeNode {
    pub component: Arc<dyn Component>,
    pub name: String,
    pub full_name: String,
    pub parent: Option<ComponentId>,
    pub children: Vec<ComponentId>,
    children_by_name: HashMap<String, ComponentId>,
    pub domain: DomainId,
    /// Per-phase implementation overrides, keyed by phase name.
    pub phase_imps: HashMap<String, Arc<dyn PhaseImp>>,
    /// Set while the node is between `STARTED` and `ENDED` of a phase.
    pub current_phase: Option<PhaseId>,
    pub verbosity: Verbosity,
}

impl TreeNode {
    pub fn child(&self, name: &str) -> Option<ComponentId> {
        self.children_by_name.get(name).copied()
    }
}

fn identity(component: &Arc<dyn Component>) -> usize {
    Arc::as_ptr(component) as *const () as usize
}

pub struct ComponentTree {
    nodes: Vec<TreeNode>,
    by_identity: HashMap<usize, ComponentId>,
}

impl ComponentTree {
    pub fn new(domain: DomainId, verbosity: Verbosity) -> Self {
        let root: Arc<dyn Component> = Arc::new(RootComponent);
        let mut by_identity = HashMap::new();
        by_identity.insert(identity(&root), ComponentId::ROOT);

        Self {
            nodes: vec![TreeNode {
                component: root,
                name: ROOT_NAME.to_string(),
                full_name: String::new(),
                parent: None,
                children: Vec::new(),
                children_by_name: HashMap::new(),
                domain,
                phase_imps: HashMap::new(),
                current_phase: None,
                verbosity,
            }],
            by_identity,
        }
    }

    /// Attach `component` under `parent` as `name`. The child inherits the
    /// parent's domain and verbosity.
    ///
    /// Attaching the same instance under the same name again returns the
    /// existing id.
    pub fn add_child(
        &mut self,
        parent: ComponentId,
        name: &str,
        component: Arc<dyn Component>,
    ) -> Result<ComponentId, TreeError> {
        if name.is_empty() || name.contains('.') {
            return Err(TreeError::InvalidName(name.to_string()));
        }

        let parent_node = self.get(parent).ok_or(TreeError::UnknownComponent(parent))?;
        let key = identity(&component);

        if let Some(existing) = parent_node.child(name) {
            if self.by_identity.get(&key) == Some(&existing) {
                return Ok(existing);
            }
            return Err(TreeError::NameCollision {
                parent: self.display_name(parent),
                name: name.to_string(),
            });
        }

        if let Some(existing) = self.by_identity.get(&key) {
            return Err(TreeError::AlreadyChild {
                parent: self.display_name(parent),
                name: name.to_string(),
                existing: self.display_name(*existing),
            });
        }

        let full_name = if parent_node.full_name.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", parent_node.full_name, name)
        };
        let domain = parent_node.domain;
        let verbosity = parent_node.verbosity;

        let id = ComponentId(self.nodes.len());
        self.nodes.push(TreeNode {
            component,
            name: name.to_string(),
            full_name,
            parent: Some(parent),
            children: Vec::new(),
            children_by_name: HashMap::new(),
            domain,
            phase_imps: HashMap::new(),
            current_phase: None,
            verbosity,
        });
        self.by_identity.insert(key, id);

        let parent_node = &mut self.nodes[parent.0];
        parent_node.children.push(id);
        parent_node.children_by_name.insert(name.to_string(), id);

        Ok(id)
    }

    pub fn get(&self, id: ComponentId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn component(&self, id: ComponentId) -> Option<Arc<dyn Component>> {
        self.get(id).map(|n| n.component.clone())
    }

    pub fn children(&self, id: ComponentId) -> Vec<ComponentId> {
        self.get(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn full_name(&self, id: ComponentId) -> String {
        self.get(id).map(|n| n.full_name.clone()).unwrap_or_default()
    }

    /// Full name, or the root's name for the root.
    pub fn display_name(&self, id: ComponentId) -> String {
        match self.get(id) {
            Some(n) if n.full_name.is_empty() => n.name.clone(),
            Some(n) => n.full_name.clone(),
            None => String::new(),
        }
    }

    /// Resolve a dotted hierarchical name from the root.
    pub fn find(&self, full_name: &str) -> Option<ComponentId> {
        if full_name.is_empty() {
            return Some(ComponentId::ROOT);
        }
        full_name
            .split('.')
            .try_fold(ComponentId::ROOT, |id, segment| self.get(id)?.child(segment))
    }

    pub fn id_of(&self, component: &Arc<dyn Component>) -> Option<ComponentId> {
        self.by_identity.get(&identity(component)).copied()
    }

    /// `id` followed by all of its descendants, parents before children.
    pub fn subtree(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.get(next) else { continue };
            out.push(next);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Reassign the domain of `id`, and of its descendants when `hier` is set.
    pub fn set_domain(&mut self, id: ComponentId, domain: DomainId, hier: bool) -> Result<(), TreeError> {
        if self.get(id).is_none() {
            return Err(TreeError::UnknownComponent(id));
        }
        let targets = if hier { self.subtree(id) } else { vec![id] };
        for target in targets {
            self.nodes[target.0].domain = domain;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        (0..self.nodes.len()).map(ComponentId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;

    impl Component for Leaf {
        fn type_name(&self) -> &'static str {
            "leaf"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn tree() -> ComponentTree {
        ComponentTree::new(DomainId(1), Verbosity::Medium)
    }

    #[test]
    fn test_full_names_and_lookup() {
        let mut tree = tree();
        let env = tree.add_child(ComponentId::ROOT, "env", Arc::new(Leaf)).unwrap();
        let agent = tree.add_child(env, "agent", Arc::new(Leaf)).unwrap();

        assert_eq!(tree.full_name(env), "env");
        assert_eq!(tree.full_name(agent), "env.agent");
        assert_eq!(tree.find("env.agent"), Some(agent));
        assert_eq!(tree.find("env.missing"), None);
        assert_eq!(tree.display_name(ComponentId::ROOT), ROOT_NAME);
    }

    #[test]
    fn test_name_collision_rejected() {
        let mut tree = tree();
        tree.add_child(ComponentId::ROOT, "env", Arc::new(Leaf)).unwrap();
        let err = tree.add_child(ComponentId::ROOT, "env", Arc::new(Leaf)).unwrap_err();

        assert!(matches!(err, TreeError::NameCollision { .. }));
        assert_eq!(err.report_id(), ids::BDCLD);
        assert_eq!(tree.children(ComponentId::ROOT).len(), 1);
    }

    #[test]
    fn test_same_instance_under_two_names_rejected() {
        let mut tree = tree();
        let shared: Arc<dyn Component> = Arc::new(Leaf);
        let first = tree.add_child(ComponentId::ROOT, "a", shared.clone()).unwrap();

        assert_eq!(tree.add_child(ComponentId::ROOT, "a", shared.clone()).unwrap(), first);
        let err = tree.add_child(ComponentId::ROOT, "b", shared).unwrap_err();
        assert_eq!(err.report_id(), ids::BDCHLD);
    }

    #[test]
    fn test_invalid_names() {
        let mut tree = tree();
        assert!(matches!(
            tree.add_child(ComponentId::ROOT, "a.b", Arc::new(Leaf)),
            Err(TreeError::InvalidName(_))
        ));
        assert!(matches!(
            tree.add_child(ComponentId::ROOT, "", Arc::new(Leaf)),
            Err(TreeError::InvalidName(_))
        ));
    }

    #[test]
    fn test_domain_inherited_and_reassigned() {
        let mut tree = tree();
        let env = tree.add_child(ComponentId::ROOT, "env", Arc::new(Leaf)).unwrap();
        let agent = tree.add_child(env, "agent", Arc::new(Leaf)).unwrap();
        assert_eq!(tree.get(agent).unwrap().domain, DomainId(1));

        tree.set_domain(env, DomainId(2), false).unwrap();
        assert_eq!(tree.get(agent).unwrap().domain, DomainId(1));

        tree.set_domain(env, DomainId(3), true).unwrap();
        assert_eq!(tree.get(env).unwrap().domain, DomainId(3));
        assert_eq!(tree.get(agent).unwrap().domain, DomainId(3));
    }

    #[test]
    fn test_subtree_order() {
        let mut tree = tree();
        let a = tree.add_child(ComponentId::ROOT, "a", Arc::new(Leaf)).unwrap();
        let a1 = tree.add_child(a, "a1", Arc::new(Leaf)).unwrap();
        let b = tree.add_child(ComponentId::ROOT, "b", Arc::new(Leaf)).unwrap();

        assert_eq!(tree.subtree(ComponentId::ROOT), vec![ComponentId::ROOT, a, a1, b]);
    }
}
