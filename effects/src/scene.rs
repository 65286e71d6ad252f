//! In-memory scene graph hosting platform nodes and their components.
//!
//! # Model
//! - Nodes live in an arena addressed by [`NodeId`]. Destroyed slots are never reused, so a stale
//!   id fails with [`EffectError::UnknownNode`] instead of aliasing a new node.
//! - A node is *active in the hierarchy* only if it and all of its ancestors are active.
//! - Each node owns a [`SharedTransform`]; runtime effects keep a clone of it so they can rotate
//!   their node from inside an event handler.
//! - Components are stored per node in attachment order. Runtime effects are reference counted:
//!   the scene holds the strong reference, subscribers only hold weak ones.

use std::cell::RefCell;
use std::rc::Rc;

use nalgebra::UnitQuaternion;

use crate::EffectError;
use crate::effect::{RotationEventEffect, SharedLightRotation, SharedMultiRotation};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub local_rotation: UnitQuaternion<f32>,
}

pub type SharedTransform = Rc<RefCell<Transform>>;

impl Transform {
    pub fn shared(local_rotation: UnitQuaternion<f32>) -> SharedTransform {
        Rc::new(RefCell::new(Transform { local_rotation }))
    }
}

/// Anything that can be attached to a node.
#[derive(Clone)]
pub enum Component {
    RotationDescriptor(RotationEventEffect),
    LightRotation(SharedLightRotation),
    MultiRotation(SharedMultiRotation),
}

impl Component {
    /// True if both values are the same component instance (descriptors compare by value).
    pub fn same_instance(&self, other: &Component) -> bool {
        match (self, other) {
            (Component::RotationDescriptor(a), Component::RotationDescriptor(b)) => a == b,
            (Component::LightRotation(a), Component::LightRotation(b)) => Rc::ptr_eq(a, b),
            (Component::MultiRotation(a), Component::MultiRotation(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Typed view used by [`Scene::components_in_children`].
pub trait SceneComponent: Sized {
    fn from_component(component: &Component) -> Option<Self>;
}

impl SceneComponent for RotationEventEffect {
    fn from_component(component: &Component) -> Option<Self> {
        match component {
            Component::RotationDescriptor(descriptor) => Some(descriptor.clone()),
            _ => None,
        }
    }
}

impl SceneComponent for SharedLightRotation {
    fn from_component(component: &Component) -> Option<Self> {
        match component {
            Component::LightRotation(effect) => Some(Rc::clone(effect)),
            _ => None,
        }
    }
}

impl SceneComponent for SharedMultiRotation {
    fn from_component(component: &Component) -> Option<Self> {
        match component {
            Component::MultiRotation(effect) => Some(Rc::clone(effect)),
            _ => None,
        }
    }
}

struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    active_self: bool,
    transform: SharedTransform,
    components: Vec<Component>,
}

pub struct Scene {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("root")
    }
}

impl Scene {
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = Node {
            name: root_name.into(),
            parent: None,
            children: Vec::new(),
            active_self: true,
            transform: Transform::shared(UnitQuaternion::identity()),
            components: Vec::new(),
        };
        Self {
            nodes: vec![Some(root)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Result<&Node, EffectError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(EffectError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, EffectError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(EffectError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Adds an active child with an identity rotation under `parent`.
    pub fn spawn(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId, EffectError> {
        self.spawn_with_rotation(parent, name, UnitQuaternion::identity())
    }

    pub fn spawn_with_rotation(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        local_rotation: UnitQuaternion<f32>,
    ) -> Result<NodeId, EffectError> {
        let id = NodeId(self.nodes.len());
        self.node_mut(parent)?.children.push(id);
        self.nodes.push(Some(Node {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            active_self: true,
            transform: Transform::shared(local_rotation),
            components: Vec::new(),
        }));
        Ok(id)
    }

    pub fn name(&self, id: NodeId) -> Result<&str, EffectError> {
        Ok(&self.node(id)?.name)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], EffectError> {
        Ok(&self.node(id)?.children)
    }

    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), EffectError> {
        self.node_mut(id)?.active_self = active;
        Ok(())
    }

    pub fn is_active_self(&self, id: NodeId) -> Result<bool, EffectError> {
        Ok(self.node(id)?.active_self)
    }

    /// A node is active in the hierarchy if it and every ancestor are active.
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> Result<bool, EffectError> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            if !node.active_self {
                return Ok(false);
            }
            current = node.parent;
        }
        Ok(true)
    }

    pub fn transform(&self, id: NodeId) -> Result<SharedTransform, EffectError> {
        Ok(Rc::clone(&self.node(id)?.transform))
    }

    pub fn add_component(&mut self, id: NodeId, component: Component) -> Result<(), EffectError> {
        self.node_mut(id)?.components.push(component);
        Ok(())
    }

    /// Removes `component` from `id`. Returns `false` if it was not attached there.
    pub fn remove_component(
        &mut self,
        id: NodeId,
        component: &Component,
    ) -> Result<bool, EffectError> {
        let components = &mut self.node_mut(id)?.components;
        let Some(pos) = components.iter().position(|c| c.same_instance(component)) else {
            return Ok(false);
        };
        components.remove(pos);
        Ok(true)
    }

    pub fn components(&self, id: NodeId) -> Result<&[Component], EffectError> {
        Ok(&self.node(id)?.components)
    }

    /// Removes `id` and its whole subtree. Components attached to those nodes are dropped.
    pub fn destroy(&mut self, id: NodeId) -> Result<(), EffectError> {
        if id == self.root {
            // The root anchors the arena; clear it instead of removing it.
            let children = std::mem::take(&mut self.node_mut(id)?.children);
            for child in children {
                self.destroy_subtree(child);
            }
            self.node_mut(id)?.components.clear();
            return Ok(());
        }

        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|child| *child != id);
        }
        self.destroy_subtree(id);
        Ok(())
    }

    fn destroy_subtree(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for child in node.children {
            self.destroy_subtree(child);
        }
    }

    /// Pre-order depth-first walk from `root` (inclusive).
    ///
    /// With `include_inactive == false` an inactive node prunes its whole subtree, and nothing
    /// is visited when `root` itself is not active in the hierarchy.
    fn walk(&self, root: NodeId, include_inactive: bool) -> Result<Vec<NodeId>, EffectError> {
        let mut order = Vec::new();
        if !include_inactive && !self.is_active_in_hierarchy(root)? {
            return Ok(order);
        }

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if !include_inactive && !node.active_self {
                continue;
            }
            order.push(id);
            // Reverse so the first child is visited first.
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(order)
    }

    /// Every component of type `T` in the subtree under `root`, in traversal order.
    pub fn components_in_children<T: SceneComponent>(
        &self,
        root: NodeId,
        include_inactive: bool,
    ) -> Result<Vec<(NodeId, T)>, EffectError> {
        let mut found = Vec::new();
        for id in self.walk(root, include_inactive)? {
            let node = self.node(id)?;
            found.extend(
                node.components
                    .iter()
                    .filter_map(T::from_component)
                    .map(|component| (id, component)),
            );
        }
        Ok(found)
    }

    /// Per-frame tick: advances every runtime effect on a node that is active in the hierarchy.
    pub fn update(&self, dt: f32) {
        let Ok(active) = self.walk(self.root, false) else {
            return;
        };
        for id in active {
            let Ok(node) = self.node(id) else {
                continue;
            };
            for component in &node.components {
                match component {
                    Component::LightRotation(effect) => {
                        if let Ok(mut effect) = effect.try_borrow_mut() {
                            effect.tick(dt);
                        }
                    }
                    Component::MultiRotation(effect) => {
                        if let Ok(mut effect) = effect.try_borrow_mut() {
                            effect.tick(dt);
                        }
                    }
                    Component::RotationDescriptor(_) => {}
                }
            }
        }
    }
}
