use crate::scene::{Component, NodeId, Scene};

/// Components spawned on behalf of the current platform, so they can be removed in bulk when
/// the platform is swapped out.
#[derive(Default)]
pub struct SpawnedComponents {
    entries: Vec<(NodeId, Component)>,
}

impl SpawnedComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: NodeId, component: Component) {
        self.entries.push((node, component));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detaches every recorded component from its node and forgets it.
    ///
    /// Nodes destroyed in the meantime are skipped. Returns how many components were detached.
    pub fn destroy_all(&mut self, scene: &mut Scene) -> usize {
        let mut removed = 0;
        for (node, component) in self.entries.drain(..) {
            if let Ok(true) = scene.remove_component(node, &component) {
                removed += 1;
            }
        }
        log::debug!("Destroyed {removed} spawned components");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{LightRotationEventEffect, LightRotationSettings};
    use crate::event::BeatmapEventType;
    use nalgebra::{UnitQuaternion, Vector3};
    use rand::{SeedableRng, rngs::StdRng};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn spawn_light(scene: &mut Scene, node: NodeId, spawned: &mut SpawnedComponents) {
        let effect = LightRotationEventEffect::new(
            LightRotationSettings {
                event_type: BeatmapEventType::Event8,
                rotation_vector: Vector3::y(),
                transform: scene.transform(node).unwrap(),
                start_rotation: UnitQuaternion::identity(),
            },
            StdRng::seed_from_u64(0),
        );
        let component = Component::LightRotation(Rc::new(RefCell::new(effect)));
        scene.add_component(node, component.clone()).unwrap();
        spawned.push(node, component);
    }

    #[test]
    fn destroy_all_detaches_recorded_components() {
        let mut scene = Scene::default();
        let root = scene.root();
        let a = scene.spawn(root, "a").unwrap();
        let b = scene.spawn(root, "b").unwrap();
        let mut spawned = SpawnedComponents::new();
        spawn_light(&mut scene, a, &mut spawned);
        spawn_light(&mut scene, b, &mut spawned);

        assert_eq!(spawned.len(), 2);
        assert_eq!(spawned.destroy_all(&mut scene), 2);

        assert!(spawned.is_empty());
        assert!(scene.components(a).unwrap().is_empty());
        assert!(scene.components(b).unwrap().is_empty());
    }

    #[test]
    fn destroy_all_skips_destroyed_nodes() {
        let mut scene = Scene::default();
        let root = scene.root();
        let a = scene.spawn(root, "a").unwrap();
        let b = scene.spawn(root, "b").unwrap();
        let mut spawned = SpawnedComponents::new();
        spawn_light(&mut scene, a, &mut spawned);
        spawn_light(&mut scene, b, &mut spawned);
        scene.destroy(a).unwrap();

        assert_eq!(spawned.destroy_all(&mut scene), 1);
        assert!(spawned.is_empty());
    }
}
