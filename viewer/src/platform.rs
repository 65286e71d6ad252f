//! Hosts one demo platform: the effect scene, its beat bus and the rotation effect manager.
//!
//! The scene lives in a `NonSend` resource (it is `Rc`-based, main thread only). Bevy entities
//! tagged with [`PlatformNode`] mirror the scene nodes and copy their rotations every frame.

use std::cell::RefCell;
use std::rc::Rc;

use bevy::prelude::*;
use nalgebra::{UnitQuaternion, Vector3};
use platform_effects::{
    BeatEventBus, BeatmapEventType, Component as SceneComponent, EffectError, ManagerSettings,
    MultiRotationEventEffect, NodeId, RotationBinding, RotationEventEffect,
    RotationEventEffectManager, Scene, SpawnedComponents,
};
use rand::{SeedableRng, rngs::StdRng};

use crate::config::ViewerConfig;

const RING_COUNT: usize = 8;
const RING_SPACING: f32 = 2.5;

pub(super) fn plugin(app: &mut App) {
    let config = app
        .world()
        .get_resource::<ViewerConfig>()
        .cloned()
        .unwrap_or_default();

    match PlatformHost::build(&config) {
        Ok(host) => {
            app.insert_non_send_resource(host);
        }
        Err(err) => error!("Failed to build platform: {err}"),
    }

    app.add_systems(Startup, spawn_platform_visuals);
    app.add_systems(Update, (tick_effects, sync_platform_visuals).chain());
}

/// Links a rendered entity to a node of the effect scene.
#[derive(Component, Debug)]
pub struct PlatformNode(pub NodeId);

#[derive(Clone, Copy, Debug)]
enum Shape {
    Ring,
    Laser,
    Spinner,
}

#[derive(Clone, Copy, Debug)]
struct NodeVisual {
    node: NodeId,
    translation: Vec3,
    shape: Shape,
}

pub struct PlatformHost {
    pub scene: Scene,
    pub bus: Rc<BeatEventBus>,
    pub manager: RotationEventEffectManager,
    pub spawned: SpawnedComponents,
    pub platform_root: NodeId,
    visuals: Vec<NodeVisual>,
    enabled: bool,
    /// A reload requested while disabled, applied on the next enable.
    reload_pending: bool,
}

impl PlatformHost {
    pub fn build(config: &ViewerConfig) -> Result<Self, EffectError> {
        let mut scene = Scene::new("world");
        let platform_root = scene.spawn(scene.root(), "platform")?;
        let visuals = build_demo_platform(&mut scene, platform_root, config.seed)?;

        let bus = Rc::new(BeatEventBus::new());
        let mut manager = RotationEventEffectManager::new(
            Rc::clone(&bus),
            ManagerSettings { seed: config.seed },
        );
        let mut spawned = SpawnedComponents::new();
        manager.create_effects(&mut scene, platform_root, &mut spawned)?;

        let mut host = Self {
            scene,
            bus,
            manager,
            spawned,
            platform_root,
            visuals,
            enabled: false,
            reload_pending: false,
        };
        host.set_enabled(!config.start_disabled)?;
        Ok(host)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Activates/deactivates the platform node and (un)registers its effects to match.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), EffectError> {
        self.scene.set_active(self.platform_root, enabled)?;
        if enabled {
            // The platform must be active before rebuilding, or its multi effects are not found.
            if self.reload_pending {
                let removed = self.rebuild_effects()?;
                self.reload_pending = false;
                info!("Applied deferred reload: removed {removed} effects");
            }
            self.manager.start()?;
        } else {
            self.manager.stop()?;
        }
        self.enabled = enabled;
        info!(
            "Platform {} ({} handlers subscribed)",
            if enabled { "enabled" } else { "disabled" },
            self.bus.subscriber_count()
        );
        Ok(())
    }

    /// Throws away the spawned effects and builds them again from the descriptors.
    ///
    /// Multi effects are only collected from active nodes, so while the platform is disabled the
    /// rebuild is deferred until [`set_enabled(true)`](Self::set_enabled).
    pub fn reload(&mut self) -> Result<(), EffectError> {
        if !self.enabled {
            self.reload_pending = true;
            info!("Platform disabled; reload deferred until it is enabled");
            return Ok(());
        }

        let removed = self.rebuild_effects()?;
        self.manager.start()?;
        info!(
            "Reloaded platform: removed {removed} effects, spawned {}",
            self.spawned.len()
        );
        Ok(())
    }

    /// Puts every node back to its authored rotation, then replaces the spawned effects.
    fn rebuild_effects(&mut self) -> Result<usize, EffectError> {
        for effect in self.manager.light_rotation_effects() {
            let effect = effect.borrow();
            effect.transform().borrow_mut().local_rotation = effect.start_rotation();
        }
        let removed = self.spawned.destroy_all(&mut self.scene);
        self.manager
            .create_effects(&mut self.scene, self.platform_root, &mut self.spawned)?;
        Ok(removed)
    }
}

fn add_descriptor(
    scene: &mut Scene,
    node: NodeId,
    event_type: BeatmapEventType,
    rotation_vector: Vector3<f32>,
) -> Result<(), EffectError> {
    scene.add_component(
        node,
        SceneComponent::RotationDescriptor(RotationEventEffect::new(event_type, rotation_vector)),
    )
}

/// Lays out a tunnel of ring lights spinning on the ring-rotation lane, two lasers on the
/// laser-speed lanes and a spinner reacting to both lane-rotation events.
fn build_demo_platform(
    scene: &mut Scene,
    root: NodeId,
    seed: Option<u64>,
) -> Result<Vec<NodeVisual>, EffectError> {
    let mut visuals = Vec::new();

    for i in 0..RING_COUNT {
        let angle = i as f32 / RING_COUNT as f32 * std::f32::consts::TAU;
        let node = scene.spawn_with_rotation(
            root,
            format!("ring-{i}"),
            UnitQuaternion::from_euler_angles(0.0, 0.0, angle),
        )?;
        add_descriptor(scene, node, BeatmapEventType::Event8, Vector3::z())?;
        visuals.push(NodeVisual {
            node,
            translation: Vec3::new(0.0, 3.0, -(i as f32) * RING_SPACING),
            shape: Shape::Ring,
        });
    }

    for (name, event_type, x) in [
        ("laser-left", BeatmapEventType::Event12, -4.0),
        ("laser-right", BeatmapEventType::Event13, 4.0),
    ] {
        let node = scene.spawn(root, name)?;
        add_descriptor(scene, node, event_type, Vector3::x())?;
        visuals.push(NodeVisual {
            node,
            translation: Vec3::new(x, 1.0, 0.0),
            shape: Shape::Laser,
        });
    }

    let spinner = scene.spawn(root, "spinner")?;
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ 0x5350_494e),
        None => StdRng::from_entropy(),
    };
    let multi = MultiRotationEventEffect::new(
        scene.transform(spinner)?,
        vec![
            RotationBinding {
                event_type: BeatmapEventType::Event14,
                rotation_vector: Vector3::y(),
            },
            RotationBinding {
                event_type: BeatmapEventType::Event15,
                rotation_vector: Vector3::x(),
            },
        ],
        rng,
    );
    scene.add_component(
        spinner,
        SceneComponent::MultiRotation(Rc::new(RefCell::new(multi))),
    )?;
    visuals.push(NodeVisual {
        node: spinner,
        translation: Vec3::new(0.0, 1.5, 0.0),
        shape: Shape::Spinner,
    });

    // Authored but switched off: still gets an effect, never rendered.
    let spare = scene.spawn(root, "spare-ring")?;
    scene.set_active(spare, false)?;
    add_descriptor(scene, spare, BeatmapEventType::Event8, Vector3::z())?;

    Ok(visuals)
}

pub fn to_bevy_quat(rotation: &UnitQuaternion<f32>) -> Quat {
    let c = rotation.coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

fn spawn_platform_visuals(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    host: Option<NonSend<PlatformHost>>,
) {
    let Some(host) = host else {
        return;
    };

    let ring_mesh = meshes.add(Cuboid::new(4.0, 0.2, 0.2));
    let laser_mesh = meshes.add(Cuboid::new(0.15, 0.15, 8.0));
    let spinner_mesh = meshes.add(Cuboid::new(1.0, 1.0, 1.0));
    let ring_material = materials.add(Color::srgb_u8(80, 160, 255));
    let laser_material = materials.add(Color::srgb_u8(255, 60, 120));
    let spinner_material = materials.add(Color::srgb_u8(240, 240, 240));

    for visual in &host.visuals {
        let (mesh, material) = match visual.shape {
            Shape::Ring => (ring_mesh.clone(), ring_material.clone()),
            Shape::Laser => (laser_mesh.clone(), laser_material.clone()),
            Shape::Spinner => (spinner_mesh.clone(), spinner_material.clone()),
        };
        commands.spawn((
            PlatformNode(visual.node),
            Mesh3d(mesh),
            MeshMaterial3d(material),
            Transform::from_translation(visual.translation),
        ));
    }
}

fn tick_effects(time: Res<Time>, host: Option<NonSend<PlatformHost>>) {
    let Some(host) = host else {
        return;
    };
    host.scene.update(time.delta_secs());
}

fn sync_platform_visuals(
    host: Option<NonSend<PlatformHost>>,
    mut nodes: Query<(&PlatformNode, &mut Transform, &mut Visibility)>,
) {
    let Some(host) = host else {
        return;
    };

    for (PlatformNode(node), mut transform, mut visibility) in &mut nodes {
        let Ok(shared) = host.scene.transform(*node) else {
            continue;
        };
        transform.rotation = to_bevy_quat(&shared.borrow().local_rotation);

        let active = host.scene.is_active_in_hierarchy(*node).unwrap_or(false);
        let wanted = if active {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if *visibility != wanted {
            *visibility = wanted;
        }
    }
}
