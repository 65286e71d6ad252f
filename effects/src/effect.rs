//! Rotation effect descriptors and the runtime effects built from them.
//!
//! A [`RotationEventEffect`] is authored data sitting on a scene node. At platform setup the
//! manager turns each one into a [`LightRotationEventEffect`] on the same node. A
//! [`MultiRotationEventEffect`] is authored directly as a runtime effect and only needs to be
//! subscribed.
//!
//! Rotations are in degrees on the public surface and applied in the node's local space.

use std::cell::RefCell;
use std::rc::Rc;

use nalgebra::{Unit, UnitQuaternion, Vector3};
use rand::{Rng, rngs::StdRng};

use crate::constants::{AXIS_EPS, MAX_START_ANGLE_DEG, ROTATION_SPEED_MULTIPLIER};
use crate::event::{BeatmapEventData, BeatmapEventType};
use crate::scene::SharedTransform;

pub type SharedLightRotation = Rc<RefCell<LightRotationEventEffect>>;
pub type SharedMultiRotation = Rc<RefCell<MultiRotationEventEffect>>;

/// Descriptor: "rotate this node about `rotation_vector` whenever `event_type` fires".
#[derive(Clone, Debug, PartialEq)]
pub struct RotationEventEffect {
    pub event_type: BeatmapEventType,
    pub rotation_vector: Vector3<f32>,
}

impl RotationEventEffect {
    pub fn new(event_type: BeatmapEventType, rotation_vector: Vector3<f32>) -> Self {
        Self {
            event_type,
            rotation_vector,
        }
    }
}

/// Everything a [`LightRotationEventEffect`] needs at construction.
pub struct LightRotationSettings {
    pub event_type: BeatmapEventType,
    pub rotation_vector: Vector3<f32>,
    /// The transform of the node the effect is attached to.
    pub transform: SharedTransform,
    /// Orientation the effect returns to when switched off or restarted.
    pub start_rotation: UnitQuaternion<f32>,
}

/// Rotation of `angle_deg` about `axis`, or `None` for a degenerate axis.
fn axis_rotation(axis: &Vector3<f32>, angle_deg: f32) -> Option<UnitQuaternion<f32>> {
    let axis = Unit::try_new(*axis, AXIS_EPS)?;
    Some(UnitQuaternion::from_axis_angle(&axis, angle_deg.to_radians()))
}

/// Runtime effect reacting to a single event type.
pub struct LightRotationEventEffect {
    event_type: BeatmapEventType,
    rotation_vector: Vector3<f32>,
    transform: SharedTransform,
    start_rotation: UnitQuaternion<f32>,
    /// Degrees per second.
    rotation_speed: f32,
    enabled: bool,
    rng: StdRng,
}

impl LightRotationEventEffect {
    /// Builds a disabled effect. It starts rotating on the first matching event with a positive value.
    pub fn new(settings: LightRotationSettings, rng: StdRng) -> Self {
        let LightRotationSettings {
            event_type,
            rotation_vector,
            transform,
            start_rotation,
        } = settings;

        Self {
            event_type,
            rotation_vector,
            transform,
            start_rotation,
            rotation_speed: 0.0,
            enabled: false,
            rng,
        }
    }

    pub fn event_type(&self) -> BeatmapEventType {
        self.event_type
    }

    pub fn rotation_vector(&self) -> Vector3<f32> {
        self.rotation_vector
    }

    pub fn start_rotation(&self) -> UnitQuaternion<f32> {
        self.start_rotation
    }

    pub fn transform(&self) -> &SharedTransform {
        &self.transform
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Beat event handler.
    ///
    /// - other event types: ignored
    /// - `value == 0`: stop and snap back to the start rotation
    /// - `value > 0`: restart from the start rotation plus a random phase, spinning at
    ///   `value * ROTATION_SPEED_MULTIPLIER` degrees per second
    /// - `value < 0`: ignored
    pub fn handle_event(&mut self, event: &BeatmapEventData) {
        if event.event_type != self.event_type {
            return;
        }

        if event.value == 0 {
            self.enabled = false;
            self.transform.borrow_mut().local_rotation = self.start_rotation;
        } else if event.value > 0 {
            self.enabled = true;
            let phase = self.rng.gen_range(0.0..MAX_START_ANGLE_DEG);
            let mut transform = self.transform.borrow_mut();
            transform.local_rotation = self.start_rotation;
            if let Some(offset) = axis_rotation(&self.rotation_vector, phase) {
                transform.local_rotation *= offset;
            }
            self.rotation_speed = event.value as f32 * ROTATION_SPEED_MULTIPLIER;
        }
    }

    /// Advances the rotation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if !self.enabled {
            return;
        }
        if let Some(step) = axis_rotation(&self.rotation_vector, self.rotation_speed * dt) {
            self.transform.borrow_mut().local_rotation *= step;
        }
    }
}

/// One event lane of a [`MultiRotationEventEffect`].
#[derive(Clone, Debug, PartialEq)]
pub struct RotationBinding {
    pub event_type: BeatmapEventType,
    pub rotation_vector: Vector3<f32>,
}

#[derive(Clone, Debug)]
struct BindingState {
    binding: RotationBinding,
    /// Degrees per second.
    speed: f32,
    /// Accumulated angle in degrees.
    angle: f32,
    enabled: bool,
}

/// Runtime effect reacting to several event types, each with its own axis.
///
/// The node rotation is always `start_rotation` followed by every binding's rotation in binding
/// order, so restarting one lane does not discard the others.
pub struct MultiRotationEventEffect {
    transform: SharedTransform,
    start_rotation: UnitQuaternion<f32>,
    bindings: Vec<BindingState>,
    rng: StdRng,
}

impl MultiRotationEventEffect {
    /// Captures the transform's current rotation as the start rotation.
    pub fn new(transform: SharedTransform, bindings: Vec<RotationBinding>, rng: StdRng) -> Self {
        let start_rotation = transform.borrow().local_rotation;
        let bindings = bindings
            .into_iter()
            .map(|binding| BindingState {
                binding,
                speed: 0.0,
                angle: 0.0,
                enabled: false,
            })
            .collect();

        Self {
            transform,
            start_rotation,
            bindings,
            rng,
        }
    }

    pub fn bindings(&self) -> impl Iterator<Item = &RotationBinding> {
        self.bindings.iter().map(|state| &state.binding)
    }

    pub fn is_enabled(&self) -> bool {
        self.bindings.iter().any(|state| state.enabled)
    }

    /// Beat event callback. Applies the single-event rules to every binding on the event's lane.
    pub fn event_callback(&mut self, event: &BeatmapEventData) {
        let mut touched = false;
        for state in self
            .bindings
            .iter_mut()
            .filter(|state| state.binding.event_type == event.event_type)
        {
            if event.value == 0 {
                state.enabled = false;
                state.angle = 0.0;
                touched = true;
            } else if event.value > 0 {
                state.enabled = true;
                state.angle = self.rng.gen_range(0.0..MAX_START_ANGLE_DEG);
                state.speed = event.value as f32 * ROTATION_SPEED_MULTIPLIER;
                touched = true;
            }
        }
        if touched {
            self.apply();
        }
    }

    pub fn tick(&mut self, dt: f32) {
        if !self.is_enabled() {
            return;
        }
        for state in self.bindings.iter_mut().filter(|state| state.enabled) {
            state.angle = (state.angle + state.speed * dt) % 360.0;
        }
        self.apply();
    }

    fn apply(&self) {
        let rotation = self
            .bindings
            .iter()
            .filter_map(|state| axis_rotation(&state.binding.rotation_vector, state.angle))
            .fold(self.start_rotation, |acc, r| acc * r);
        self.transform.borrow_mut().local_rotation = rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Transform;
    use rand::SeedableRng;

    const EPS: f32 = 1.0e-4;

    fn light_effect(rotation_vector: Vector3<f32>) -> (LightRotationEventEffect, SharedTransform) {
        let transform = Transform::shared(UnitQuaternion::identity());
        let effect = LightRotationEventEffect::new(
            LightRotationSettings {
                event_type: BeatmapEventType::Event8,
                rotation_vector,
                transform: Rc::clone(&transform),
                start_rotation: UnitQuaternion::identity(),
            },
            StdRng::seed_from_u64(7),
        );
        (effect, transform)
    }

    fn angle_of(transform: &SharedTransform) -> f32 {
        transform.borrow().local_rotation.angle().to_degrees()
    }

    #[test]
    fn light_effect_starts_disabled_and_ignores_ticks() {
        let (mut effect, transform) = light_effect(Vector3::y());

        effect.tick(1.0);

        assert!(!effect.is_enabled());
        assert!(angle_of(&transform) < EPS);
    }

    #[test]
    fn positive_value_starts_rotation_with_bounded_phase() {
        let (mut effect, transform) = light_effect(Vector3::y());

        effect.handle_event(&BeatmapEventData::new(BeatmapEventType::Event8, 3));

        assert!(effect.is_enabled());
        assert!((effect.rotation_speed() - 60.0).abs() < EPS);
        let phase = angle_of(&transform);
        assert!((0.0..MAX_START_ANGLE_DEG + EPS).contains(&phase));
    }

    #[test]
    fn tick_rotates_about_rotation_vector_by_speed() {
        let (mut effect, transform) = light_effect(Vector3::y());
        effect.handle_event(&BeatmapEventData::new(BeatmapEventType::Event8, 1));
        let before = transform.borrow().local_rotation;

        effect.tick(0.5);

        let after = transform.borrow().local_rotation;
        let delta = before.inverse() * after;
        assert!((delta.angle().to_degrees() - 10.0).abs() < 1.0e-2);
        let axis = delta.axis().expect("rotation has an axis");
        assert!((axis.into_inner() - Vector3::y()).norm() < 1.0e-3);
    }

    #[test]
    fn zero_value_stops_and_restores_start_rotation() {
        let (mut effect, transform) = light_effect(Vector3::z());
        effect.handle_event(&BeatmapEventData::new(BeatmapEventType::Event8, 2));
        effect.tick(0.25);

        effect.handle_event(&BeatmapEventData::new(BeatmapEventType::Event8, 0));
        effect.tick(1.0);

        assert!(!effect.is_enabled());
        assert!(angle_of(&transform) < EPS);
    }

    #[test]
    fn other_event_types_and_negative_values_are_ignored() {
        let (mut effect, transform) = light_effect(Vector3::x());

        effect.handle_event(&BeatmapEventData::new(BeatmapEventType::Event9, 5));
        effect.handle_event(&BeatmapEventData::new(BeatmapEventType::Event8, -1));

        assert!(!effect.is_enabled());
        assert!(angle_of(&transform) < EPS);
    }

    #[test]
    fn zero_rotation_vector_never_rotates() {
        let (mut effect, transform) = light_effect(Vector3::zeros());

        effect.handle_event(&BeatmapEventData::new(BeatmapEventType::Event8, 4));
        effect.tick(1.0);

        assert!(effect.is_enabled());
        assert!(angle_of(&transform) < EPS);
    }

    #[test]
    fn multi_effect_drives_each_lane_independently() {
        let transform = Transform::shared(UnitQuaternion::identity());
        let mut effect = MultiRotationEventEffect::new(
            Rc::clone(&transform),
            vec![
                RotationBinding {
                    event_type: BeatmapEventType::Event12,
                    rotation_vector: Vector3::y(),
                },
                RotationBinding {
                    event_type: BeatmapEventType::Event13,
                    rotation_vector: Vector3::x(),
                },
            ],
            StdRng::seed_from_u64(11),
        );
        let lanes: Vec<BeatmapEventType> = effect.bindings().map(|b| b.event_type).collect();
        assert_eq!(
            lanes,
            vec![BeatmapEventType::Event12, BeatmapEventType::Event13]
        );

        effect.event_callback(&BeatmapEventData::new(BeatmapEventType::Event12, 1));
        assert!(effect.is_enabled());

        effect.event_callback(&BeatmapEventData::new(BeatmapEventType::Event13, 1));
        effect.event_callback(&BeatmapEventData::new(BeatmapEventType::Event12, 0));
        assert!(effect.is_enabled());

        // Only the x lane is left; the node rotates purely about x.
        effect.tick(0.1);
        let rotation = transform.borrow().local_rotation;
        let axis = rotation.axis().expect("rotation has an axis");
        assert!(axis.into_inner().x.abs() > 1.0 - 1.0e-3);

        effect.event_callback(&BeatmapEventData::new(BeatmapEventType::Event13, 0));
        assert!(!effect.is_enabled());
        assert!(angle_of(&transform) < EPS);
    }

    #[test]
    fn multi_effect_ignores_unbound_lanes() {
        let start = UnitQuaternion::from_euler_angles(0.0, 0.3, 0.0);
        let transform = Transform::shared(start);
        let mut effect = MultiRotationEventEffect::new(
            Rc::clone(&transform),
            vec![RotationBinding {
                event_type: BeatmapEventType::Event0,
                rotation_vector: Vector3::y(),
            }],
            StdRng::seed_from_u64(3),
        );

        effect.event_callback(&BeatmapEventData::new(BeatmapEventType::Event1, 3));
        effect.tick(1.0);

        assert!(!effect.is_enabled());
        assert!(transform.borrow().local_rotation.angle_to(&start) < EPS);
    }
}
