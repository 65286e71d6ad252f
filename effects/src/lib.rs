pub mod constants;
pub mod effect;
pub mod error;
pub mod event;
pub mod manager;
pub mod registry;
pub mod scene;

pub use constants::{AXIS_EPS, MAX_START_ANGLE_DEG, ROTATION_SPEED_MULTIPLIER};
pub use effect::{
    LightRotationEventEffect, LightRotationSettings, MultiRotationEventEffect, RotationBinding,
    RotationEventEffect, SharedLightRotation, SharedMultiRotation,
};
pub use error::EffectError;
pub use event::{
    BeatEventBus, BeatEventHandler, BeatEventSource, BeatmapEventData, BeatmapEventType,
    SubscriptionId,
};
pub use manager::{ManagerSettings, RotationEventEffectManager};
pub use registry::SpawnedComponents;
pub use scene::{Component, NodeId, Scene, SceneComponent, SharedTransform, Transform};
