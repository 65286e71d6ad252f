use crate::scene::NodeId;

/// Failures surfaced by the scene, effect and manager APIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    /// The node id was never spawned in this scene, or it has been destroyed.
    #[error("unknown scene node {0:?}")]
    UnknownNode(NodeId),

    /// A raw event type outside the `0..=15` range the game defines.
    #[error("unknown beatmap event type {0}")]
    UnknownEventType(i32),

    /// `register_for_events`/`on_disable` was called before `create_effects`.
    #[error("effects have not been created for this manager yet")]
    NotCreated,
}
