//! Discovery-to-subscription pipeline for rotation effects on one platform root.
//!
//! Lifecycle:
//! - `create_effects` scans the platform, spawns a [`LightRotationEventEffect`] next to every
//!   [`RotationEventEffect`] descriptor and collects the authored
//!   [`MultiRotationEventEffect`](crate::effect::MultiRotationEventEffect)s.
//! - `register_for_events` / `start` subscribes all of them to the beat event source.
//! - `on_disable` / `stop` removes exactly those subscriptions again.
//!
//! Spawned effects belong to the scene. Handlers only keep weak references, so once the scene
//! and the manager let go of an effect its handler silently does nothing.

use std::cell::RefCell;
use std::rc::Rc;

use rand::{SeedableRng, rngs::StdRng};

use crate::EffectError;
use crate::effect::{
    LightRotationEventEffect, LightRotationSettings, RotationEventEffect, SharedLightRotation,
    SharedMultiRotation,
};
use crate::event::{
    BeatEventBus, BeatEventHandler, BeatEventSource, BeatmapEventData, SubscriptionId,
};
use crate::registry::SpawnedComponents;
use crate::scene::{Component, NodeId, Scene};

#[derive(Clone, Copy, Debug, Default)]
pub struct ManagerSettings {
    /// Seed for the random start phase of spawned effects. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

pub struct RotationEventEffectManager<S: ?Sized + BeatEventSource = BeatEventBus> {
    source: Rc<S>,
    settings: ManagerSettings,
    light_rotation_effects: Option<Vec<SharedLightRotation>>,
    multi_effects: Option<Vec<SharedMultiRotation>>,
    subscriptions: Vec<SubscriptionId>,
    registered: bool,
}

impl<S: ?Sized + BeatEventSource> RotationEventEffectManager<S> {
    pub fn new(source: Rc<S>, settings: ManagerSettings) -> Self {
        Self {
            source,
            settings,
            light_rotation_effects: None,
            multi_effects: None,
            subscriptions: Vec::new(),
            registered: false,
        }
    }

    /// Single-event effects spawned by the last `create_effects`; empty before the first call.
    pub fn light_rotation_effects(&self) -> &[SharedLightRotation] {
        self.light_rotation_effects.as_deref().unwrap_or_default()
    }

    /// Multi-event effects found by the last `create_effects`; empty before the first call.
    pub fn multi_effects(&self) -> &[SharedMultiRotation] {
        self.multi_effects.as_deref().unwrap_or_default()
    }

    pub fn is_created(&self) -> bool {
        self.light_rotation_effects.is_some()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Number of handlers this manager currently has subscribed.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn effect_rng(&self, index: usize) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        }
    }

    /// Rebuilds both effect collections from the subtree under `root`.
    ///
    /// Descriptors are collected from inactive nodes too; multi-event effects only from nodes
    /// active in the hierarchy. Each spawned effect is recorded in `spawned`. Effects spawned by
    /// an earlier call are left to the scene / `spawned` to clean up. If the manager is currently
    /// registered, the old handlers are unsubscribed first.
    pub fn create_effects(
        &mut self,
        scene: &mut Scene,
        root: NodeId,
        spawned: &mut SpawnedComponents,
    ) -> Result<(), EffectError> {
        let descriptors = scene.components_in_children::<RotationEventEffect>(root, true)?;

        if self.registered {
            log::debug!("Re-creating effects while registered; dropping old subscriptions");
            self.unsubscribe_all();
        }

        let mut light_rotation_effects = Vec::with_capacity(descriptors.len());
        for (index, (node, descriptor)) in descriptors.into_iter().enumerate() {
            let transform = scene.transform(node)?;
            let start_rotation = transform.borrow().local_rotation;
            let effect = LightRotationEventEffect::new(
                LightRotationSettings {
                    event_type: descriptor.event_type,
                    rotation_vector: descriptor.rotation_vector,
                    transform,
                    start_rotation,
                },
                self.effect_rng(index),
            );

            let effect: SharedLightRotation = Rc::new(RefCell::new(effect));
            let component = Component::LightRotation(Rc::clone(&effect));
            scene.add_component(node, component.clone())?;
            spawned.push(node, component);
            light_rotation_effects.push(effect);
        }

        let multi_effects: Vec<SharedMultiRotation> = scene
            .components_in_children::<SharedMultiRotation>(root, false)?
            .into_iter()
            .map(|(_, effect)| effect)
            .collect();

        log::info!(
            "Created {} rotation effects, found {} multi rotation effects",
            light_rotation_effects.len(),
            multi_effects.len()
        );

        self.light_rotation_effects = Some(light_rotation_effects);
        self.multi_effects = Some(multi_effects);
        Ok(())
    }

    /// Subscribes every held effect to the event source.
    ///
    /// Calling this while already registered is a no-op, so handlers are never subscribed twice.
    pub fn register_for_events(&mut self) -> Result<(), EffectError> {
        let (Some(lights), Some(multis)) = (&self.light_rotation_effects, &self.multi_effects)
        else {
            return Err(EffectError::NotCreated);
        };

        if self.registered {
            log::warn!("Rotation effects are already registered for events");
            return Ok(());
        }

        let handlers: Vec<BeatEventHandler> = lights
            .iter()
            .map(light_rotation_handler)
            .chain(multis.iter().map(multi_rotation_handler))
            .collect();

        self.subscriptions = handlers
            .into_iter()
            .map(|handler| self.source.subscribe(handler))
            .collect();
        self.registered = true;

        log::debug!("Registered {} rotation effect handlers", self.subscriptions.len());
        Ok(())
    }

    /// Deactivation hook: removes every handler `register_for_events` added.
    ///
    /// A no-op when not registered.
    pub fn on_disable(&mut self) -> Result<(), EffectError> {
        if !self.is_created() {
            return Err(EffectError::NotCreated);
        }
        if !self.registered {
            log::debug!("Rotation effects are not registered; nothing to unregister");
            return Ok(());
        }

        self.unsubscribe_all();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), EffectError> {
        self.register_for_events()
    }

    /// Only meaningful after a matching [`start`](Self::start).
    pub fn stop(&mut self) -> Result<(), EffectError> {
        self.on_disable()
    }

    fn unsubscribe_all(&mut self) {
        for id in self.subscriptions.drain(..) {
            if !self.source.unsubscribe(id) {
                log::warn!("Subscription {id:?} was already removed from the event source");
            }
        }
        self.registered = false;
    }
}

fn light_rotation_handler(effect: &SharedLightRotation) -> BeatEventHandler {
    let effect = Rc::downgrade(effect);
    Rc::new(move |event: &BeatmapEventData| {
        let Some(effect) = effect.upgrade() else {
            return;
        };
        match effect.try_borrow_mut() {
            Ok(mut effect) => effect.handle_event(event),
            Err(_) => log::warn!("Rotation effect busy; dropped {event:?}"),
        }
    })
}

fn multi_rotation_handler(effect: &SharedMultiRotation) -> BeatEventHandler {
    let effect = Rc::downgrade(effect);
    Rc::new(move |event: &BeatmapEventData| {
        let Some(effect) = effect.upgrade() else {
            return;
        };
        match effect.try_borrow_mut() {
            Ok(mut effect) => effect.event_callback(event),
            Err(_) => log::warn!("Multi rotation effect busy; dropped {event:?}"),
        }
    })
}
