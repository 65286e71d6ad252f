//! Beat-synchronized events and the publisher effects subscribe to.
//!
//! # Model
//! - A [`BeatmapEventData`] is a timed notification carrying an event type and an integer value.
//! - A [`BeatEventSource`] is anything handlers can be added to / removed from. Subscribing hands
//!   back a [`SubscriptionId`], which is the only way to remove that handler again.
//! - [`BeatEventBus`] is the in-process publisher. It never knows who its subscribers are.
//!
//! Everything here is single-threaded: handlers are `Rc<dyn Fn>` and the bus mutates its
//! subscriber list through a `RefCell`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::EffectError;

/// The event lanes a beatmap can emit.
///
/// The numeric values are the lane numbers used by beatmap files. Do not reorder.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BeatmapEventType {
    /// Back lasers.
    Event0 = 0,
    /// Ring lights.
    Event1 = 1,
    /// Left lasers.
    Event2 = 2,
    /// Right lasers.
    Event3 = 3,
    /// Center lights.
    Event4 = 4,
    /// Boost light colors.
    Event5 = 5,
    Event6 = 6,
    Event7 = 7,
    /// Ring rotation.
    Event8 = 8,
    /// Ring zoom.
    Event9 = 9,
    Event10 = 10,
    Event11 = 11,
    /// Left laser speed.
    Event12 = 12,
    /// Right laser speed.
    Event13 = 13,
    /// Early lane rotation.
    Event14 = 14,
    /// Late lane rotation.
    Event15 = 15,
}

impl BeatmapEventType {
    pub const ALL: [BeatmapEventType; 16] = [
        BeatmapEventType::Event0,
        BeatmapEventType::Event1,
        BeatmapEventType::Event2,
        BeatmapEventType::Event3,
        BeatmapEventType::Event4,
        BeatmapEventType::Event5,
        BeatmapEventType::Event6,
        BeatmapEventType::Event7,
        BeatmapEventType::Event8,
        BeatmapEventType::Event9,
        BeatmapEventType::Event10,
        BeatmapEventType::Event11,
        BeatmapEventType::Event12,
        BeatmapEventType::Event13,
        BeatmapEventType::Event14,
        BeatmapEventType::Event15,
    ];
}

impl TryFrom<i32> for BeatmapEventType {
    type Error = EffectError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        usize::try_from(raw)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(EffectError::UnknownEventType(raw))
    }
}

/// Payload of one beat event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BeatmapEventData {
    pub event_type: BeatmapEventType,
    pub value: i32,
}

impl BeatmapEventData {
    pub fn new(event_type: BeatmapEventType, value: i32) -> Self {
        Self { event_type, value }
    }
}

/// A subscribed callback.
pub type BeatEventHandler = Rc<dyn Fn(&BeatmapEventData)>;

/// Token returned by [`BeatEventSource::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// A multicast notification that handlers can be added to and removed from.
///
/// Receivers are `&self`: a source is shared by every component that listens to it.
pub trait BeatEventSource {
    fn subscribe(&self, handler: BeatEventHandler) -> SubscriptionId;

    /// Removes a handler. Returns `false` if `id` is not currently subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// In-process beat event publisher.
#[derive(Default)]
pub struct BeatEventBus {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(SubscriptionId, BeatEventHandler)>>,
}

impl BeatEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invokes every current handler once, in subscription order.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe/unsubscribe while being
    /// invoked; such changes take effect on the next publish.
    pub fn publish(&self, event: &BeatmapEventData) {
        let snapshot: Vec<BeatEventHandler> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();

        for handler in snapshot {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl BeatEventSource for BeatEventBus {
    fn subscribe(&self, handler: BeatEventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(pos) = handlers.iter().position(|(sub, _)| *sub == id) else {
            return false;
        };
        handlers.remove(pos);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_handler(counter: &Rc<Cell<u32>>) -> BeatEventHandler {
        let counter = Rc::clone(counter);
        Rc::new(move |_: &BeatmapEventData| counter.set(counter.get() + 1))
    }

    #[test]
    fn event_type_from_raw_lane_number() {
        assert_eq!(
            BeatmapEventType::try_from(0),
            Ok(BeatmapEventType::Event0)
        );
        assert_eq!(
            BeatmapEventType::try_from(15),
            Ok(BeatmapEventType::Event15)
        );
        assert_eq!(
            BeatmapEventType::try_from(16),
            Err(EffectError::UnknownEventType(16))
        );
        assert_eq!(
            BeatmapEventType::try_from(-1),
            Err(EffectError::UnknownEventType(-1))
        );
    }

    #[test]
    fn lane_numbers_match_discriminants() {
        for (idx, ty) in BeatmapEventType::ALL.iter().enumerate() {
            assert_eq!(*ty as usize, idx);
        }
    }

    #[test]
    fn publish_invokes_each_handler_once() {
        let bus = BeatEventBus::new();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        bus.subscribe(counting_handler(&a));
        bus.subscribe(counting_handler(&b));

        bus.publish(&BeatmapEventData::new(BeatmapEventType::Event8, 1));

        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn unsubscribed_handler_is_not_invoked() {
        let bus = BeatEventBus::new();
        let hits = Rc::new(Cell::new(0));
        let id = bus.subscribe(counting_handler(&hits));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&BeatmapEventData::new(BeatmapEventType::Event0, 1));

        assert_eq!(hits.get(), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_publish() {
        let bus = Rc::new(BeatEventBus::new());
        let hits = Rc::new(Cell::new(0));
        let own_id: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));

        let handler: BeatEventHandler = {
            let bus = Rc::clone(&bus);
            let hits = Rc::clone(&hits);
            let own_id = Rc::clone(&own_id);
            Rc::new(move |_: &BeatmapEventData| {
                hits.set(hits.get() + 1);
                if let Some(id) = own_id.get() {
                    bus.unsubscribe(id);
                }
            })
        };
        own_id.set(Some(bus.subscribe(handler)));

        let event = BeatmapEventData::new(BeatmapEventType::Event1, 2);
        bus.publish(&event);
        bus.publish(&event);

        assert_eq!(hits.get(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
