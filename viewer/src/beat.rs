//! Demo beat clock: publishes a fixed light show on the platform's beat bus.

use bevy::prelude::*;
use platform_effects::{BeatmapEventData, BeatmapEventType};

use crate::{config::ViewerConfig, platform::PlatformHost};

#[derive(Resource, Debug)]
pub struct BeatClock {
    timer: Timer,
    beat: u64,
}

impl BeatClock {
    pub fn from_bpm(bpm: f32) -> Self {
        Self {
            timer: Timer::from_seconds(60.0 / bpm, TimerMode::Repeating),
            beat: 0,
        }
    }
}

pub(super) fn plugin(app: &mut App) {
    let bpm = app
        .world()
        .get_resource::<ViewerConfig>()
        .map(|config| config.bpm)
        .unwrap_or(ViewerConfig::default().bpm);

    app.insert_resource(BeatClock::from_bpm(bpm));
    // Publish before effects tick so a beat is visible in the same frame.
    app.add_systems(PreUpdate, publish_beats);
}

fn publish_beats(
    time: Res<Time>,
    mut clock: ResMut<BeatClock>,
    host: Option<NonSend<PlatformHost>>,
) {
    let Some(host) = host else {
        return;
    };

    clock.timer.tick(time.delta());
    for _ in 0..clock.timer.times_finished_this_tick() {
        let beat = clock.beat;
        clock.beat += 1;
        for event in events_for_beat(beat) {
            debug!("beat {beat}: {:?} = {}", event.event_type, event.value);
            host.bus.publish(&event);
        }
    }
}

/// The light show, repeating every 32 beats.
///
/// - rings restart every 4 beats, cycling through speeds 1..=3
/// - both lasers start on every 8th beat, the right one stops halfway through
/// - the spinner picks up its yaw lane on beat 0 and its pitch lane on beat 8 of each 16,
///   and both lanes stop on beat 24
fn events_for_beat(beat: u64) -> Vec<BeatmapEventData> {
    use BeatmapEventType::*;

    let mut events = Vec::new();

    if beat % 4 == 0 {
        let speed = 1 + (beat / 4 % 3) as i32;
        events.push(BeatmapEventData::new(Event8, speed));
    }

    match beat % 8 {
        0 => {
            events.push(BeatmapEventData::new(Event12, 2));
            events.push(BeatmapEventData::new(Event13, 2));
        }
        4 => events.push(BeatmapEventData::new(Event13, 0)),
        _ => {}
    }

    match beat % 32 {
        0 | 16 => events.push(BeatmapEventData::new(Event14, 1)),
        8 => events.push(BeatmapEventData::new(Event15, 3)),
        24 => {
            events.push(BeatmapEventData::new(Event14, 0));
            events.push(BeatmapEventData::new(Event15, 0));
        }
        _ => {}
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(events: &[BeatmapEventData], event_type: BeatmapEventType) -> Option<i32> {
        events
            .iter()
            .find(|event| event.event_type == event_type)
            .map(|event| event.value)
    }

    #[test]
    fn rings_cycle_speeds_every_four_beats() {
        assert_eq!(lane(&events_for_beat(0), BeatmapEventType::Event8), Some(1));
        assert_eq!(lane(&events_for_beat(4), BeatmapEventType::Event8), Some(2));
        assert_eq!(lane(&events_for_beat(8), BeatmapEventType::Event8), Some(3));
        assert_eq!(lane(&events_for_beat(12), BeatmapEventType::Event8), Some(1));
        assert_eq!(lane(&events_for_beat(5), BeatmapEventType::Event8), None);
    }

    #[test]
    fn spinner_lanes_stop_on_beat_24() {
        let events = events_for_beat(24);

        assert_eq!(lane(&events, BeatmapEventType::Event14), Some(0));
        assert_eq!(lane(&events, BeatmapEventType::Event15), Some(0));
    }

    #[test]
    fn off_beats_are_quiet() {
        assert!(events_for_beat(1).is_empty());
        assert!(events_for_beat(31).is_empty());
    }

    #[test]
    fn clock_period_follows_bpm() {
        let clock = BeatClock::from_bpm(120.0);

        assert!((clock.timer.duration().as_secs_f32() - 0.5).abs() < 1.0e-6);
        assert_eq!(clock.beat, 0);
    }
}
