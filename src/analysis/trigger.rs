// Threshold trigger - hysteresis state machine over amplitude readings
//
// States: Normal, Exceeded. A reading strictly above the threshold moves
// Normal → Exceeded (a capture opens); a reading at or below moves it back
// (the capture closes). Readings on the same side of the threshold never
// transition.
//
// The cooldown only rate-limits the external "trigger fired" notification.
// Opening and closing captures happens on every crossing regardless.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    #[default]
    Normal,
    Exceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTransition {
    /// Normal → Exceeded. `notify` is false while the cooldown is active.
    Opened { notify: bool },
    /// Exceeded → Normal
    Closed,
}

#[derive(Debug)]
pub struct ThresholdTrigger {
    state: TriggerState,
    threshold_db: i32,
    cooldown: Duration,
    last_notification: Option<Duration>,
}

impl ThresholdTrigger {
    pub fn new(threshold_db: i32, cooldown: Duration) -> Self {
        Self {
            state: TriggerState::Normal,
            threshold_db,
            cooldown,
            last_notification: None,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn threshold_db(&self) -> i32 {
        self.threshold_db
    }

    /// Change the threshold; the next `process` call uses it.
    pub fn set_threshold(&mut self, threshold_db: i32) {
        self.threshold_db = threshold_db;
    }

    /// Feed one reading taken at stream time `now`.
    pub fn process(&mut self, amplitude_db: f32, now: Duration) -> Option<TriggerTransition> {
        let above = amplitude_db > self.threshold_db as f32;

        match (self.state, above) {
            (TriggerState::Normal, true) => {
                self.state = TriggerState::Exceeded;
                let notify = self.cooldown_elapsed(now);
                if notify {
                    self.last_notification = Some(now);
                }
                Some(TriggerTransition::Opened { notify })
            }
            (TriggerState::Exceeded, false) => {
                self.state = TriggerState::Normal;
                Some(TriggerTransition::Closed)
            }
            _ => None,
        }
    }

    fn cooldown_elapsed(&self, now: Duration) -> bool {
        match self.last_notification {
            None => true,
            Some(last) => now.saturating_sub(last) > self.cooldown,
        }
    }

    /// Back to Normal with no cooldown history.
    pub fn reset(&mut self) {
        self.state = TriggerState::Normal;
        self.last_notification = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_millis(1000);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_single_crossing_sequence() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);
        let mut states = Vec::new();
        let mut transitions = Vec::new();

        for (i, reading) in [-40.0, -20.0, -40.0].into_iter().enumerate() {
            transitions.push(trigger.process(reading, ms(i as u64 * 16)));
            states.push(trigger.state());
        }

        assert_eq!(
            states,
            vec![
                TriggerState::Normal,
                TriggerState::Exceeded,
                TriggerState::Normal
            ]
        );
        assert_eq!(
            transitions,
            vec![
                None,
                Some(TriggerTransition::Opened { notify: true }),
                Some(TriggerTransition::Closed)
            ]
        );
    }

    #[test]
    fn test_reading_equal_to_threshold_is_normal() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);
        assert_eq!(trigger.process(-30.0, ms(0)), None);
        assert_eq!(trigger.state(), TriggerState::Normal);

        trigger.process(-29.5, ms(16));
        assert_eq!(trigger.process(-30.0, ms(32)), Some(TriggerTransition::Closed));
    }

    #[test]
    fn test_no_transition_on_same_side() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);
        trigger.process(-10.0, ms(0));
        assert_eq!(trigger.process(-5.0, ms(16)), None);
        assert_eq!(trigger.process(-12.0, ms(32)), None);
        assert_eq!(trigger.state(), TriggerState::Exceeded);
    }

    #[test]
    fn test_cooldown_throttles_notifications_only() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);

        assert_eq!(
            trigger.process(-20.0, ms(0)),
            Some(TriggerTransition::Opened { notify: true })
        );
        assert_eq!(trigger.process(-40.0, ms(100)), Some(TriggerTransition::Closed));
        // Second crossing inside the cooldown still opens and closes
        assert_eq!(
            trigger.process(-20.0, ms(300)),
            Some(TriggerTransition::Opened { notify: false })
        );
        assert_eq!(trigger.process(-40.0, ms(400)), Some(TriggerTransition::Closed));
    }

    #[test]
    fn test_cooldown_boundary_is_strict() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);
        trigger.process(-20.0, ms(0));
        trigger.process(-40.0, ms(16));

        assert_eq!(
            trigger.process(-20.0, ms(1000)),
            Some(TriggerTransition::Opened { notify: false })
        );
        trigger.process(-40.0, ms(1001));
        assert_eq!(
            trigger.process(-20.0, ms(1001)),
            Some(TriggerTransition::Opened { notify: true })
        );
    }

    #[test]
    fn test_suppressed_crossing_does_not_extend_cooldown() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);
        trigger.process(-20.0, ms(0));
        trigger.process(-40.0, ms(10));
        trigger.process(-20.0, ms(900));
        trigger.process(-40.0, ms(910));

        assert_eq!(
            trigger.process(-20.0, ms(1100)),
            Some(TriggerTransition::Opened { notify: true })
        );
    }

    #[test]
    fn test_threshold_change_applies_to_next_reading() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);
        assert_eq!(trigger.process(-35.0, ms(0)), None);

        trigger.set_threshold(-40);
        assert_eq!(trigger.threshold_db(), -40);
        assert_eq!(
            trigger.process(-35.0, ms(16)),
            Some(TriggerTransition::Opened { notify: true })
        );
    }

    #[test]
    fn test_reset_invalidates_cooldown() {
        let mut trigger = ThresholdTrigger::new(-30, COOLDOWN);
        trigger.process(-20.0, ms(0));
        trigger.reset();
        assert_eq!(trigger.state(), TriggerState::Normal);
        assert_eq!(
            trigger.process(-20.0, ms(50)),
            Some(TriggerTransition::Opened { notify: true })
        );
    }
}
