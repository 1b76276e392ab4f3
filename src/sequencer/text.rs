//! Text-driven viseme scheduling.
//!
//! One viseme per transcript character, spread evenly across the clip so the
//! mouth finishes moving when the audio does. Timing is uniform, not phonetic.

use crate::viseme::{Viseme, text_to_visemes};
use serde::Serialize;
use std::time::Duration;

/// A viseme with its offset from the start of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledViseme {
    /// Position in the sequence.
    pub index: usize,
    /// Offset from session start at which this viseme becomes active.
    #[serde(serialize_with = "serialize_millis")]
    pub at: Duration,
    pub viseme: Viseme,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Evenly spaced viseme sequence for a known transcript and clip length.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSchedule {
    visemes: Vec<Viseme>,
    interval: Duration,
}

impl TextSchedule {
    /// Build a schedule, or `None` when there is nothing to animate: empty
    /// text, or a duration that is zero, negative, not finite or too large
    /// to represent.
    ///
    /// The spacing is `max(min_interval, duration / chars)`.
    pub fn new(text: &str, duration_secs: f64, min_interval: Duration) -> Option<Self> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return None;
        }
        let visemes = text_to_visemes(text);
        if visemes.is_empty() {
            return None;
        }
        let even = Duration::try_from_secs_f64(duration_secs / visemes.len() as f64).ok()?;
        Some(Self {
            visemes,
            interval: even.max(min_interval),
        })
    }

    /// Spacing between consecutive visemes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The full sequence, in playback order.
    pub fn visemes(&self) -> &[Viseme] {
        &self.visemes
    }

    pub fn len(&self) -> usize {
        self.visemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visemes.is_empty()
    }

    /// Offset at which the sequence is exhausted and the session ends.
    pub fn total(&self) -> Duration {
        self.interval
            .saturating_mul(u32::try_from(self.visemes.len()).unwrap_or(u32::MAX))
    }

    /// Every viseme with its start offset. The first is at zero.
    pub fn events(&self) -> impl Iterator<Item = ScheduledViseme> + '_ {
        let interval = self.interval;
        self.visemes
            .iter()
            .enumerate()
            .map(move |(index, &viseme)| ScheduledViseme {
                index,
                at: interval.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX)),
                viseme,
            })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    const MIN: Duration = Duration::from_millis(50);

    #[test]
    fn hola_over_one_second() {
        let schedule = TextSchedule::new("hola", 1.0, MIN).unwrap();
        assert_eq!(schedule.interval(), Duration::from_millis(250));
        let events: Vec<_> = schedule.events().collect();
        assert_eq!(events.len(), 4);
        let offsets: Vec<u128> = events.iter().map(|e| e.at.as_millis()).collect();
        assert_eq!(offsets, vec![0, 250, 500, 750]);
        let visemes: Vec<Viseme> = events.iter().map(|e| e.viseme).collect();
        assert_eq!(
            visemes,
            vec![Viseme::CH, Viseme::O, Viseme::NN, Viseme::AA]
        );
        assert_eq!(schedule.total(), Duration::from_secs(1));
    }

    #[test]
    fn interval_is_clamped_to_minimum() {
        let text = "a".repeat(100);
        let schedule = TextSchedule::new(&text, 1.0, MIN).unwrap();
        assert_eq!(schedule.interval(), MIN);
        assert_eq!(schedule.len(), 100);
    }

    #[test]
    fn counts_chars_not_bytes() {
        let schedule = TextSchedule::new("ñandú", 0.5, MIN).unwrap();
        assert_eq!(schedule.len(), 5);
        assert_eq!(schedule.interval(), Duration::from_millis(100));
    }

    #[test]
    fn malformed_input_yields_none() {
        assert!(TextSchedule::new("", 1.0, MIN).is_none());
        assert!(TextSchedule::new("hola", 0.0, MIN).is_none());
        assert!(TextSchedule::new("hola", -2.0, MIN).is_none());
        assert!(TextSchedule::new("hola", f64::NAN, MIN).is_none());
        assert!(TextSchedule::new("hola", f64::INFINITY, MIN).is_none());
        assert!(TextSchedule::new("hola", 1e20, MIN).is_none());
        assert!(TextSchedule::new("a", f64::MAX, MIN).is_none());
    }

    #[test]
    fn huge_but_representable_duration_saturates_total() {
        let schedule = TextSchedule::new("hola", 1e19, MIN).unwrap();
        assert_eq!(schedule.len(), 4);
        assert!(schedule.total() >= schedule.interval());
        let last = schedule.events().last().unwrap();
        assert!(last.at <= schedule.total());
    }

    #[test]
    fn events_serialize_with_millis() {
        let schedule = TextSchedule::new("ab", 1.0, MIN).unwrap();
        let json = serde_json::to_value(schedule.events().collect::<Vec<_>>()).unwrap();
        assert_eq!(json[1]["at"], 500);
        assert_eq!(json[1]["viseme"], "viseme_PP");
    }
}
