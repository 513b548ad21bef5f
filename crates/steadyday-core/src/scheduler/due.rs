//! Which reminders are due at a given local minute.

use crate::catalog::{SECOND_REMINDER_ALT_TIME, SECOND_REMINDER_TIME};
use crate::clock::{hhmm_to_minutes, minutes_diff};
use crate::model::NotificationKind;

/// Maximum ring distance, in minutes, between "now" and a target slot.
pub const TOLERANCE_MINUTES: u32 = 1;

/// A reminder kind with its target minute-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub kind: NotificationKind,
    pub minute: u32,
}

/// Slots for a user's reminder time and daily frequency.
///
/// The base time always yields `reminder`. With two per day a `reminder2`
/// is added at noon, or at the alternate slot when noon is the base time,
/// so the two kinds never share a clock time. An unparsable base time
/// yields no base slot.
pub fn slots(reminder_time: &str, frequency: u8) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(2);
    let base = hhmm_to_minutes(reminder_time);
    if let Some(minute) = base {
        slots.push(Slot {
            kind: NotificationKind::Reminder,
            minute,
        });
    }
    if frequency >= 2 {
        let noon = hhmm_to_minutes(SECOND_REMINDER_TIME);
        let second = if noon == base {
            SECOND_REMINDER_ALT_TIME
        } else {
            SECOND_REMINDER_TIME
        };
        if let Some(minute) = hhmm_to_minutes(second) {
            slots.push(Slot {
                kind: NotificationKind::Reminder2,
                minute,
            });
        }
    }
    slots
}

pub fn is_due(now_minute: u32, target_minute: u32) -> bool {
    minutes_diff(now_minute, target_minute) <= TOLERANCE_MINUTES
}

/// Slots of `slots` that are due at `now_minute`.
pub fn due_slots(reminder_time: &str, frequency: u8, now_minute: u32) -> Vec<Slot> {
    slots(reminder_time, frequency)
        .into_iter()
        .filter(|slot| is_due(now_minute, slot.minute))
        .collect()
}
