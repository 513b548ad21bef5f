//! First-contact flow: preview, behavior selection, reminder time.
//!
//! Behavior and time pickers are shared with the settings screens, which
//! is what [`SelectionPurpose`] tells apart. Completion hands the chosen
//! behaviors and time back to the engine, which persists them.

use crate::catalog::BehaviorCode;
use crate::clock::normalize_hhmm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPurpose {
    Onboarding,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingState {
    Preview,
    SelectingBehaviors { selected: Vec<BehaviorCode> },
    SelectingTime { behaviors: Vec<BehaviorCode> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEvent {
    Continue,
    Back,
    Toggle(BehaviorCode),
    Done,
    Time(String),
    TimeBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingStep {
    Preview,
    Behaviors { selected: Vec<BehaviorCode> },
    Time,
    /// `Done` with nothing selected; the state is kept.
    EmptySelection,
    Complete {
        behaviors: Vec<BehaviorCode>,
        reminder_time: String,
    },
}

impl OnboardingState {
    /// Advance on `event`, or `None` when the event does not belong here.
    /// A rejected event leaves the state untouched.
    pub fn apply(&mut self, event: OnboardingEvent) -> Option<OnboardingStep> {
        use OnboardingEvent as E;
        use OnboardingState as S;

        let current = std::mem::replace(self, S::Preview);
        let (next, step) = match (current, event) {
            (S::Preview, E::Continue) => (
                S::SelectingBehaviors { selected: vec![] },
                OnboardingStep::Behaviors { selected: vec![] },
            ),
            // Back from the privacy page.
            (S::Preview, E::Back) => (S::Preview, OnboardingStep::Preview),
            (S::SelectingBehaviors { .. }, E::Back) => (S::Preview, OnboardingStep::Preview),
            (S::SelectingBehaviors { mut selected }, E::Toggle(code)) => {
                toggle(&mut selected, code);
                let step = OnboardingStep::Behaviors {
                    selected: selected.clone(),
                };
                (S::SelectingBehaviors { selected }, step)
            }
            (S::SelectingBehaviors { selected }, E::Done) if selected.is_empty() => (
                S::SelectingBehaviors { selected },
                OnboardingStep::EmptySelection,
            ),
            (S::SelectingBehaviors { selected }, E::Done) => (
                S::SelectingTime {
                    behaviors: selected,
                },
                OnboardingStep::Time,
            ),
            (S::SelectingTime { behaviors }, E::TimeBack) => (
                S::SelectingBehaviors {
                    selected: behaviors.clone(),
                },
                OnboardingStep::Behaviors {
                    selected: behaviors,
                },
            ),
            (S::SelectingTime { behaviors }, E::Time(raw)) => match normalize_hhmm(&raw) {
                Some(reminder_time) => (
                    S::SelectingTime {
                        behaviors: behaviors.clone(),
                    },
                    OnboardingStep::Complete {
                        behaviors,
                        reminder_time,
                    },
                ),
                None => {
                    *self = S::SelectingTime { behaviors };
                    return None;
                }
            },
            (current, _) => {
                *self = current;
                return None;
            }
        };
        *self = next;
        Some(step)
    }
}

/// Flip membership of `code`, keeping catalog order.
pub fn toggle(selected: &mut Vec<BehaviorCode>, code: BehaviorCode) {
    if let Some(pos) = selected.iter().position(|c| *c == code) {
        selected.remove(pos);
    } else {
        selected.push(code);
        selected.sort();
    }
}

/// Flip membership of a preset-list index.
pub fn toggle_index(selected: &mut Vec<usize>, index: usize) {
    if let Some(pos) = selected.iter().position(|i| *i == index) {
        selected.remove(pos);
    } else {
        selected.push(index);
        selected.sort_unstable();
    }
}
