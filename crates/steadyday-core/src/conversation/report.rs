//! Daily-report state machine.
//!
//! A pure transition table: no I/O, no clock. The engine owns one
//! [`ReportSession`] per user and persists only when a transition
//! returns [`Transition::Complete`].
//!
//! ## State Transitions
//!
//! ```text
//! CollectingStatus(i) --clean|unclear--> CollectingStatus(i+1) | CollectingCraving
//! CollectingStatus(i) --relapse--------> RelapseAck(i)
//! RelapseAck(i)       --continue-------> CollectingStatus(i+1) | CollectingCraving
//! CollectingCraving   --level|skip-----> CollectingSupportNeed
//! CollectingSupportNeed --yes|no-------> Complete (persist, back to Idle)
//! ```
//!
//! Any other (state, event) pair is an [`InvalidTransition`]; the session is
//! left untouched and the caller decides how to recover.

use chrono::NaiveDate;
use indexmap::IndexMap;
use thiserror::Error;

use crate::catalog::BehaviorCode;
use crate::error::ValidationError;
use crate::model::{CravingLevel, LogStatus};
use crate::storage::store::ReportEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    CollectingStatus { index: usize },
    /// Blocking stop after a relapse answer; `index` has not advanced yet.
    RelapseAck { index: usize },
    CollectingCraving,
    CollectingSupportNeed,
}

impl ReportState {
    fn name(&self) -> &'static str {
        match self {
            ReportState::CollectingStatus { .. } => "collecting_status",
            ReportState::RelapseAck { .. } => "relapse_ack",
            ReportState::CollectingCraving => "collecting_craving",
            ReportState::CollectingSupportNeed => "collecting_support_need",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEvent {
    Status(LogStatus),
    Continue,
    Craving(Option<CravingLevel>),
    SupportNeed(bool),
}

impl ReportEvent {
    fn name(&self) -> &'static str {
        match self {
            ReportEvent::Status(_) => "status",
            ReportEvent::Continue => "continue",
            ReportEvent::Craving(_) => "craving",
            ReportEvent::SupportNeed(_) => "support_need",
        }
    }
}

/// What the user should be shown next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Status {
        behavior: BehaviorCode,
        index: usize,
        total: usize,
    },
    RelapseAck {
        behavior: BehaviorCode,
    },
    Craving,
    SupportNeed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(Prompt),
    /// The run is finished; write `entries` and drop the session.
    Complete {
        entries: Vec<ReportEntry>,
        needs_support: bool,
    },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("event '{event}' is not valid in state '{state}'")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
}

/// In-memory buffer for one report run. Not durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSession {
    date: NaiveDate,
    behaviors: Vec<BehaviorCode>,
    answers: IndexMap<BehaviorCode, LogStatus>,
    craving: Option<CravingLevel>,
    state: ReportState,
}

impl ReportSession {
    /// Start at `CollectingStatus(0)` for the given local date.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyCollection`] when nothing is tracked.
    pub fn start(date: NaiveDate, behaviors: Vec<BehaviorCode>) -> Result<Self, ValidationError> {
        if behaviors.is_empty() {
            return Err(ValidationError::EmptyCollection("tracked behaviors".into()));
        }
        Ok(Self {
            date,
            behaviors,
            answers: IndexMap::new(),
            craving: None,
            state: ReportState::CollectingStatus { index: 0 },
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    pub fn behaviors(&self) -> &[BehaviorCode] {
        &self.behaviors
    }

    /// The prompt for the current state.
    pub fn prompt(&self) -> Prompt {
        match self.state {
            ReportState::CollectingStatus { index } => Prompt::Status {
                behavior: self.behaviors[index],
                index,
                total: self.behaviors.len(),
            },
            ReportState::RelapseAck { index } => Prompt::RelapseAck {
                behavior: self.behaviors[index],
            },
            ReportState::CollectingCraving => Prompt::Craving,
            ReportState::CollectingSupportNeed => Prompt::SupportNeed,
        }
    }

    /// Apply one event. On error the session is unchanged.
    pub fn apply(&mut self, event: ReportEvent) -> Result<Transition, InvalidTransition> {
        let next = match (self.state, event) {
            (ReportState::CollectingStatus { index }, ReportEvent::Status(status)) => {
                self.answers.insert(self.behaviors[index], status);
                if status == LogStatus::Relapse {
                    ReportState::RelapseAck { index }
                } else {
                    self.advance(index)
                }
            }
            (ReportState::RelapseAck { index }, ReportEvent::Continue) => self.advance(index),
            (ReportState::CollectingCraving, ReportEvent::Craving(level)) => {
                self.craving = level;
                ReportState::CollectingSupportNeed
            }
            (ReportState::CollectingSupportNeed, ReportEvent::SupportNeed(needs_support)) => {
                let craving = self.craving;
                let entries = self
                    .answers
                    .iter()
                    .map(|(behavior, status)| ReportEntry {
                        behavior: *behavior,
                        status: *status,
                        craving,
                    })
                    .collect();
                return Ok(Transition::Complete {
                    entries,
                    needs_support,
                });
            }
            (state, event) => {
                return Err(InvalidTransition {
                    state: state.name(),
                    event: event.name(),
                })
            }
        };
        self.state = next;
        Ok(Transition::Next(self.prompt()))
    }

    fn advance(&self, index: usize) -> ReportState {
        if index + 1 < self.behaviors.len() {
            ReportState::CollectingStatus { index: index + 1 }
        } else {
            ReportState::CollectingCraving
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(behaviors: &[BehaviorCode]) -> ReportSession {
        ReportSession::start(
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            behaviors.to_vec(),
        )
        .unwrap()
    }

    const ABC: [BehaviorCode; 3] = [
        BehaviorCode::Alcohol,
        BehaviorCode::Nicotine,
        BehaviorCode::Gambling,
    ];

    #[test]
    fn empty_tracked_set_cannot_start() {
        let err = ReportSession::start(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), vec![]);
        assert!(matches!(err, Err(ValidationError::EmptyCollection(_))));
    }

    #[test]
    fn clean_answers_advance_directly() {
        let mut s = session(&ABC);
        s.apply(ReportEvent::Status(LogStatus::Clean)).unwrap();
        assert_eq!(s.state(), ReportState::CollectingStatus { index: 1 });
        s.apply(ReportEvent::Status(LogStatus::Unclear)).unwrap();
        s.apply(ReportEvent::Status(LogStatus::Clean)).unwrap();
        assert_eq!(s.state(), ReportState::CollectingCraving);
    }

    #[test]
    fn relapse_blocks_then_advances_exactly_once() {
        let mut s = session(&ABC);
        s.apply(ReportEvent::Status(LogStatus::Clean)).unwrap();
        let t = s.apply(ReportEvent::Status(LogStatus::Relapse)).unwrap();
        assert_eq!(
            t,
            Transition::Next(Prompt::RelapseAck {
                behavior: BehaviorCode::Nicotine
            })
        );
        assert_eq!(s.state(), ReportState::RelapseAck { index: 1 });

        // Answering again while the acknowledgment is pending is rejected.
        assert!(s.apply(ReportEvent::Status(LogStatus::Clean)).is_err());
        assert_eq!(s.state(), ReportState::RelapseAck { index: 1 });

        let t = s.apply(ReportEvent::Continue).unwrap();
        assert_eq!(
            t,
            Transition::Next(Prompt::Status {
                behavior: BehaviorCode::Gambling,
                index: 2,
                total: 3
            })
        );
        // A second acknowledgment is stale.
        assert!(s.apply(ReportEvent::Continue).is_err());
        assert_eq!(s.state(), ReportState::CollectingStatus { index: 2 });
    }

    #[test]
    fn relapse_on_last_behavior_leads_to_craving() {
        let mut s = session(&[BehaviorCode::Food]);
        s.apply(ReportEvent::Status(LogStatus::Relapse)).unwrap();
        let t = s.apply(ReportEvent::Continue).unwrap();
        assert_eq!(t, Transition::Next(Prompt::Craving));
    }

    #[test]
    fn craving_applies_to_every_entry() {
        let mut s = session(&ABC);
        s.apply(ReportEvent::Status(LogStatus::Clean)).unwrap();
        s.apply(ReportEvent::Status(LogStatus::Relapse)).unwrap();
        s.apply(ReportEvent::Continue).unwrap();
        s.apply(ReportEvent::Status(LogStatus::Unclear)).unwrap();
        s.apply(ReportEvent::Craving(Some(CravingLevel::Medium))).unwrap();

        match s.apply(ReportEvent::SupportNeed(false)).unwrap() {
            Transition::Complete {
                entries,
                needs_support,
            } => {
                assert!(!needs_support);
                assert_eq!(entries.len(), 3);
                assert!(entries
                    .iter()
                    .all(|e| e.craving == Some(CravingLevel::Medium)));
                assert_eq!(entries[1].status, LogStatus::Relapse);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn skipped_craving_is_none() {
        let mut s = session(&[BehaviorCode::Porn]);
        s.apply(ReportEvent::Status(LogStatus::Clean)).unwrap();
        s.apply(ReportEvent::Craving(None)).unwrap();
        match s.apply(ReportEvent::SupportNeed(true)).unwrap() {
            Transition::Complete {
                entries,
                needs_support,
            } => {
                assert!(needs_support);
                assert_eq!(entries[0].craving, None);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        let mut s = session(&ABC);
        let err = s.apply(ReportEvent::SupportNeed(true)).unwrap_err();
        assert_eq!(err.state, "collecting_status");
        assert_eq!(err.event, "support_need");
        assert!(s.apply(ReportEvent::Craving(None)).is_err());
        assert!(s.apply(ReportEvent::Continue).is_err());
        assert_eq!(s.state(), ReportState::CollectingStatus { index: 0 });
    }
}
