//! Failure scenarios.
//!
//! A scenario owns its events in a flat vector kept sorted by trigger time.
//! Insertion is stable, so events sharing a trigger time keep declaration
//! order. Cascade links between events are ids into the same vector.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::types::{EventId, EventState, FailureCategory, FailureEvent, Severity};
use crate::error::{Entity, ModelError, Result, Violation};

/// Named, time-ordered collection of failure events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScenarioRecord", into = "ScenarioRecord")]
pub struct FailureScenario {
    pub name: String,
    pub description: String,
    pub category: FailureCategory,
    pub severity: Severity,
    /// Probability estimate in 0..=1
    pub likelihood: f64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    events: Vec<FailureEvent>,
    next_event_id: u32,
}

impl FailureScenario {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: String::new(),
            category: FailureCategory::default(),
            severity: Severity::default(),
            likelihood: default_likelihood(),
            created: now,
            modified: now,
            events: Vec::new(),
            next_event_id: 1,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Events in execution order
    pub fn events(&self) -> &[FailureEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event(&self, id: EventId) -> Result<&FailureEvent> {
        self.events
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ModelError::not_found(Entity::Event, id))
    }

    pub fn event_mut(&mut self, id: EventId) -> Result<&mut FailureEvent> {
        let event = self
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ModelError::not_found(Entity::Event, id))?;
        self.modified = Utc::now();
        Ok(event)
    }

    /// Insert `event`, assigning it a fresh id
    pub fn add_event(&mut self, mut event: FailureEvent) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        event.id = id;
        event.state = EventState::Scheduled;
        event.caused_by = None;
        event.causes.clear();

        let at = self.events.partition_point(|e| e.trigger_time <= event.trigger_time);
        debug!("Scheduled {} {} at t={} (slot {})", id, event.kind, event.trigger_time, at);
        self.events.insert(at, event);
        self.modified = Utc::now();
        id
    }

    /// Remove an event and every cascade reference to it
    pub fn remove_event(&mut self, id: EventId) -> Result<FailureEvent> {
        let index = self
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ModelError::not_found(Entity::Event, id))?;
        let removed = self.events.remove(index);
        for event in &mut self.events {
            if event.caused_by == Some(id) {
                event.caused_by = None;
            }
            event.causes.retain(|c| *c != id);
        }
        self.modified = Utc::now();
        Ok(removed)
    }

    /// Record that `cause` led to `effect`. Neither trigger time changes.
    pub fn link_cascade(&mut self, cause: EventId, effect: EventId) -> Result<()> {
        self.event(cause)?;
        let previous = self.event(effect)?.caused_by;

        // walking up from the cause must never reach the effect
        let mut ancestor = Some(cause);
        while let Some(current) = ancestor {
            if current == effect {
                return Err(ModelError::InvalidTopology {
                    violations: vec![Violation::CascadeCycle { event: effect, cause }],
                });
            }
            ancestor = self.event(current)?.caused_by;
        }

        if let Some(old) = previous {
            if let Ok(old_cause) = self.event_mut(old) {
                old_cause.causes.retain(|c| *c != effect);
            }
        }
        self.event_mut(effect)?.caused_by = Some(cause);
        let cause_event = self.event_mut(cause)?;
        if !cause_event.causes.contains(&effect) {
            cause_event.causes.push(effect);
        }
        Ok(())
    }

    /// Cancel a scheduled event; anything past Scheduled is refused
    pub fn cancel(&mut self, id: EventId) -> Result<()> {
        let event = self.event_mut(id)?;
        if event.state != EventState::Scheduled {
            return Err(ModelError::InvalidTransition {
                event: id,
                from: event.state,
                to: EventState::Cancelled,
            });
        }
        event.state = EventState::Cancelled;
        debug!("Cancelled {}", id);
        Ok(())
    }

    /// Lifecycle state of an event at simulation time `t`
    pub fn state_at(&self, id: EventId, t: f64) -> Result<EventState> {
        let event = self.event(id)?;
        let state = match event.state {
            EventState::Cancelled => EventState::Cancelled,
            _ if t < event.trigger_time => EventState::Scheduled,
            _ => match event.end_time() {
                Some(end) if t >= end => EventState::Recovered,
                _ => EventState::Active,
            },
        };
        Ok(state)
    }

    /// Events that will be emitted
    pub fn live_events(&self) -> impl Iterator<Item = &FailureEvent> {
        self.events.iter().filter(|e| e.state != EventState::Cancelled)
    }
}

fn default_likelihood() -> f64 {
    0.5
}

/// Persisted form of a scenario
#[derive(Serialize, Deserialize)]
struct ScenarioRecord {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: FailureCategory,
    #[serde(default)]
    severity: Severity,
    #[serde(default = "default_likelihood")]
    likelihood: f64,
    #[serde(default = "Utc::now")]
    created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    modified: DateTime<Utc>,
    #[serde(default)]
    events: Vec<FailureEvent>,
    #[serde(default)]
    next_event_id: u32,
}

impl From<ScenarioRecord> for FailureScenario {
    fn from(record: ScenarioRecord) -> Self {
        let mut events = record.events;
        // stable: equal trigger times keep file order
        events.sort_by(|a, b| a.trigger_time.total_cmp(&b.trigger_time));
        let next_event_id = (events.iter().map(|e| e.id.0).max().unwrap_or(0) + 1).max(record.next_event_id);
        Self {
            name: record.name,
            description: record.description,
            category: record.category,
            severity: record.severity,
            likelihood: record.likelihood,
            created: record.created,
            modified: record.modified,
            events,
            next_event_id,
        }
    }
}

impl From<FailureScenario> for ScenarioRecord {
    fn from(scenario: FailureScenario) -> Self {
        Self {
            name: scenario.name,
            description: scenario.description,
            category: scenario.category,
            severity: scenario.severity,
            likelihood: scenario.likelihood,
            created: scenario.created,
            modified: scenario.modified,
            events: scenario.events,
            next_event_id: scenario.next_event_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{EventKind, EventTarget};
    use crate::topology::LinkId;

    fn link_down(at: f64, duration: f64) -> FailureEvent {
        FailureEvent::new(EventKind::LinkDown, EventTarget::Link { link: LinkId(1) }, at, duration)
    }

    #[test]
    fn test_events_kept_in_trigger_order() {
        let mut scenario = FailureScenario::new("order");
        let late = scenario.add_event(link_down(20.0, 1.0));
        let first_tie = scenario.add_event(link_down(5.0, 1.0));
        let second_tie = scenario.add_event(link_down(5.0, 1.0));
        let order: Vec<EventId> = scenario.events().iter().map(|e| e.id()).collect();
        assert_eq!(order, vec![first_tie, second_tie, late]);
    }

    #[test]
    fn test_state_at_follows_active_window() {
        let mut scenario = FailureScenario::new("window");
        let finite = scenario.add_event(link_down(10.0, 5.0));
        let permanent = scenario.add_event(link_down(10.0, -1.0));

        assert_eq!(scenario.state_at(finite, 9.9).unwrap(), EventState::Scheduled);
        assert_eq!(scenario.state_at(finite, 10.0).unwrap(), EventState::Active);
        assert_eq!(scenario.state_at(finite, 15.0).unwrap(), EventState::Recovered);
        assert_eq!(scenario.state_at(permanent, 1e9).unwrap(), EventState::Active);
    }

    #[test]
    fn test_cancel_only_from_scheduled() {
        let mut scenario = FailureScenario::new("cancel");
        let id = scenario.add_event(link_down(1.0, 1.0));
        scenario.cancel(id).unwrap();
        assert_eq!(scenario.state_at(id, 1.5).unwrap(), EventState::Cancelled);
        assert_eq!(
            scenario.cancel(id).unwrap_err(),
            ModelError::InvalidTransition { event: id, from: EventState::Cancelled, to: EventState::Cancelled }
        );
        assert_eq!(scenario.live_events().count(), 0);
    }

    #[test]
    fn test_remove_event_clears_cascade_links() {
        let mut scenario = FailureScenario::new("cascade");
        let cause = scenario.add_event(link_down(1.0, 1.0));
        let effect = scenario.add_event(link_down(2.0, 1.0));
        scenario.link_cascade(cause, effect).unwrap();
        assert_eq!(scenario.event(cause).unwrap().causes(), &[effect]);
        assert_eq!(scenario.event(effect).unwrap().caused_by(), Some(cause));

        assert!(matches!(
            scenario.link_cascade(effect, cause),
            Err(ModelError::InvalidTopology { .. })
        ));

        scenario.remove_event(cause).unwrap();
        assert_eq!(scenario.event(effect).unwrap().caused_by(), None);
        assert!(matches!(scenario.event(cause), Err(ModelError::NotFound { .. })));
    }

    #[test]
    fn test_scenario_yaml_round_trip() {
        let mut scenario = FailureScenario::new("persist").with_description("two events");
        let a = scenario.add_event(link_down(3.0, 2.0).named("fiber cut"));
        let b = scenario.add_event(link_down(4.0, -1.0));
        scenario.link_cascade(a, b).unwrap();

        let text = serde_yaml::to_string(&scenario).unwrap();
        let loaded: FailureScenario = serde_yaml::from_str(&text).unwrap();
        assert_eq!(loaded, scenario);

        let mut loaded = loaded;
        let next = loaded.add_event(link_down(0.0, 1.0));
        assert_eq!(next, EventId(3));
    }

    #[test]
    fn test_removed_event_id_stays_retired_after_reload() {
        let mut scenario = FailureScenario::new("retire");
        scenario.add_event(link_down(1.0, 1.0));
        let last = scenario.add_event(link_down(2.0, 1.0));
        scenario.remove_event(last).unwrap();

        let text = serde_yaml::to_string(&scenario).unwrap();
        let mut loaded: FailureScenario = serde_yaml::from_str(&text).unwrap();
        assert_ne!(loaded.add_event(link_down(3.0, 1.0)), last);
    }

    #[test]
    fn test_missed_event_lookup_keeps_modified() {
        let mut scenario = FailureScenario::new("lookup");
        let id = scenario.add_event(link_down(1.0, 1.0));
        let modified = scenario.modified;
        assert!(scenario.event_mut(EventId(42)).is_err());
        assert_eq!(scenario.modified, modified);
        scenario.event_mut(id).unwrap().duration = 4.0;
        assert!(scenario.modified >= modified);
    }
}
