//! The composed model: settings, topology, traffic and failures.
//!
//! Editing happens on a [`Project`]. Generation only ever sees a
//! [`ModelSnapshot`], an owned copy stamped with the topology generation and
//! the project revision it was taken at.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{GeneralConfig, ValidationError};
use crate::error::{Entity, ModelError, Result};
use crate::failure::FailureScenario;
use crate::topology::TopologyModel;
use crate::traffic::{FlowId, TrafficFlow};
use crate::utils::validation::{validate_flow_window, validate_likelihood};

/// Everything a simulation is generated from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub topology: TopologyModel,
    #[serde(default)]
    flows: Vec<TrafficFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scenario: Option<FailureScenario>,
    /// Highest flow id ever issued, removed flows included
    #[serde(default)]
    last_flow_id: u32,
    /// Bumped by every flow or scenario mutation
    #[serde(skip)]
    revision: u64,
}

impl Project {
    pub fn new(general: GeneralConfig) -> Self {
        Self { general, ..Self::default() }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn flows(&self) -> &[TrafficFlow] {
        &self.flows
    }

    pub fn flow(&self, id: FlowId) -> Result<&TrafficFlow> {
        self.flows
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| ModelError::not_found(Entity::Flow, id))
    }

    pub fn flow_mut(&mut self, id: FlowId) -> Result<&mut TrafficFlow> {
        let flow = self
            .flows
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| ModelError::not_found(Entity::Flow, id))?;
        self.revision += 1;
        Ok(flow)
    }

    /// Append a flow under a fresh id, which is returned.
    ///
    /// Ids of removed flows are never handed out again.
    pub fn add_flow(&mut self, mut flow: TrafficFlow) -> FlowId {
        let highest = self.flows.iter().map(|f| f.id.0).max().unwrap_or(0);
        self.last_flow_id = self.last_flow_id.max(highest) + 1;
        let id = FlowId(self.last_flow_id);
        flow.id = id;
        debug!("Added flow {} from {} to {}", id, flow.source, flow.target);
        self.flows.push(flow);
        self.revision += 1;
        id
    }

    pub fn remove_flow(&mut self, id: FlowId) -> Result<TrafficFlow> {
        let index = self
            .flows
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| ModelError::not_found(Entity::Flow, id))?;
        self.revision += 1;
        Ok(self.flows.remove(index))
    }

    pub fn scenario(&self) -> Option<&FailureScenario> {
        self.scenario.as_ref()
    }

    pub fn scenario_mut(&mut self) -> Option<&mut FailureScenario> {
        let scenario = self.scenario.as_mut()?;
        self.revision += 1;
        Some(scenario)
    }

    /// Replace the failure scenario, returning the previous one
    pub fn set_scenario(&mut self, scenario: Option<FailureScenario>) -> Option<FailureScenario> {
        self.revision += 1;
        std::mem::replace(&mut self.scenario, scenario)
    }

    /// Settings-level checks run right after loading.
    ///
    /// Structural checks against the topology happen at generation time.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.general.validate()?;

        let mut seen = BTreeSet::new();
        for flow in &self.flows {
            if !seen.insert(flow.id) {
                return Err(ValidationError::InvalidFlow(format!("duplicate flow id {}", flow.id)));
            }
            validate_flow_window(flow.start, flow.stop)
                .map_err(|e| ValidationError::InvalidFlow(format!("flow {}: {}", flow.id, e)))?;
        }

        if let Some(scenario) = &self.scenario {
            validate_likelihood(scenario.likelihood).map_err(ValidationError::InvalidScenario)?;
            let mut seen = BTreeSet::new();
            for event in scenario.events() {
                if !seen.insert(event.id()) {
                    return Err(ValidationError::InvalidScenario(format!("duplicate event id {}", event.id())));
                }
                if event.duration.is_nan() {
                    return Err(ValidationError::InvalidScenario(format!(
                        "event {} has no usable duration",
                        event.id()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Point-in-time copy for generation
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            general: self.general.clone(),
            topology: self.topology.clone(),
            flows: self.flows.clone(),
            scenario: self.scenario.clone(),
            generation: self.topology.generation(),
            revision: self.revision,
        }
    }
}

/// Read-only composed model handed to the generator
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub(crate) general: GeneralConfig,
    pub(crate) topology: TopologyModel,
    pub(crate) flows: Vec<TrafficFlow>,
    pub(crate) scenario: Option<FailureScenario>,
    generation: u64,
    revision: u64,
}

impl ModelSnapshot {
    pub fn general(&self) -> &GeneralConfig {
        &self.general
    }

    pub fn topology(&self) -> &TopologyModel {
        &self.topology
    }

    pub fn flows(&self) -> &[TrafficFlow] {
        &self.flows
    }

    pub fn scenario(&self) -> Option<&FailureScenario> {
        self.scenario.as_ref()
    }

    /// Topology generation the snapshot was taken at
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Project revision the snapshot was taken at
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether `project` has changed since this snapshot was taken
    pub fn is_stale(&self, project: &Project) -> bool {
        self.generation != project.topology.generation() || self.revision != project.revision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureScenario;
    use crate::topology::{NodeAttrs, NodeId, NodeKind};
    use crate::traffic::ApplicationKind;

    #[test]
    fn test_flow_ids_are_fresh() {
        let mut project = Project::default();
        let a = project.add_flow(TrafficFlow::new(FlowId(7), NodeId(1), NodeId(2), ApplicationKind::Echo));
        let b = project.add_flow(TrafficFlow::new(FlowId(7), NodeId(2), NodeId(1), ApplicationKind::Echo));
        assert_eq!((a, b), (FlowId(1), FlowId(2)));

        project.remove_flow(a).unwrap();
        let c = project.add_flow(TrafficFlow::new(FlowId(0), NodeId(1), NodeId(2), ApplicationKind::OnOff));
        assert_eq!(c, FlowId(3));
        assert!(matches!(project.remove_flow(a), Err(ModelError::NotFound { .. })));
    }

    #[test]
    fn test_removed_highest_flow_id_is_not_reused() {
        let mut project = Project::default();
        project.add_flow(TrafficFlow::new(FlowId(0), NodeId(1), NodeId(2), ApplicationKind::Echo));
        let b = project.add_flow(TrafficFlow::new(FlowId(0), NodeId(2), NodeId(1), ApplicationKind::Echo));
        project.remove_flow(b).unwrap();

        let c = project.add_flow(TrafficFlow::new(FlowId(0), NodeId(1), NodeId(2), ApplicationKind::OnOff));
        assert_ne!(c, b);
        assert_eq!(c, FlowId(3));
    }

    #[test]
    fn test_flow_counter_survives_reload() {
        let mut project = Project::default();
        project.add_flow(TrafficFlow::new(FlowId(0), NodeId(1), NodeId(2), ApplicationKind::Echo));
        let b = project.add_flow(TrafficFlow::new(FlowId(0), NodeId(2), NodeId(1), ApplicationKind::Echo));
        project.remove_flow(b).unwrap();

        let yaml = serde_yaml::to_string(&project).unwrap();
        let mut restored: Project = serde_yaml::from_str(&yaml).unwrap();
        let c = restored.add_flow(TrafficFlow::new(FlowId(0), NodeId(1), NodeId(2), ApplicationKind::OnOff));
        assert_ne!(c, b);
    }

    #[test]
    fn test_missed_lookups_leave_revision_alone() {
        let mut project = Project::default();
        let revision = project.revision();
        assert!(project.flow_mut(FlowId(9)).is_err());
        assert!(project.scenario_mut().is_none());
        assert_eq!(project.revision(), revision);

        let id = project.add_flow(TrafficFlow::new(FlowId(0), NodeId(1), NodeId(2), ApplicationKind::Echo));
        let snapshot = project.snapshot();
        project.flow_mut(FlowId(99)).unwrap_err();
        assert!(!snapshot.is_stale(&project));
        project.flow_mut(id).unwrap().start = 2.0;
        assert!(snapshot.is_stale(&project));
    }

    #[test]
    fn test_snapshot_detects_later_edits() {
        let mut project = Project::default();
        let snapshot = project.snapshot();
        assert!(!snapshot.is_stale(&project));

        project.topology.add_node(NodeKind::Host, NodeAttrs::default());
        assert!(snapshot.is_stale(&project));
        assert_eq!(snapshot.topology().node_count(), 0);

        let snapshot = project.snapshot();
        project.set_scenario(Some(FailureScenario::new("later")));
        assert!(snapshot.is_stale(&project));
        assert!(snapshot.scenario().is_none());
    }

    #[test]
    fn test_validate_rejects_bad_flow_window() {
        let mut project = Project::default();
        project.add_flow(
            TrafficFlow::new(FlowId(0), NodeId(1), NodeId(2), ApplicationKind::Echo).with_window(4.0, 4.0),
        );
        let err = project.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFlow(_)));
        assert!(err.to_string().contains("flow f1"));
    }
}
