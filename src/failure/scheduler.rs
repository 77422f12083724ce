//! Failure scheduling.
//!
//! Turns a scenario into (apply, revert) effect pairs against a concrete
//! topology. Pairs follow the scenario's execution order: trigger time,
//! then declaration order.

use log::{debug, warn};
use std::collections::BTreeSet;

use super::scenario::FailureScenario;
use super::types::{EventId, EventKind, EventTarget, FailureEvent};
use crate::error::{Entity, ModelError, Result, Violation};
use crate::topology::{Endpoint, LinkId, NodeId, TopologyModel};
use crate::utils::duration::Delay;
use crate::utils::rate::DataRate;

/// A change applied to the running simulation
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    DisablePorts(Vec<Endpoint>),
    EnablePorts(Vec<Endpoint>),
    Degrade {
        link: LinkId,
        data_rate: Option<DataRate>,
        delay: Option<Delay>,
        error_rate: Option<f64>,
    },
    /// Put a degraded link back to its modelled parameters
    Restore { link: LinkId },
    StartFlood {
        source: NodeId,
        target: NodeId,
        rate_pps: u32,
        packet_size: u32,
    },
    StopFlood { source: NodeId, target: NodeId },
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::DisablePorts(_) => "disable_ports",
            Action::EnablePorts(_) => "enable_ports",
            Action::Degrade { .. } => "degrade",
            Action::Restore { .. } => "restore",
            Action::StartFlood { .. } => "start_flood",
            Action::StopFlood { .. } => "stop_flood",
        }
    }
}

/// An action at a point in simulation time
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub at: f64,
    pub action: Action,
}

/// What one event (or one flap cycle of it) does, and how it is undone
#[derive(Debug, Clone, PartialEq)]
pub struct EffectPair {
    pub event: EventId,
    /// Flap cycle index for flapping events
    pub cycle: Option<u32>,
    pub apply: Effect,
    pub revert: Option<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Apply,
    Revert,
}

/// One entry of the flattened timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEffect<'a> {
    pub at: f64,
    pub pair: usize,
    pub event: EventId,
    pub phase: Phase,
    pub action: &'a Action,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FailureSchedule {
    pub pairs: Vec<EffectPair>,
}

impl FailureSchedule {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Every effect ordered by time; equal times keep pair order, applies first
    pub fn timeline(&self) -> Vec<TimedEffect<'_>> {
        let mut effects: Vec<TimedEffect<'_>> = Vec::new();
        for (index, pair) in self.pairs.iter().enumerate() {
            effects.push(TimedEffect {
                at: pair.apply.at,
                pair: index,
                event: pair.event,
                phase: Phase::Apply,
                action: &pair.apply.action,
            });
            if let Some(revert) = &pair.revert {
                effects.push(TimedEffect {
                    at: revert.at,
                    pair: index,
                    event: pair.event,
                    phase: Phase::Revert,
                    action: &revert.action,
                });
            }
        }
        effects.sort_by(|a, b| a.at.total_cmp(&b.at));
        effects
    }

    pub fn effect_count(&self) -> usize {
        self.pairs.iter().map(|p| 1 + usize::from(p.revert.is_some())).sum()
    }
}

/// Structural problems in `scenario` against `model`
pub fn validate_scenario(scenario: &FailureScenario, model: &TopologyModel) -> Vec<Violation> {
    let mut violations = Vec::new();
    let ids: BTreeSet<EventId> = scenario.events().iter().map(|e| e.id()).collect();

    for event in scenario.events() {
        let id = event.id();
        if !event.trigger_time().is_finite() || event.trigger_time() < 0.0 {
            violations.push(Violation::EventTiming { event: id, trigger: event.trigger_time() });
        }
        if !event.kind.accepts(&event.target) {
            violations.push(Violation::EventTargetMismatch {
                event: id,
                kind: event.kind,
                target: event.target.label(),
            });
        }
        if let Some(cause) = event.caused_by() {
            if !ids.contains(&cause) {
                violations.push(Violation::EventReferenceMissing { event: id, field: "caused_by", missing: cause });
            }
        }
        for effect in event.causes() {
            if !ids.contains(effect) {
                violations.push(Violation::EventReferenceMissing { event: id, field: "causes", missing: *effect });
            }
        }

        let missing = |entity: Entity, key: String| Violation::EventTargetMissing { event: id, entity, id: key };
        match &event.target {
            EventTarget::Link { link } => {
                if model.link(*link).is_err() {
                    violations.push(missing(Entity::Link, link.to_string()));
                }
            }
            EventTarget::Node { node } => {
                if model.node(*node).is_err() {
                    violations.push(missing(Entity::Node, node.to_string()));
                }
            }
            EventTarget::Interface { node, port } => {
                if model.port(Endpoint::new(*node, *port)).is_none() {
                    violations.push(missing(Entity::Port, Endpoint::new(*node, *port).to_string()));
                }
            }
            EventTarget::Groups { a, b } => {
                for node in a.iter().chain(b.iter()) {
                    if model.node(*node).is_err() {
                        violations.push(missing(Entity::Node, node.to_string()));
                    }
                }
            }
        }

        match event.kind {
            EventKind::LinkDegraded => {
                let p = &event.params;
                if p.new_data_rate.is_none() && p.new_delay.is_none() && p.error_rate.is_none() {
                    violations.push(Violation::EventParameterMissing { event: id, field: "new_data_rate" });
                }
            }
            EventKind::TrafficFlood => match event.params.flood_source {
                None => violations.push(Violation::EventParameterMissing { event: id, field: "flood_source" }),
                Some(source) if model.node(source).is_err() => {
                    violations.push(missing(Entity::Node, source.to_string()));
                }
                Some(_) => {}
            },
            _ => {}
        }
    }
    violations
}

/// Resolve `scenario` into effect pairs. Cancelled events are skipped.
pub fn schedule(scenario: &FailureScenario, model: &TopologyModel) -> Result<FailureSchedule> {
    let violations = validate_scenario(scenario, model);
    if !violations.is_empty() {
        return Err(ModelError::InvalidTopology { violations });
    }

    let mut schedule = FailureSchedule::default();
    for event in scenario.live_events() {
        if let Some(cause) = event.caused_by().and_then(|c| scenario.event(c).ok()) {
            if cause.trigger_time() > event.trigger_time() {
                warn!(
                    "{} is caused by {} but triggers earlier ({} < {}); keeping both times",
                    event.id(),
                    cause.id(),
                    event.trigger_time(),
                    cause.trigger_time()
                );
            }
        }
        let before = schedule.pairs.len();
        expand_event(event, model, &mut schedule.pairs);
        debug!("{} {} expanded into {} effect pair(s)", event.id(), event.kind, schedule.pairs.len() - before);
    }
    Ok(schedule)
}

fn expand_event(event: &FailureEvent, model: &TopologyModel, pairs: &mut Vec<EffectPair>) {
    let t = event.trigger_time();
    let id = event.id();
    let params = &event.params;
    let pair = |apply: Action, revert: Option<(f64, Action)>| EffectPair {
        event: id,
        cycle: None,
        apply: Effect { at: t, action: apply },
        revert: revert.map(|(at, action)| Effect { at, action }),
    };

    match event.kind {
        EventKind::LinkDown | EventKind::NodePowerLoss | EventKind::InterfaceDown | EventKind::NetworkPartition => {
            let ports = affected_ports(event, model);
            if ports.is_empty() {
                warn!("{} {} affects no connected port; nothing to schedule", id, event.kind);
                return;
            }
            let revert = event.end_time().map(|end| (end, Action::EnablePorts(ports.clone())));
            pairs.push(pair(Action::DisablePorts(ports), revert));
        }
        EventKind::LinkUp | EventKind::NodePowerRestore => {
            let ports = affected_ports(event, model);
            if !ports.is_empty() {
                pairs.push(pair(Action::EnablePorts(ports), None));
            }
        }
        EventKind::NodeReboot => {
            let ports = affected_ports(event, model);
            if !ports.is_empty() {
                let back = t + params.reboot_duration.max(0.0);
                pairs.push(pair(Action::DisablePorts(ports.clone()), Some((back, Action::EnablePorts(ports)))));
            }
        }
        EventKind::LinkDegraded => {
            let EventTarget::Link { link } = event.target else {
                return;
            };
            let apply = Action::Degrade {
                link,
                data_rate: params.new_data_rate,
                delay: params.new_delay,
                error_rate: params.error_rate,
            };
            // open-ended degradation only recovers at an explicit time
            let until = event.end_time().or(params.recovery_time.filter(|r| *r > t));
            pairs.push(pair(apply, until.map(|at| (at, Action::Restore { link }))));
        }
        EventKind::LinkFlapping => {
            let ports = affected_ports(event, model);
            if ports.is_empty() {
                return;
            }
            let period = params.down_duration + params.up_duration;
            for cycle in 0..params.flap_cycles {
                let down_at = t + f64::from(cycle) * period;
                pairs.push(EffectPair {
                    event: id,
                    cycle: Some(cycle),
                    apply: Effect { at: down_at, action: Action::DisablePorts(ports.clone()) },
                    revert: Some(Effect {
                        at: down_at + params.down_duration,
                        action: Action::EnablePorts(ports.clone()),
                    }),
                });
            }
        }
        EventKind::TrafficFlood => {
            let (EventTarget::Node { node: target }, Some(source)) = (&event.target, params.flood_source) else {
                return;
            };
            let target = *target;
            let apply = Action::StartFlood {
                source,
                target,
                rate_pps: params.flood_rate_pps,
                packet_size: params.flood_packet_size,
            };
            let revert = event.end_time().map(|end| (end, Action::StopFlood { source, target }));
            pairs.push(pair(apply, revert));
        }
    }
}

/// Ports an event switches, sorted and deduplicated
pub fn affected_ports(event: &FailureEvent, model: &TopologyModel) -> Vec<Endpoint> {
    let mut ports: BTreeSet<Endpoint> = BTreeSet::new();
    match &event.target {
        EventTarget::Link { link } => {
            if let Ok(link) = model.link(*link) {
                ports.extend(link.endpoints());
            }
        }
        EventTarget::Interface { node, port } => {
            ports.insert(Endpoint::new(*node, *port));
        }
        EventTarget::Node { node } => {
            if let Ok(n) = model.node(*node) {
                ports.extend(n.connected_ports().map(|p| Endpoint::new(*node, p.index)));
            }
        }
        EventTarget::Groups { a, b } => {
            for link in model.links() {
                let [x, y] = link.endpoints();
                let crosses = (a.contains(&x.node) && b.contains(&y.node)) || (b.contains(&x.node) && a.contains(&y.node));
                if crosses {
                    ports.extend([x, y]);
                }
            }
        }
    }
    ports.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{EventParams, FailureEvent};
    use crate::topology::{LinkKind, LinkSpec, NodeAttrs, NodeKind};

    /// h1 --l1-- r1 --l2-- h2
    fn line() -> (TopologyModel, [NodeId; 3], [LinkId; 2]) {
        let mut model = TopologyModel::new();
        let h1 = model.add_node(NodeKind::Host, NodeAttrs::named("h1"));
        let r1 = model.add_node(NodeKind::Router, NodeAttrs::named("r1"));
        let h2 = model.add_node(NodeKind::Host, NodeAttrs::named("h2"));
        let l1 = model.add_link(h1, 0, r1, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        let l2 = model.add_link(r1, 1, h2, 0, LinkKind::Microwave, LinkSpec::default()).unwrap();
        (model, [h1, r1, h2], [l1, l2])
    }

    #[test]
    fn test_link_down_with_duration_reverts() {
        let (model, [h1, r1, _], [l1, _]) = line();
        let mut scenario = FailureScenario::new("cut");
        scenario.add_event(FailureEvent::new(EventKind::LinkDown, EventTarget::Link { link: l1 }, 10.0, 5.0));

        let schedule = schedule(&scenario, &model).unwrap();
        assert_eq!(schedule.pairs.len(), 1);
        let ports = vec![Endpoint::new(h1, 0), Endpoint::new(r1, 0)];
        assert_eq!(schedule.pairs[0].apply, Effect { at: 10.0, action: Action::DisablePorts(ports.clone()) });
        assert_eq!(schedule.pairs[0].revert, Some(Effect { at: 15.0, action: Action::EnablePorts(ports) }));
    }

    #[test]
    fn test_permanent_power_loss_never_reverts() {
        let (model, [_, r1, _], _) = line();
        let mut scenario = FailureScenario::new("blackout");
        scenario.add_event(FailureEvent::new(EventKind::NodePowerLoss, EventTarget::Node { node: r1 }, 2.0, -1.0));

        let schedule = schedule(&scenario, &model).unwrap();
        assert_eq!(
            schedule.pairs[0].apply.action,
            Action::DisablePorts(vec![Endpoint::new(r1, 0), Endpoint::new(r1, 1)])
        );
        assert_eq!(schedule.pairs[0].revert, None);
    }

    #[test]
    fn test_degraded_reverts_only_when_bounded() {
        let (model, _, [_, l2]) = line();
        let params = EventParams { new_data_rate: Some(DataRate::from_kbps(64)), ..EventParams::default() };
        let mut scenario = FailureScenario::new("rain fade");
        scenario.add_event(
            FailureEvent::new(EventKind::LinkDegraded, EventTarget::Link { link: l2 }, 1.0, -1.0).with_params(params.clone()),
        );
        scenario.add_event(
            FailureEvent::new(EventKind::LinkDegraded, EventTarget::Link { link: l2 }, 2.0, -1.0)
                .with_params(EventParams { recovery_time: Some(8.0), ..params }),
        );

        let schedule = schedule(&scenario, &model).unwrap();
        assert_eq!(schedule.pairs[0].revert, None);
        assert_eq!(schedule.pairs[1].revert, Some(Effect { at: 8.0, action: Action::Restore { link: l2 } }));
    }

    #[test]
    fn test_flapping_expands_into_cycles() {
        let (model, _, [l1, _]) = line();
        let params = EventParams { up_duration: 3.0, down_duration: 1.0, flap_cycles: 3, ..EventParams::default() };
        let mut scenario = FailureScenario::new("flap");
        scenario.add_event(
            FailureEvent::new(EventKind::LinkFlapping, EventTarget::Link { link: l1 }, 5.0, -1.0).with_params(params),
        );

        let schedule = schedule(&scenario, &model).unwrap();
        let times: Vec<(f64, Option<f64>)> = schedule
            .pairs
            .iter()
            .map(|p| (p.apply.at, p.revert.as_ref().map(|r| r.at)))
            .collect();
        assert_eq!(times, vec![(5.0, Some(6.0)), (9.0, Some(10.0)), (13.0, Some(14.0))]);
        assert_eq!(schedule.effect_count(), 6);
    }

    #[test]
    fn test_partition_disables_crossing_links_only() {
        let (model, [h1, r1, h2], _) = line();
        let mut scenario = FailureScenario::new("split");
        let groups = EventTarget::Groups { a: vec![h1, r1], b: vec![h2] };
        scenario.add_event(FailureEvent::new(EventKind::NetworkPartition, groups, 4.0, 2.0));

        let schedule = schedule(&scenario, &model).unwrap();
        assert_eq!(
            schedule.pairs[0].apply.action,
            Action::DisablePorts(vec![Endpoint::new(r1, 1), Endpoint::new(h2, 0)])
        );
        assert_eq!(schedule.pairs[0].revert.as_ref().map(|r| r.at), Some(6.0));
    }

    #[test]
    fn test_invalid_events_are_reported_together() {
        let (model, [h1, ..], _) = line();
        let mut scenario = FailureScenario::new("broken");
        let missing = scenario.add_event(FailureEvent::new(
            EventKind::LinkDown,
            EventTarget::Link { link: LinkId(42) },
            1.0,
            1.0,
        ));
        let flood = scenario.add_event(FailureEvent::new(EventKind::TrafficFlood, EventTarget::Node { node: h1 }, 1.0, 1.0));
        let mismatched = scenario.add_event(FailureEvent::new(EventKind::NodeReboot, EventTarget::Link { link: LinkId(1) }, 1.0, 1.0));

        let Err(ModelError::InvalidTopology { violations }) = schedule(&scenario, &model) else {
            panic!("expected invalid topology");
        };
        assert_eq!(
            violations,
            vec![
                Violation::EventTargetMissing { event: missing, entity: Entity::Link, id: "l42".to_string() },
                Violation::EventParameterMissing { event: flood, field: "flood_source" },
                Violation::EventTargetMismatch { event: mismatched, kind: EventKind::NodeReboot, target: "link" },
            ]
        );
    }

    #[test]
    fn test_timeline_orders_by_time_and_skips_cancelled() {
        let (model, [_, r1, _], [l1, l2]) = line();
        let mut scenario = FailureScenario::new("mixed");
        scenario.add_event(FailureEvent::new(EventKind::LinkDown, EventTarget::Link { link: l1 }, 1.0, 10.0));
        let cancelled = scenario.add_event(FailureEvent::new(EventKind::LinkDown, EventTarget::Link { link: l2 }, 2.0, 1.0));
        scenario.add_event(FailureEvent::new(EventKind::NodeReboot, EventTarget::Node { node: r1 }, 3.0, -1.0));
        scenario.cancel(cancelled).unwrap();

        let schedule = schedule(&scenario, &model).unwrap();
        let timeline: Vec<(f64, Phase)> = schedule.timeline().iter().map(|e| (e.at, e.phase)).collect();
        assert_eq!(
            timeline,
            vec![(1.0, Phase::Apply), (3.0, Phase::Apply), (11.0, Phase::Revert), (33.0, Phase::Revert)]
        );
    }
}
