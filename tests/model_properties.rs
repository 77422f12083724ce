//! Property checks on topology mutations and address assignment.

use gridnetsim::ip::AddressPolicy;
use gridnetsim::topology::{Link, LinkKind, LinkSpec, Node, NodeAttrs, NodeId, NodeKind, TopologyModel};
use proptest::prelude::*;

const KINDS: [NodeKind; 4] = [NodeKind::Host, NodeKind::Router, NodeKind::Switch, NodeKind::Rtu];

fn free_port(model: &TopologyModel, node: NodeId) -> Option<u32> {
    model
        .node(node)
        .ok()?
        .ports()
        .iter()
        .find(|p| !p.is_connected())
        .map(|p| p.index)
}

/// Build a model from node kinds and candidate edges; edges without a free
/// port on either side are skipped.
fn build(kinds: &[usize], edges: &[(usize, usize)]) -> (TopologyModel, Vec<NodeId>) {
    let mut model = TopologyModel::new();
    let ids: Vec<NodeId> = kinds
        .iter()
        .enumerate()
        .map(|(i, k)| model.add_node(KINDS[*k], NodeAttrs::named(format!("n{}", i))))
        .collect();
    for (a, b) in edges {
        let (a, b) = (ids[a % ids.len()], ids[b % ids.len()]);
        if a == b {
            continue;
        }
        if let (Some(pa), Some(pb)) = (free_port(&model, a), free_port(&model, b)) {
            model.add_link(a, pa, b, pb, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        }
    }
    (model, ids)
}

fn nodes_of(model: &TopologyModel) -> Vec<Node> {
    model.nodes().cloned().collect()
}

fn links_of(model: &TopologyModel) -> Vec<Link> {
    model.links().cloned().collect()
}

fn arb_shape() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize)>)> {
    (
        prop::collection::vec(0..KINDS.len(), 2..8),
        prop::collection::vec((0usize..8, 0usize..8), 0..12),
    )
}

proptest! {
    #[test]
    fn add_then_remove_link_round_trips((kinds, edges) in arb_shape(), a in 0usize..8, b in 0usize..8) {
        let (mut model, ids) = build(&kinds, &edges);
        let (a, b) = (ids[a % ids.len()], ids[b % ids.len()]);
        prop_assume!(a != b);
        let (Some(pa), Some(pb)) = (free_port(&model, a), free_port(&model, b)) else {
            return Ok(());
        };

        let nodes = nodes_of(&model);
        let links = links_of(&model);
        let link = model.add_link(a, pa, b, pb, LinkKind::Fiber, LinkSpec::default()).unwrap();
        prop_assert!(model.node(a).unwrap().port(pa).unwrap().is_connected());
        model.remove_link(link).unwrap();

        prop_assert_eq!(nodes_of(&model), nodes);
        prop_assert_eq!(links_of(&model), links);
    }

    #[test]
    fn cascade_removal_drops_exactly_the_touching_links((kinds, edges) in arb_shape(), victim in 0usize..8) {
        let (mut model, ids) = build(&kinds, &edges);
        let victim = ids[victim % ids.len()];
        let before = model.link_count();
        let touching = model.links_of(victim);

        let removed = model.remove_node(victim, true).unwrap();
        prop_assert_eq!(removed.len(), touching.len());
        prop_assert_eq!(model.link_count(), before - touching.len());
        for link in model.links() {
            prop_assert!(link.a().node != victim && link.b().node != victim);
        }
    }

    #[test]
    fn address_assignment_is_deterministic((kinds, edges) in arb_shape()) {
        let (mut model, _) = build(&kinds, &edges);
        let mut twin = model.clone();
        let policy = AddressPolicy::default();

        model.assign_addresses(&policy).unwrap();
        let first = nodes_of(&model);
        model.assign_addresses(&policy).unwrap();
        prop_assert_eq!(nodes_of(&model), first.clone());

        twin.assign_addresses(&policy).unwrap();
        prop_assert_eq!(nodes_of(&twin), first);
    }
}
