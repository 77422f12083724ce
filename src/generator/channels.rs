//! Channel emission.
//!
//! Every link kind maps to one entry of [`channel_mapping`]: a native
//! construct, a declared fallback, or no mapping at all. Fallbacks are
//! always spelled out in the emitted program.

use log::{debug, warn};

use super::context::EmitContext;
use super::writer::{py_float, ScriptWriter};
use crate::error::{ModelError, Result};
use crate::topology::{Link, LinkKind, TopologyModel};

/// Engine construct a link is emitted as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    /// Dedicated two-endpoint channel
    PointToPoint,
    /// Shared bus
    Csma,
}

impl Construct {
    pub fn as_str(self) -> &'static str {
        match self {
            Construct::PointToPoint => "point-to-point",
            Construct::Csma => "csma",
        }
    }

    /// Name of the helper variable configuring this construct
    pub fn helper(self) -> &'static str {
        match self {
            Construct::PointToPoint => "p2p",
            Construct::Csma => "csma",
        }
    }

    /// ns-3 net device class the helper installs
    pub fn device_type(self) -> &'static str {
        match self {
            Construct::PointToPoint => "PointToPointNetDevice",
            Construct::Csma => "CsmaNetDevice",
        }
    }
}

/// How a link kind is realized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMapping {
    Native(Construct),
    Fallback { construct: Construct, reason: &'static str },
    Unsupported { reason: &'static str },
}

/// The kind → construct table
pub fn channel_mapping(kind: LinkKind) -> ChannelMapping {
    use ChannelMapping::*;
    use Construct::*;
    match kind {
        LinkKind::PointToPoint
        | LinkKind::Fiber
        | LinkKind::CopperSerial
        | LinkKind::Microwave
        | LinkKind::LicensedRadio
        | LinkKind::SpreadSpectrum => Native(PointToPoint),
        LinkKind::Csma | LinkKind::EthernetLan => Native(Csma),
        LinkKind::CellularLte | LinkKind::Cellular5g | LinkKind::PrivateLte => Fallback {
            construct: PointToPoint,
            reason: "no LTE/EPC stack is wired",
        },
        LinkKind::SatelliteGeo | LinkKind::SatelliteLeo => Fallback {
            construct: PointToPoint,
            reason: "no satellite channel model",
        },
        LinkKind::Wimax => Fallback { construct: PointToPoint, reason: "no WiMAX module" },
        LinkKind::Zigbee => Fallback { construct: PointToPoint, reason: "no LR-WPAN stack is wired" },
        LinkKind::WifiMesh => Unsupported { reason: "needs a Wi-Fi PHY and mesh stack" },
        LinkKind::Emulated => Unsupported { reason: "needs a real network device" },
    }
}

/// One link as it will be emitted
#[derive(Debug, Clone)]
pub struct ChannelPlan<'a> {
    pub index: usize,
    pub link: &'a Link,
    pub construct: Construct,
    /// Why the emitted construct differs from the modelled medium
    pub substitution: Option<String>,
}

impl ChannelPlan<'_> {
    /// Variable holding the two installed devices
    pub fn devices(&self) -> String {
        format!("devices{}", self.index)
    }
}

/// Map every link, failing on the first kind with no mapping
pub fn plan_channels(model: &TopologyModel) -> Result<Vec<ChannelPlan<'_>>> {
    let mut plans = Vec::with_capacity(model.link_count());
    for (index, link) in model.links().enumerate() {
        let (mut construct, mut reasons) = match channel_mapping(link.kind()) {
            ChannelMapping::Native(construct) => (construct, Vec::new()),
            ChannelMapping::Fallback { construct, reason } => (construct, vec![reason]),
            ChannelMapping::Unsupported { reason } => {
                debug!("{} of kind {} is unsupported: {}", link.id(), link.kind(), reason);
                return Err(ModelError::UnsupportedLinkKind { link: link.id(), kind: link.kind() });
            }
        };

        let bridged = link
            .endpoints()
            .iter()
            .any(|e| model.node(e.node).map(|n| n.kind().is_bridge()).unwrap_or(false));
        if bridged && construct == Construct::PointToPoint {
            construct = Construct::Csma;
            reasons.push("bridge endpoint needs a CSMA device");
        }

        let substitution = (!reasons.is_empty()).then(|| reasons.join("; "));
        if let Some(reason) = &substitution {
            warn!("{} ({}) emitted as {}: {}", link.id(), link.kind(), construct.as_str(), reason);
        }
        plans.push(ChannelPlan { index, link, construct, substitution });
    }
    Ok(plans)
}

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    w.section("channels");
    for construct in [Construct::PointToPoint, Construct::Csma] {
        if ctx.channels.iter().any(|c| c.construct == construct) {
            let class = match construct {
                Construct::PointToPoint => "PointToPointHelper",
                Construct::Csma => "CsmaHelper",
            };
            w.line(format!("{} = ns.{}()", construct.helper(), class));
        }
    }

    for plan in &ctx.channels {
        w.blank();
        emit_channel(ctx, plan, w);
    }
    w.blank();
}

fn emit_channel(ctx: &EmitContext<'_>, plan: &ChannelPlan<'_>, w: &mut ScriptWriter) {
    let link = plan.link;
    let [a, b] = link.endpoints();
    w.comment(format!(
        "[link {}] id={} kind={} construct={}",
        plan.index,
        link.id(),
        link.kind(),
        plan.construct.as_str()
    ));
    let mut about = format!("{} <-> {}", a, b);
    if !link.name.is_empty() {
        about = format!("{} {}", link.name, about);
    }
    if link.redundancy.is_backup {
        match link.redundancy.backs_up {
            Some(primary) => about.push_str(&format!(", backup of {}", primary)),
            None => about.push_str(", backup path"),
        }
    }
    w.comment(about);
    if let Some(reason) = &plan.substitution {
        w.comment(format!(
            "[substitution] link={} kind={} construct={} reason={}",
            link.id(),
            link.kind(),
            plan.construct.as_str(),
            reason
        ));
    }

    let helper = plan.construct.helper();
    let rate_target = match plan.construct {
        Construct::PointToPoint => "SetDeviceAttribute",
        Construct::Csma => "SetChannelAttribute",
    };
    w.line(format!(
        "{}.{}('DataRate', ns.StringValue('{}'))",
        helper, rate_target, link.params.data_rate
    ));
    w.line(format!("{}.SetChannelAttribute('Delay', ns.StringValue('{}'))", helper, link.params.delay));

    let members = format!("link{}_nodes", plan.index);
    w.line(format!("{} = ns.NodeContainer()", members));
    for endpoint in [a, b] {
        if let Some(index) = ctx.node_index(endpoint.node) {
            w.line(format!("{}.Add(nodes.Get({}))", members, index));
        }
    }
    w.line(format!("{} = {}.Install({})", plan.devices(), helper, members));

    if link.params.bit_error_rate > 0.0 {
        let model = format!("error_model{}", plan.index);
        w.line(format!("{} = ns.CreateObject[ns.RateErrorModel]()", model));
        w.line(format!("{}.SetAttribute('ErrorUnit', ns.StringValue('ERROR_UNIT_BIT'))", model));
        w.line(format!(
            "{}.SetAttribute('ErrorRate', ns.DoubleValue({}))",
            model,
            py_float(link.params.bit_error_rate)
        ));
        for side in 0..2 {
            w.line(format!(
                "{}.Get({}).SetAttribute('ReceiveErrorModel', ns.PointerValue({}))",
                plan.devices(),
                side,
                model
            ));
        }
    }
}
