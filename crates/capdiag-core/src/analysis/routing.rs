use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::frame::{Frame, TransportHeader};
use crate::{AsymmetricFlow, BgpPeer, RoutingAnalysis};

use super::flows::FlowKey;

pub(crate) const OSPF_PROTOCOL: u8 = 89;
pub(crate) const BGP_PORT: u16 = 179;
/// Flows at or below this packet total are too small to judge.
pub(crate) const ASYMMETRY_MIN_PACKETS: u64 = 10;
pub(crate) const ASYMMETRY_RATIO: f64 = 0.7;
pub(crate) const ASYMMETRIC_FLOW_LIMIT: usize = 10;

#[derive(Debug, Default)]
pub(crate) struct RoutingStats {
    ospf_packets: u64,
    ospf_neighbors: BTreeSet<String>,
    bgp_packets: u64,
    bgp_peers: BTreeSet<(String, String)>,
    flows: BTreeMap<FlowKey, DirectionalCounts>,
}

#[derive(Debug, Default)]
struct DirectionalCounts {
    dir1: u64,
    dir2: u64,
}

pub(crate) fn add_routing_frame(stats: &mut RoutingStats, frame: &Frame) {
    let net = match &frame.network {
        Some(net) => net,
        None => return,
    };
    let src = net.src.to_string();
    let dst = net.dst.to_string();

    if net.protocol == OSPF_PROTOCOL {
        stats.ospf_packets += 1;
        stats.ospf_neighbors.insert(src.clone());
    }

    if let Some(TransportHeader::Tcp {
        src_port, dst_port, ..
    }) = &frame.transport
    {
        if *src_port == BGP_PORT || *dst_port == BGP_PORT {
            stats.bgp_packets += 1;
            stats.bgp_peers.insert((src.clone(), dst.clone()));
        }
    }

    let counts = stats.flows.entry(FlowKey::new(&src, &dst)).or_default();
    if src < dst {
        counts.dir1 += 1;
    } else {
        counts.dir2 += 1;
    }
}

pub(crate) fn build_routing_analysis(stats: RoutingStats) -> RoutingAnalysis {
    let mut asymmetric_flows: Vec<AsymmetricFlow> = stats
        .flows
        .iter()
        .filter_map(|(key, counts)| {
            let total = counts.dir1 + counts.dir2;
            if total <= ASYMMETRY_MIN_PACKETS {
                return None;
            }
            let ratio = (counts.dir1 as f64 - counts.dir2 as f64).abs() / total as f64;
            (ratio > ASYMMETRY_RATIO).then(|| AsymmetricFlow {
                endpoints: vec![key.a.clone(), key.b.clone()],
                packets_direction_1: counts.dir1,
                packets_direction_2: counts.dir2,
                imbalance_ratio: ratio,
            })
        })
        .collect();
    asymmetric_flows.sort_by(|a, b| {
        b.imbalance_ratio
            .partial_cmp(&a.imbalance_ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.endpoints.cmp(&b.endpoints))
    });
    asymmetric_flows.truncate(ASYMMETRIC_FLOW_LIMIT);

    RoutingAnalysis {
        ospf_packets_detected: stats.ospf_packets,
        ospf_neighbors: stats.ospf_neighbors.into_iter().collect(),
        bgp_packets_detected: stats.bgp_packets,
        bgp_peers: stats
            .bgp_peers
            .into_iter()
            .map(|(src, dst)| BgpPeer { src, dst })
            .collect(),
        asymmetric_routing_detected: !asymmetric_flows.is_empty(),
        asymmetric_flows,
    }
}
