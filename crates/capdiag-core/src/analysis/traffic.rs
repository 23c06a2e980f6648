use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::frame::Frame;
use crate::{Conversation, PortStat, TrafficSummary};

use super::flows::FlowKey;

pub(crate) const TOP_PORT_LIMIT: usize = 20;
pub(crate) const TOP_CONVERSATION_LIMIT: usize = 20;

#[derive(Debug, Default)]
pub(crate) struct TrafficStats {
    protocols: BTreeMap<String, u64>,
    ports: HashMap<u16, u64>,
    conversations: HashMap<FlowKey, ConversationTotals>,
    addresses: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct ConversationTotals {
    packets: u64,
    bytes: u64,
}

pub(crate) fn add_traffic_frame(stats: &mut TrafficStats, frame: &Frame) {
    if let Some(net) = &frame.network {
        *stats
            .protocols
            .entry(protocol_name(net.protocol))
            .or_default() += 1;

        let src = net.src.to_string();
        let dst = net.dst.to_string();
        let totals = stats
            .conversations
            .entry(FlowKey::new(&src, &dst))
            .or_default();
        totals.packets += 1;
        totals.bytes += frame.size_bytes;

        stats.addresses.insert(src);
        stats.addresses.insert(dst);
    }

    if let Some(transport) = &frame.transport {
        *stats.ports.entry(transport.dst_port()).or_default() += 1;
    }
}

pub(crate) fn build_traffic_summary(
    stats: TrafficStats,
) -> (TrafficSummary, BTreeMap<String, u64>) {
    let mut top_ports: Vec<PortStat> = stats
        .ports
        .into_iter()
        .map(|(port, count)| PortStat { port, count })
        .collect();
    top_ports.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.port.cmp(&b.port)));
    top_ports.truncate(TOP_PORT_LIMIT);

    let mut top_conversations: Vec<Conversation> = stats
        .conversations
        .into_iter()
        .map(|(key, totals)| Conversation {
            endpoints: vec![key.a, key.b],
            packets: totals.packets,
            bytes: totals.bytes,
        })
        .collect();
    top_conversations.sort_by(|a, b| {
        b.packets
            .cmp(&a.packets)
            .then_with(|| a.endpoints.cmp(&b.endpoints))
    });
    top_conversations.truncate(TOP_CONVERSATION_LIMIT);

    (
        TrafficSummary {
            top_ports,
            top_conversations,
            unique_ips: stats.addresses.len() as u64,
        },
        stats.protocols,
    )
}

pub(crate) fn protocol_name(protocol: u8) -> String {
    match protocol {
        1 => "ICMP".to_string(),
        6 => "TCP".to_string(),
        17 => "UDP".to_string(),
        47 => "GRE".to_string(),
        50 => "ESP".to_string(),
        51 => "AH".to_string(),
        89 => "OSPF".to_string(),
        other => format!("Protocol {}", other),
    }
}
