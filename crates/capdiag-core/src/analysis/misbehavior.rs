use std::collections::{HashMap, HashSet};

use crate::frame::{Frame, TransportHeader};
use crate::{MisbehaviorSummary, RetransmissionStat, Talker};

pub(crate) const TOP_TALKER_LIMIT: usize = 20;
pub(crate) const RETRANSMITTER_LIMIT: usize = 10;

#[derive(Debug, Default)]
pub(crate) struct MisbehaviorStats {
    talkers: HashMap<String, u64>,
    retransmissions: HashMap<String, u64>,
    /// TCP segments already observed, keyed by 5-tuple including the
    /// sequence number. Sequence reuse is the sole retransmission signal.
    seen_segments: HashSet<(String, String, u16, u16, u32)>,
}

pub(crate) fn add_misbehavior_frame(stats: &mut MisbehaviorStats, frame: &Frame) {
    let net = match &frame.network {
        Some(net) => net,
        None => return,
    };
    let src = net.src.to_string();
    *stats.talkers.entry(src.clone()).or_default() += 1;

    if let Some(TransportHeader::Tcp {
        src_port,
        dst_port,
        sequence,
        ..
    }) = &frame.transport
    {
        let key = (
            src.clone(),
            net.dst.to_string(),
            *src_port,
            *dst_port,
            *sequence,
        );
        if !stats.seen_segments.insert(key) {
            *stats.retransmissions.entry(src).or_default() += 1;
        }
    }
}

pub(crate) fn build_misbehavior_summary(stats: MisbehaviorStats) -> MisbehaviorSummary {
    let total_retransmissions = stats.retransmissions.values().sum();

    let mut retransmissions: Vec<RetransmissionStat> = stats
        .retransmissions
        .iter()
        .map(|(ip, &count)| RetransmissionStat {
            ip: ip.clone(),
            retransmission_count: count,
            retransmission_rate: match stats.talkers.get(ip) {
                Some(&packets) if packets > 0 => count as f64 / packets as f64 * 100.0,
                _ => 0.0,
            },
        })
        .collect();
    retransmissions.sort_by(|a, b| {
        b.retransmission_count
            .cmp(&a.retransmission_count)
            .then_with(|| a.ip.cmp(&b.ip))
    });
    retransmissions.truncate(RETRANSMITTER_LIMIT);

    let mut top_talkers: Vec<Talker> = stats
        .talkers
        .into_iter()
        .map(|(ip, packet_count)| Talker { ip, packet_count })
        .collect();
    top_talkers.sort_by(|a, b| {
        b.packet_count
            .cmp(&a.packet_count)
            .then_with(|| a.ip.cmp(&b.ip))
    });
    top_talkers.truncate(TOP_TALKER_LIMIT);

    MisbehaviorSummary {
        top_talkers,
        retransmissions,
        total_retransmissions,
    }
}
