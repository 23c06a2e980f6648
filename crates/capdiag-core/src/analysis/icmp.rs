use std::collections::{BTreeMap, HashMap};

use crate::frame::Frame;
use crate::{IcmpAnalysis, TracerouteHop, UnreachableRecord};

pub(crate) const ECHO_REPLY: u8 = 0;
pub(crate) const DEST_UNREACHABLE: u8 = 3;
pub(crate) const ECHO_REQUEST: u8 = 8;
pub(crate) const TIME_EXCEEDED: u8 = 11;

pub(crate) const UNREACHABLE_LIMIT: usize = 20;

#[derive(Debug, Default)]
pub(crate) struct IcmpStats {
    total: u64,
    requests: Vec<EchoRecord>,
    replies: Vec<EchoRecord>,
    unreachable: Vec<UnreachableRecord>,
    unreachable_total: u64,
    hops: BTreeMap<String, Vec<TracerouteHop>>,
}

#[derive(Debug)]
struct EchoRecord {
    src: Option<String>,
    dst: Option<String>,
    ts: f64,
}

pub(crate) fn add_icmp_frame(stats: &mut IcmpStats, frame: &Frame) {
    let icmp = match &frame.icmp {
        Some(icmp) => icmp,
        None => return,
    };
    stats.total += 1;

    let src = frame.network.as_ref().map(|net| net.src.to_string());
    let dst = frame.network.as_ref().map(|net| net.dst.to_string());

    match icmp.icmp_type {
        ECHO_REQUEST => stats.requests.push(EchoRecord {
            src,
            dst,
            ts: frame.timestamp,
        }),
        ECHO_REPLY => stats.replies.push(EchoRecord {
            src,
            dst,
            ts: frame.timestamp,
        }),
        DEST_UNREACHABLE => {
            stats.unreachable_total += 1;
            if stats.unreachable.len() < UNREACHABLE_LIMIT {
                stats.unreachable.push(UnreachableRecord {
                    timestamp: frame.timestamp,
                    src_ip: src,
                    dst_ip: dst,
                    icmp_type: icmp.icmp_type,
                    code: icmp.code,
                    type_name: icmp_type_name(icmp.icmp_type, icmp.code),
                    unreachable_type: unreachable_name(icmp.code),
                });
            }
        }
        TIME_EXCEEDED => {
            // The responder is an intermediate hop; record it with the TTL
            // the time-exceeded frame itself arrived with.
            if let (Some(src), Some(net)) = (src, frame.network.as_ref()) {
                stats.hops.entry(src.clone()).or_default().push(TracerouteHop {
                    hop: net.ttl,
                    ip: src,
                    timestamp: frame.timestamp,
                });
            }
        }
        _ => {}
    }
}

pub(crate) fn build_icmp_analysis(stats: IcmpStats) -> IcmpAnalysis {
    // Pair replies to requests by reversed endpoint key; the last request
    // per (src, dst) wins, matching id-less echo correlation.
    let mut request_map: HashMap<(Option<String>, Option<String>), f64> = HashMap::new();
    for request in &stats.requests {
        request_map.insert((request.src.clone(), request.dst.clone()), request.ts);
    }

    let mut latencies = Vec::new();
    for reply in &stats.replies {
        if let Some(request_ts) = request_map.get(&(reply.dst.clone(), reply.src.clone())) {
            latencies.push((reply.ts - request_ts) * 1000.0);
        }
    }
    let average_ping_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    IcmpAnalysis {
        total_icmp_packets: stats.total,
        ping_requests: stats.requests.len() as u64,
        ping_replies: stats.replies.len() as u64,
        average_ping_latency_ms,
        unreachable_destinations: stats.unreachable,
        unreachable_count: stats.unreachable_total,
        traceroute_detected: !stats.hops.is_empty(),
        traceroute_hops: stats.hops,
    }
}

pub(crate) fn icmp_type_name(icmp_type: u8, code: u8) -> String {
    match icmp_type {
        ECHO_REPLY => "Echo Reply".to_string(),
        DEST_UNREACHABLE => format!("Destination Unreachable ({})", unreachable_name(code)),
        ECHO_REQUEST => "Echo Request".to_string(),
        TIME_EXCEEDED => "Time Exceeded".to_string(),
        12 => "Parameter Problem".to_string(),
        other => format!("ICMP Type {}", other),
    }
}

pub(crate) fn unreachable_name(code: u8) -> String {
    match code {
        0 => "Network Unreachable".to_string(),
        1 => "Host Unreachable".to_string(),
        2 => "Protocol Unreachable".to_string(),
        3 => "Port Unreachable".to_string(),
        4 => "Fragmentation Needed".to_string(),
        5 => "Source Route Failed".to_string(),
        13 => "Administratively Prohibited".to_string(),
        other => format!("Code {}", other),
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::{IcmpStats, add_icmp_frame, build_icmp_analysis, icmp_type_name};
    use crate::frame::{Frame, IcmpHeader, NetworkHeader};

    fn icmp_frame(src: &str, dst: &str, icmp_type: u8, code: u8, ts: f64) -> Frame {
        Frame {
            timestamp: ts,
            size_bytes: 98,
            network: Some(NetworkHeader {
                src: src.parse::<IpAddr>().unwrap(),
                dst: dst.parse::<IpAddr>().unwrap(),
                protocol: 1,
                ttl: 64,
            }),
            icmp: Some(IcmpHeader { icmp_type, code }),
            ..Frame::default()
        }
    }

    fn run(frames: &[Frame]) -> crate::IcmpAnalysis {
        let mut stats = IcmpStats::default();
        for frame in frames {
            add_icmp_frame(&mut stats, frame);
        }
        build_icmp_analysis(stats)
    }

    #[test]
    fn echo_pair_latency_uses_reversed_key() {
        let analysis = run(&[
            icmp_frame("10.0.0.1", "10.0.0.2", 8, 0, 0.0),
            icmp_frame("10.0.0.2", "10.0.0.1", 0, 0, 0.05),
        ]);
        assert_eq!(analysis.ping_requests, 1);
        assert_eq!(analysis.ping_replies, 1);
        assert!((analysis.average_ping_latency_ms - 50.0).abs() < 1e-9);
    }

    #[test]
    fn reply_without_request_contributes_no_latency() {
        let analysis = run(&[icmp_frame("10.0.0.2", "10.0.0.1", 0, 0, 1.0)]);
        assert_eq!(analysis.ping_replies, 1);
        assert_eq!(analysis.average_ping_latency_ms, 0.0);
    }

    #[test]
    fn unreachable_list_caps_but_count_does_not() {
        let frames: Vec<Frame> = (0..25)
            .map(|i| icmp_frame("10.0.0.1", "10.0.0.2", 3, 3, i as f64))
            .collect();
        let analysis = run(&frames);
        assert_eq!(analysis.unreachable_destinations.len(), 20);
        assert_eq!(analysis.unreachable_count, 25);
        let record = &analysis.unreachable_destinations[0];
        assert_eq!(record.unreachable_type, "Port Unreachable");
        assert_eq!(record.type_name, "Destination Unreachable (Port Unreachable)");
    }

    #[test]
    fn time_exceeded_groups_hops_by_responder() {
        let analysis = run(&[
            icmp_frame("10.0.0.254", "192.168.1.10", 11, 0, 0.0),
            icmp_frame("10.0.0.254", "192.168.1.10", 11, 0, 0.5),
            icmp_frame("10.0.1.254", "192.168.1.10", 11, 0, 1.0),
        ]);
        assert!(analysis.traceroute_detected);
        assert_eq!(analysis.traceroute_hops.len(), 2);
        assert_eq!(analysis.traceroute_hops["10.0.0.254"].len(), 2);
        assert_eq!(analysis.traceroute_hops["10.0.0.254"][0].hop, 64);
    }

    #[test]
    fn type_names() {
        assert_eq!(icmp_type_name(8, 0), "Echo Request");
        assert_eq!(icmp_type_name(3, 1), "Destination Unreachable (Host Unreachable)");
        assert_eq!(icmp_type_name(42, 0), "ICMP Type 42");
    }
}
