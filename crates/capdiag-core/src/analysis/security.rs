use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::frame::{Frame, TransportHeader};
use crate::{BlockEvidence, DdosSuspect, PortScan, SecurityAnalysis, SynFlood};

use super::icmp::DEST_UNREACHABLE;

// Detection thresholds. Fixed policy inherited from the reference analyzer,
// kept as named constants rather than configuration.
pub(crate) const PORT_SCAN_THRESHOLD: usize = 20;
pub(crate) const PORT_LIST_LIMIT: usize = 50;
pub(crate) const DDOS_PACKET_THRESHOLD: u64 = 1000;
pub(crate) const DDOS_SUSPECT_LIMIT: usize = 10;
pub(crate) const SYN_FLOOD_THRESHOLD: u64 = 50;
pub(crate) const SYN_ACK_RATIO: f64 = 5.0;
pub(crate) const BLOCK_EVIDENCE_LIMIT: usize = 50;

#[derive(Debug, Default)]
pub(crate) struct SecurityStats {
    tcp_rst_count: u64,
    connections: BTreeMap<(String, String), TcpFlagCounts>,
    scan_ports: BTreeMap<String, BTreeSet<u16>>,
    volume: HashMap<String, u64>,
    blocks: Vec<BlockEvidence>,
    blocks_total: u64,
}

#[derive(Debug, Default)]
struct TcpFlagCounts {
    syn: u64,
    ack: u64,
    rst: u64,
    fin: u64,
}

pub(crate) fn add_security_frame(stats: &mut SecurityStats, frame: &Frame) {
    let net = match &frame.network {
        Some(net) => net,
        None => return,
    };
    let src = net.src.to_string();
    let dst = net.dst.to_string();

    *stats.volume.entry(src.clone()).or_default() += 1;

    if let Some(TransportHeader::Tcp {
        dst_port, flags, ..
    }) = &frame.transport
    {
        let counts = stats
            .connections
            .entry((src.clone(), dst.clone()))
            .or_default();
        // A multi-flag frame (e.g. SYN-ACK) increments several counters.
        if flags.syn {
            counts.syn += 1;
        }
        if flags.ack {
            counts.ack += 1;
        }
        if flags.rst {
            counts.rst += 1;
            stats.tcp_rst_count += 1;
        }
        if flags.fin {
            counts.fin += 1;
        }

        stats
            .scan_ports
            .entry(src.clone())
            .or_default()
            .insert(*dst_port);

        if flags.rst {
            push_block(
                stats,
                BlockEvidence {
                    timestamp: frame.timestamp,
                    blocked_src: src.clone(),
                    blocked_dst: dst.clone(),
                    blocked_port: Some(*dst_port),
                    reason: "TCP RST received".to_string(),
                    icmp_code: None,
                },
            );
        }
    }

    if let Some(icmp) = &frame.icmp {
        if icmp.icmp_type == DEST_UNREACHABLE {
            push_block(
                stats,
                BlockEvidence {
                    timestamp: frame.timestamp,
                    blocked_src: src,
                    blocked_dst: dst,
                    blocked_port: None,
                    reason: "ICMP Unreachable".to_string(),
                    icmp_code: Some(icmp.code),
                },
            );
        }
    }
}

fn push_block(stats: &mut SecurityStats, evidence: BlockEvidence) {
    stats.blocks_total += 1;
    if stats.blocks.len() < BLOCK_EVIDENCE_LIMIT {
        stats.blocks.push(evidence);
    }
}

pub(crate) fn build_security_analysis(stats: SecurityStats, total_packets: u64) -> SecurityAnalysis {
    let port_scans: Vec<PortScan> = stats
        .scan_ports
        .into_iter()
        .filter(|(_, ports)| ports.len() > PORT_SCAN_THRESHOLD)
        .map(|(source_ip, ports)| PortScan {
            source_ip,
            ports_scanned: ports.len() as u64,
            port_list: ports.into_iter().take(PORT_LIST_LIMIT).collect(),
        })
        .collect();

    let mut ddos_suspects: Vec<DdosSuspect> = stats
        .volume
        .into_iter()
        .filter(|(_, count)| *count > DDOS_PACKET_THRESHOLD)
        .map(|(source_ip, packet_count)| DdosSuspect {
            source_ip,
            packet_count,
            percentage: if total_packets > 0 {
                packet_count as f64 / total_packets as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();
    ddos_suspects.sort_by(|a, b| {
        b.packet_count
            .cmp(&a.packet_count)
            .then_with(|| a.source_ip.cmp(&b.source_ip))
    });
    ddos_suspects.truncate(DDOS_SUSPECT_LIMIT);

    let syn_floods: Vec<SynFlood> = stats
        .connections
        .iter()
        .filter_map(|((src, dst), counts)| {
            let ratio = counts.syn as f64 / counts.ack.max(1) as f64;
            (counts.syn > SYN_FLOOD_THRESHOLD && ratio > SYN_ACK_RATIO).then(|| SynFlood {
                connection: format!("{} -> {}", src, dst),
                syn_count: counts.syn,
                ack_count: counts.ack,
                ratio,
            })
        })
        .collect();

    SecurityAnalysis {
        tcp_rst_count: stats.tcp_rst_count,
        port_scan_count: port_scans.len() as u64,
        port_scans_detected: port_scans,
        ddos_suspect_count: ddos_suspects.len() as u64,
        ddos_suspects,
        acl_block_count: stats.blocks_total,
        acl_firewall_blocks: stats.blocks,
        syn_flood_count: syn_floods.len() as u64,
        syn_flood_detected: syn_floods,
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::{SecurityStats, add_security_frame, build_security_analysis};
    use crate::frame::{Frame, IcmpHeader, NetworkHeader, TcpFlags, TransportHeader};

    fn tcp_frame(src: &str, dst: &str, dst_port: u16, flags: TcpFlags) -> Frame {
        Frame {
            timestamp: 0.0,
            size_bytes: 60,
            network: Some(NetworkHeader {
                src: src.parse::<IpAddr>().unwrap(),
                dst: dst.parse::<IpAddr>().unwrap(),
                protocol: 6,
                ttl: 64,
            }),
            transport: Some(TransportHeader::Tcp {
                src_port: 40000,
                dst_port,
                flags,
                sequence: 0,
                acknowledgment: 0,
            }),
            ..Frame::default()
        }
    }

    fn syn() -> TcpFlags {
        TcpFlags {
            syn: true,
            ..TcpFlags::default()
        }
    }

    fn run(frames: &[Frame]) -> crate::SecurityAnalysis {
        let mut stats = SecurityStats::default();
        for frame in frames {
            add_security_frame(&mut stats, frame);
        }
        build_security_analysis(stats, frames.len() as u64)
    }

    #[test]
    fn port_scan_needs_more_than_threshold_ports() {
        // 20 distinct ports: at the threshold, not over it.
        let frames: Vec<Frame> = (0..20)
            .map(|i| tcp_frame("10.0.0.9", "10.0.0.2", 1000 + i, syn()))
            .collect();
        assert_eq!(run(&frames).port_scan_count, 0);

        let frames: Vec<Frame> = (0..21)
            .map(|i| tcp_frame("10.0.0.9", "10.0.0.2", 1000 + i, syn()))
            .collect();
        let analysis = run(&frames);
        assert_eq!(analysis.port_scan_count, 1);
        let scan = &analysis.port_scans_detected[0];
        assert_eq!(scan.source_ip, "10.0.0.9");
        assert_eq!(scan.ports_scanned, 21);
        assert_eq!(scan.port_list.first(), Some(&1000));
        assert_eq!(scan.port_list.last(), Some(&1020));
    }

    #[test]
    fn repeated_port_does_not_grow_the_scan_set() {
        let frames: Vec<Frame> = (0..30)
            .map(|_| tcp_frame("10.0.0.9", "10.0.0.2", 80, syn()))
            .collect();
        assert_eq!(run(&frames).port_scan_count, 0);
    }

    #[test]
    fn syn_flood_requires_count_and_ratio() {
        // 51 SYNs, no ACKs: ratio 51 > 5 and count > 50.
        let frames: Vec<Frame> = (0..51)
            .map(|_| tcp_frame("10.0.0.9", "10.0.0.2", 80, syn()))
            .collect();
        let analysis = run(&frames);
        assert_eq!(analysis.syn_flood_count, 1);
        let flood = &analysis.syn_flood_detected[0];
        assert_eq!(flood.connection, "10.0.0.9 -> 10.0.0.2");
        assert_eq!(flood.syn_count, 51);
        assert_eq!(flood.ack_count, 0);
        assert!(flood.ratio > 5.0);
    }

    #[test]
    fn acked_handshakes_are_not_a_flood() {
        // Same SYN volume but every SYN is acknowledged by the sender too;
        // ratio collapses below the flood ratio.
        let mut frames = Vec::new();
        for _ in 0..60 {
            frames.push(tcp_frame("10.0.0.9", "10.0.0.2", 80, syn()));
            frames.push(tcp_frame(
                "10.0.0.9",
                "10.0.0.2",
                80,
                TcpFlags {
                    ack: true,
                    ..TcpFlags::default()
                },
            ));
        }
        assert_eq!(run(&frames).syn_flood_count, 0);
    }

    #[test]
    fn syn_ack_increments_both_counters() {
        let frames = vec![tcp_frame(
            "10.0.0.1",
            "10.0.0.2",
            80,
            TcpFlags {
                syn: true,
                ack: true,
                ..TcpFlags::default()
            },
        )];
        let analysis = run(&frames);
        // Not a flood, but also proves multi-flag accounting via rst=0.
        assert_eq!(analysis.syn_flood_count, 0);
        assert_eq!(analysis.tcp_rst_count, 0);
    }

    #[test]
    fn rst_and_unreachable_become_block_evidence() {
        let mut frames = vec![tcp_frame(
            "10.0.0.2",
            "10.0.0.1",
            40000,
            TcpFlags {
                rst: true,
                ack: true,
                ..TcpFlags::default()
            },
        )];
        frames.push(Frame {
            timestamp: 1.0,
            size_bytes: 70,
            network: Some(NetworkHeader {
                src: "10.0.0.254".parse::<IpAddr>().unwrap(),
                dst: "10.0.0.1".parse::<IpAddr>().unwrap(),
                protocol: 1,
                ttl: 64,
            }),
            icmp: Some(IcmpHeader {
                icmp_type: 3,
                code: 13,
            }),
            ..Frame::default()
        });

        let analysis = run(&frames);
        assert_eq!(analysis.tcp_rst_count, 1);
        assert_eq!(analysis.acl_block_count, 2);
        assert_eq!(analysis.acl_firewall_blocks[0].reason, "TCP RST received");
        assert_eq!(analysis.acl_firewall_blocks[0].blocked_port, Some(40000));
        assert_eq!(analysis.acl_firewall_blocks[1].reason, "ICMP Unreachable");
        assert_eq!(analysis.acl_firewall_blocks[1].icmp_code, Some(13));
    }

    #[test]
    fn block_evidence_list_caps_at_fifty() {
        let frames: Vec<Frame> = (0..60)
            .map(|_| {
                tcp_frame(
                    "10.0.0.2",
                    "10.0.0.1",
                    40000,
                    TcpFlags {
                        rst: true,
                        ..TcpFlags::default()
                    },
                )
            })
            .collect();
        let analysis = run(&frames);
        assert_eq!(analysis.acl_firewall_blocks.len(), 50);
        assert_eq!(analysis.acl_block_count, 60);
    }

    #[test]
    fn ddos_suspect_requires_volume_over_threshold() {
        let frames: Vec<Frame> = (0..1001)
            .map(|_| tcp_frame("10.0.0.9", "10.0.0.2", 80, syn()))
            .collect();
        let analysis = run(&frames);
        assert_eq!(analysis.ddos_suspect_count, 1);
        let suspect = &analysis.ddos_suspects[0];
        assert_eq!(suspect.source_ip, "10.0.0.9");
        assert_eq!(suspect.packet_count, 1001);
        assert!((suspect.percentage - 100.0).abs() < 1e-9);
    }
}
