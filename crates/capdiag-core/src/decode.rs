//! Raw packet → [`Frame`] decoding.
//!
//! Slices link/network/transport layers with `etherparse` and attaches the
//! DNS view for UDP port-53 payloads. Decoding never fails: a packet that
//! cannot be sliced still yields a frame with its timestamp and size, and
//! every layer view absent. Analyzers treat missing layers as "skip".

use std::net::IpAddr;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;

use crate::frame::{Frame, IcmpHeader, NetworkHeader, TcpFlags, TransportHeader};
use crate::protocols::dns::parse_dns;

const DNS_PORT: u16 = 53;

/// Decode one captured packet into a frame.
pub fn decode_frame(linktype: Linktype, ts: f64, data: &[u8]) -> Frame {
    let mut frame = Frame {
        timestamp: ts,
        size_bytes: data.len() as u64,
        ..Frame::default()
    };

    let sliced = match linktype {
        Linktype::ETHERNET => SlicedPacket::from_ethernet(data),
        Linktype::RAW => SlicedPacket::from_ip(data),
        _ => return frame,
    };
    let sliced = match sliced {
        Ok(sliced) => sliced,
        Err(_) => return frame,
    };

    if let Some(net) = &sliced.net {
        frame.network = Some(match net {
            NetSlice::Ipv4(ipv4) => NetworkHeader {
                src: IpAddr::V4(ipv4.header().source_addr()),
                dst: IpAddr::V4(ipv4.header().destination_addr()),
                protocol: ipv4.header().protocol().0,
                ttl: ipv4.header().ttl(),
            },
            NetSlice::Ipv6(ipv6) => NetworkHeader {
                src: IpAddr::V6(ipv6.header().source_addr()),
                dst: IpAddr::V6(ipv6.header().destination_addr()),
                protocol: ipv6.header().next_header().0,
                ttl: ipv6.header().hop_limit(),
            },
        });
    }

    match sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            let header = tcp.to_header();
            frame.transport = Some(TransportHeader::Tcp {
                src_port: header.source_port,
                dst_port: header.destination_port,
                flags: TcpFlags {
                    syn: header.syn,
                    ack: header.ack,
                    rst: header.rst,
                    fin: header.fin,
                    psh: header.psh,
                },
                sequence: header.sequence_number,
                acknowledgment: header.acknowledgment_number,
            });
        }
        Some(TransportSlice::Udp(udp)) => {
            let src_port = udp.source_port();
            let dst_port = udp.destination_port();
            if src_port == DNS_PORT || dst_port == DNS_PORT {
                if let Ok(Some(dns)) = parse_dns(udp.payload()) {
                    frame.dns = Some(dns);
                }
            }
            frame.transport = Some(TransportHeader::Udp { src_port, dst_port });
        }
        Some(TransportSlice::Icmpv4(icmp)) => {
            frame.icmp = Some(IcmpHeader {
                icmp_type: icmp.type_u8(),
                code: icmp.code_u8(),
            });
        }
        _ => {}
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::decode_frame;
    use crate::frame::TransportHeader;
    use etherparse::{IpNumber, PacketBuilder};
    use pcap_parser::Linktype;

    #[test]
    fn decode_tcp_flags_and_ports() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
            .tcp(40000, 443, 1234, 512)
            .syn()
            .ack(1);
        let mut packet = Vec::with_capacity(builder.size(0));
        builder.write(&mut packet, &[]).unwrap();

        let frame = decode_frame(Linktype::ETHERNET, 1.0, &packet);
        let net = frame.network.expect("network header");
        assert_eq!(net.src.to_string(), "192.168.0.1");
        assert_eq!(net.ttl, 64);
        match frame.transport.expect("transport header") {
            TransportHeader::Tcp {
                src_port,
                dst_port,
                flags,
                sequence,
                ..
            } => {
                assert_eq!(src_port, 40000);
                assert_eq!(dst_port, 443);
                assert!(flags.syn && flags.ack);
                assert!(!flags.rst);
                assert_eq!(sequence, 1234);
            }
            other => panic!("expected TCP, got {other:?}"),
        }
        assert!(frame.icmp.is_none());
        assert!(frame.dns.is_none());
    }

    #[test]
    fn decode_udp_attaches_dns_on_port_53() {
        // Minimal DNS query: header + "a." A/IN question.
        let mut dns = Vec::new();
        dns.extend_from_slice(&0x0042u16.to_be_bytes());
        dns.extend_from_slice(&0x0100u16.to_be_bytes());
        dns.extend_from_slice(&1u16.to_be_bytes());
        dns.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        dns.extend_from_slice(&[1, b'a', 0]);
        dns.extend_from_slice(&1u16.to_be_bytes());
        dns.extend_from_slice(&1u16.to_be_bytes());

        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
            .udp(50000, 53);
        let mut packet = Vec::with_capacity(builder.size(dns.len()));
        builder.write(&mut packet, &dns).unwrap();

        let frame = decode_frame(Linktype::ETHERNET, 0.0, &packet);
        let message = frame.dns.expect("dns view");
        assert_eq!(message.id, 0x42);
        assert!(!message.is_response);
        assert_eq!(message.question.unwrap().name, "a.");
    }

    #[test]
    fn decode_udp_other_port_has_no_dns() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
            .udp(5000, 6000);
        let mut packet = Vec::with_capacity(builder.size(4));
        builder.write(&mut packet, &[1, 2, 3, 4]).unwrap();

        let frame = decode_frame(Linktype::ETHERNET, 0.0, &packet);
        assert!(frame.dns.is_none());
        assert!(matches!(
            frame.transport,
            Some(TransportHeader::Udp {
                src_port: 5000,
                dst_port: 6000
            })
        ));
    }

    #[test]
    fn decode_icmp_unreachable() {
        // Hand-built ICMP bytes: type 3 (unreachable), code 1 (host).
        let icmp = [3u8, 1, 0, 0, 0, 0, 0, 0];
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64);
        let mut packet = Vec::with_capacity(builder.size(icmp.len()));
        builder.write(&mut packet, IpNumber(1), &icmp).unwrap();

        let frame = decode_frame(Linktype::ETHERNET, 0.0, &packet);
        let header = frame.icmp.expect("icmp header");
        assert_eq!(header.icmp_type, 3);
        assert_eq!(header.code, 1);
    }

    #[test]
    fn decode_ospf_keeps_network_header_only() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64);
        let mut packet = Vec::with_capacity(builder.size(8));
        builder.write(&mut packet, IpNumber(89), &[0u8; 8]).unwrap();

        let frame = decode_frame(Linktype::ETHERNET, 0.0, &packet);
        assert_eq!(frame.network.expect("network header").protocol, 89);
        assert!(frame.transport.is_none());
    }

    #[test]
    fn decode_garbage_yields_bare_frame() {
        let frame = decode_frame(Linktype::ETHERNET, 2.0, &[0u8; 3]);
        assert_eq!(frame.timestamp, 2.0);
        assert_eq!(frame.size_bytes, 3);
        assert!(frame.network.is_none());
        assert!(frame.transport.is_none());
    }

    #[test]
    fn decode_raw_linktype_slices_from_ip() {
        let builder = PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 32).udp(1000, 2000);
        let mut packet = Vec::with_capacity(builder.size(0));
        builder.write(&mut packet, &[]).unwrap();

        let frame = decode_frame(Linktype::RAW, 0.0, &packet);
        assert!(frame.network.is_some());
        assert!(matches!(
            frame.transport,
            Some(TransportHeader::Udp { .. })
        ));
    }
}
