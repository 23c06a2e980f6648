//! Decoded-frame model consumed by every analyzer.
//!
//! A [`Frame`] is one captured packet after decoding: a capture timestamp,
//! the wire size, and optional typed views of the layers the decoder could
//! slice. Frames are immutable once built; analyzers pattern-match on the
//! optional views and skip frames that lack the layer they care about.

use std::net::IpAddr;

/// One decoded capture frame.
///
/// Sequence order equals capture order; timestamps are not required to be
/// monotonic and analyzers must tolerate equal or out-of-order values.
///
/// # Examples
/// ```
/// use capdiag_core::Frame;
///
/// let frame = Frame {
///     timestamp: 1.5,
///     size_bytes: 60,
///     ..Frame::default()
/// };
/// assert!(frame.network.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Capture timestamp in seconds (fractional).
    pub timestamp: f64,
    /// Wire size of the frame in bytes.
    pub size_bytes: u64,
    /// Network-layer view, when the decoder found an IP header.
    pub network: Option<NetworkHeader>,
    /// Transport-layer view (TCP or UDP).
    pub transport: Option<TransportHeader>,
    /// ICMP view for ICMPv4 frames.
    pub icmp: Option<IcmpHeader>,
    /// DNS message view for UDP port-53 payloads that parsed cleanly.
    pub dns: Option<DnsMessage>,
}

/// Network-layer header fields used by the analyzers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHeader {
    pub src: IpAddr,
    pub dst: IpAddr,
    /// IP protocol number (IPv4 protocol / IPv6 next header).
    pub protocol: u8,
    /// TTL (IPv4) or hop limit (IPv6).
    pub ttl: u8,
}

/// TCP flag set carried by a [`TransportHeader::Tcp`] frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags {
    pub syn: bool,
    pub ack: bool,
    pub rst: bool,
    pub fin: bool,
    pub psh: bool,
}

impl TcpFlags {
    /// Flag letters in wire-bit order (FIN, SYN, RST, PSH, ACK), e.g. `"SA"`
    /// for a SYN-ACK.
    pub fn letters(&self) -> String {
        let mut out = String::new();
        if self.fin {
            out.push('F');
        }
        if self.syn {
            out.push('S');
        }
        if self.rst {
            out.push('R');
        }
        if self.psh {
            out.push('P');
        }
        if self.ack {
            out.push('A');
        }
        out
    }
}

/// Transport-layer view of a frame.
///
/// Sequence/acknowledgment numbers and flags exist for TCP only, so the two
/// kinds are separate variants rather than a struct full of optionals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportHeader {
    Tcp {
        src_port: u16,
        dst_port: u16,
        flags: TcpFlags,
        sequence: u32,
        acknowledgment: u32,
    },
    Udp {
        src_port: u16,
        dst_port: u16,
    },
}

impl TransportHeader {
    pub fn src_port(&self) -> u16 {
        match self {
            TransportHeader::Tcp { src_port, .. } | TransportHeader::Udp { src_port, .. } => {
                *src_port
            }
        }
    }

    pub fn dst_port(&self) -> u16 {
        match self {
            TransportHeader::Tcp { dst_port, .. } | TransportHeader::Udp { dst_port, .. } => {
                *dst_port
            }
        }
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, TransportHeader::Tcp { .. })
    }
}

/// ICMPv4 type and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
}

/// Decoded DNS message attached to a frame.
///
/// The question is the first entry of the question section (additional
/// questions are skipped over but not retained). Answer records carry their
/// rdata rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    /// 16-bit transaction id. Assumed unique within one capture; colliding
    /// ids from concurrent queries will mismatch correlation.
    pub id: u16,
    pub is_response: bool,
    pub response_code: u8,
    pub question: Option<DnsQuestion>,
    pub answers: Vec<DnsAnswer>,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

/// Question name and type from a DNS query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Fully qualified name with trailing dot, e.g. `"example.com."`.
    pub name: String,
    pub qtype: u16,
}

/// One answer record from a DNS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    pub name: String,
    pub rtype: u16,
    pub ttl: u32,
    /// Rendered record data: dotted address for A/AAAA, a name for
    /// NS/CNAME/PTR, hex otherwise.
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::{TcpFlags, TransportHeader};

    #[test]
    fn flag_letters_follow_wire_bit_order() {
        let flags = TcpFlags {
            syn: true,
            ack: true,
            ..TcpFlags::default()
        };
        assert_eq!(flags.letters(), "SA");

        let flags = TcpFlags {
            fin: true,
            psh: true,
            ack: true,
            ..TcpFlags::default()
        };
        assert_eq!(flags.letters(), "FPA");

        assert_eq!(TcpFlags::default().letters(), "");
    }

    #[test]
    fn transport_ports_cover_both_kinds() {
        let tcp = TransportHeader::Tcp {
            src_port: 1000,
            dst_port: 80,
            flags: TcpFlags::default(),
            sequence: 1,
            acknowledgment: 0,
        };
        assert_eq!(tcp.src_port(), 1000);
        assert_eq!(tcp.dst_port(), 80);
        assert!(tcp.is_tcp());

        let udp = TransportHeader::Udp {
            src_port: 5353,
            dst_port: 53,
        };
        assert_eq!(udp.dst_port(), 53);
        assert!(!udp.is_tcp());
    }
}
