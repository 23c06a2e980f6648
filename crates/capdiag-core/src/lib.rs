//! Capdiag core library for post-mortem packet-capture diagnostics.
//!
//! This crate implements the offline diagnostic pipeline used by the CLI:
//! packet sources feed the decode layer, which produces immutable frames;
//! the analysis layer runs the diagnostic passes (DNS correlation, routing
//! symmetry, ICMP behavior, security anomalies, traffic statistics, host
//! misbehavior, timeline sampling) and assembles one deterministic report.
//! Parsing is byte-oriented and side-effect free; all I/O is isolated in
//! `source` modules.
//!
//! Invariants:
//! - Report outputs are deterministic and stable across runs; nothing in a
//!   report depends on wall-clock time, only on capture timestamps.
//! - Frames are immutable after decode; every analyzer is a read-only pass
//!   with its own private accumulators.
//! - A frame missing a layer is skipped by the analyzers that need it; the
//!   only fatal failure is an unreadable capture source.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use capdiag_core::analyze_pcap_file;
//!
//! let report = analyze_pcap_file(Path::new("capture.pcapng"))?;
//! println!("packets: {}", report.metadata.total_packets);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod analysis;
mod decode;
mod frame;
mod protocols;
mod source;

pub use analysis::{AnalysisError, analyze_frames, analyze_pcap_file, analyze_source};
pub use decode::decode_frame;
pub use frame::{
    DnsAnswer, DnsMessage, DnsQuestion, Frame, IcmpHeader, NetworkHeader, TcpFlags,
    TransportHeader,
};
pub use source::{PacketEvent, PacketSource, PcapFileSource, SourceError};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Aggregated diagnostic report with deterministic ordering.
///
/// The nine analysis sections are independent: each is computed by its own
/// pass over the frame sequence and none references another.
///
/// # Examples
/// ```
/// use capdiag_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, capdiag_core::REPORT_VERSION);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp representing the report generation time (derived
    /// from the capture, so identical inputs produce identical reports).
    pub generated_at: String,

    /// Input capture metadata.
    pub input: InputInfo,

    /// Capture-level summary.
    pub metadata: Metadata,
    /// DNS query/response correlation results.
    pub dns_analysis: DnsAnalysis,
    /// Routing-protocol presence and flow symmetry.
    pub routing_analysis: RoutingAnalysis,
    /// ICMP/path behavior.
    pub icmp_analysis: IcmpAnalysis,
    /// Scan/flood/block detection results.
    pub security_analysis: SecurityAnalysis,
    /// Aggregate traffic statistics.
    pub traffic_stats: TrafficSummary,
    /// Retransmitting hosts and top talkers.
    pub misbehaving_resources: MisbehaviorSummary,
    /// Packet counts per canonical protocol name.
    pub protocol_distribution: BTreeMap<String, u64>,
    /// Down-sampled chronological event list.
    pub timeline: Vec<TimelineEvent>,
}

/// Tool metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name (e.g., "capdiag").
    pub name: String,
    /// Tool version (semver).
    pub version: String,
}

/// Input capture metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the analyzer.
    pub path: String,
    /// Input size in bytes.
    pub bytes: u64,
}

/// Capture-level summary.
///
/// For an empty capture only `total_packets` (zero) is emitted; every other
/// field is omitted rather than invented.
///
/// # Examples
/// ```
/// use capdiag_core::Metadata;
///
/// let metadata = Metadata {
///     total_packets: 0,
///     ..Metadata::default()
/// };
/// assert!(metadata.capture_duration.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Total packet count observed in the capture.
    pub total_packets: u64,
    /// Capture file size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    /// Seconds between the first and last frame (may be negative when the
    /// capture carries out-of-order timestamps).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_duration: Option<f64>,
    /// RFC3339 timestamp of the first frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// RFC3339 timestamp of the last frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Packet rate over the capture duration (duration floored at 1s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_per_second: Option<f64>,
}

/// DNS correlation section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsAnalysis {
    pub total_queries: u64,
    pub total_responses: u64,
    /// Correlated responses whose rcode was not NOERROR.
    pub failed_queries: Vec<FailedQuery>,
    pub failed_query_count: u64,
    /// Resolvers ranked by query volume.
    pub dns_servers: Vec<DnsServerStat>,
    /// Mean latency over correlated pairs, 0 when none matched.
    pub average_response_time_ms: f64,
    /// Slowest correlated queries above the slow threshold (capped at 10).
    pub slow_queries: Vec<SlowQuery>,
    pub queries_without_response: u64,
    pub query_response_pairs: u64,
}

/// One failed DNS lookup (query correlated to an error response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedQuery {
    pub query: String,
    pub query_type: String,
    pub error_code: u8,
    pub error_name: String,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_server: Option<String>,
}

/// Query volume per resolver address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsServerStat {
    pub ip: String,
    pub query_count: u64,
}

/// A correlated query slower than the slow-query threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowQuery {
    pub query_name: String,
    /// Response time in seconds.
    pub response_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_server: Option<String>,
}

/// Routing-protocol and flow-symmetry section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingAnalysis {
    pub ospf_packets_detected: u64,
    /// Distinct OSPF source addresses, sorted.
    pub ospf_neighbors: Vec<String>,
    pub bgp_packets_detected: u64,
    /// Distinct BGP (source, destination) pairs, sorted.
    pub bgp_peers: Vec<BgpPeer>,
    /// Most imbalanced bidirectional flows (capped at 10).
    pub asymmetric_flows: Vec<AsymmetricFlow>,
    pub asymmetric_routing_detected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpPeer {
    pub src: String,
    pub dst: String,
}

/// A flow whose directional packet counts are heavily skewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsymmetricFlow {
    /// The two endpoint addresses in canonical (sorted) order.
    pub endpoints: Vec<String>,
    pub packets_direction_1: u64,
    pub packets_direction_2: u64,
    /// `|d1 - d2| / total`, always within `[0, 1]`.
    pub imbalance_ratio: f64,
}

/// ICMP/path-behavior section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IcmpAnalysis {
    pub total_icmp_packets: u64,
    pub ping_requests: u64,
    pub ping_replies: u64,
    /// Mean echo round-trip over matched request/reply pairs, 0 when none.
    pub average_ping_latency_ms: f64,
    /// First destination-unreachable observations (capped at 20).
    pub unreachable_destinations: Vec<UnreachableRecord>,
    pub unreachable_count: u64,
    pub traceroute_detected: bool,
    /// Time-exceeded observations grouped by the responding hop address.
    pub traceroute_hops: BTreeMap<String, Vec<TracerouteHop>>,
}

/// One destination-unreachable observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreachableRecord {
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ip: Option<String>,
    #[serde(rename = "type")]
    pub icmp_type: u8,
    pub code: u8,
    pub type_name: String,
    pub unreachable_type: String,
}

/// One time-exceeded observation attributed to an intermediate hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerouteHop {
    /// TTL carried by the time-exceeded frame itself.
    pub hop: u8,
    pub ip: String,
    pub timestamp: f64,
}

/// Security-anomaly section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub tcp_rst_count: u64,
    pub port_scans_detected: Vec<PortScan>,
    pub port_scan_count: u64,
    pub ddos_suspects: Vec<DdosSuspect>,
    pub ddos_suspect_count: u64,
    /// First block-evidence observations (capped at 50).
    pub acl_firewall_blocks: Vec<BlockEvidence>,
    pub acl_block_count: u64,
    pub syn_flood_detected: Vec<SynFlood>,
    pub syn_flood_count: u64,
}

/// A source that touched more distinct destination ports than the scan
/// threshold allows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScan {
    pub source_ip: String,
    pub ports_scanned: u64,
    /// First 50 ports, ascending.
    pub port_list: Vec<u16>,
}

/// A source responsible for an outsized share of the capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdosSuspect {
    pub source_ip: String,
    pub packet_count: u64,
    /// Share of the whole capture, in percent.
    pub percentage: f64,
}

/// An observed rejection signal (TCP reset or ICMP unreachable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEvidence {
    pub timestamp: f64,
    pub blocked_src: String,
    pub blocked_dst: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_port: Option<u16>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_code: Option<u8>,
}

/// A (source, destination) pair with flood-like SYN behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynFlood {
    /// `"src -> dst"` label for the pair.
    pub connection: String,
    pub syn_count: u64,
    pub ack_count: u64,
    /// `syn / max(ack, 1)`.
    pub ratio: f64,
}

/// Aggregate traffic-statistics section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficSummary {
    /// Destination ports ranked by packet count (capped at 20).
    pub top_ports: Vec<PortStat>,
    /// Conversations ranked by packet count (capped at 20).
    pub top_conversations: Vec<Conversation>,
    /// Distinct addresses seen as source or destination.
    pub unique_ips: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortStat {
    pub port: u16,
    pub count: u64,
}

/// Bidirectional conversation totals for one endpoint pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// The two endpoint addresses in canonical (sorted) order.
    pub endpoints: Vec<String>,
    pub packets: u64,
    /// Cumulative wire bytes (frame size, not payload size).
    pub bytes: u64,
}

/// Host-misbehavior section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MisbehaviorSummary {
    /// Sources ranked by packet count (capped at 20).
    pub top_talkers: Vec<Talker>,
    /// Sources ranked by retransmission count (capped at 10).
    pub retransmissions: Vec<RetransmissionStat>,
    pub total_retransmissions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Talker {
    pub ip: String,
    pub packet_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetransmissionStat {
    pub ip: String,
    pub retransmission_count: u64,
    /// Retransmissions as a percentage of the source's packets.
    pub retransmission_rate: f64,
}

/// One down-sampled timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: f64,
    /// Seconds since the first frame of the capture.
    pub relative_time: f64,
    /// Position of the sampled frame in the original sequence.
    pub packet_num: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub description: String,
}

/// Build a stub report with base fields filled and empty sections.
///
/// # Examples
/// ```
/// use capdiag_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.metadata.total_packets, 0);
/// assert!(report.timeline.is_empty());
/// ```
pub fn make_stub_report(input_path: &str, input_bytes: u64) -> Report {
    Report {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "capdiag".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        metadata: Metadata::default(),
        dns_analysis: DnsAnalysis::default(),
        routing_analysis: RoutingAnalysis::default(),
        icmp_analysis: IcmpAnalysis::default(),
        security_analysis: SecurityAnalysis::default(),
        traffic_stats: TrafficSummary::default(),
        misbehaving_resources: MisbehaviorSummary::default(),
        protocol_distribution: BTreeMap::new(),
        timeline: Vec::new(),
    }
}
