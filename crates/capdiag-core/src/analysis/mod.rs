//! Diagnostic passes and report assembly.
//!
//! `analyze_frames` is the core entry point: it drives every analyzer over
//! one immutable frame slice and merges their outputs into a [`Report`].
//! Each analyzer owns a private accumulator (`add_*` during the traversal,
//! `build_*` to finalize) and writes one disjoint report section, so the
//! sections never depend on each other or on scheduling.

use std::path::Path;

use thiserror::Error;

use crate::decode::decode_frame;
use crate::frame::Frame;
use crate::source::{PacketEvent, PacketSource, PcapFileSource, SourceError};
use crate::{DEFAULT_GENERATED_AT, Report, make_stub_report};

mod dns;
mod flows;
mod icmp;
mod metadata;
mod misbehavior;
mod routing;
mod security;
mod timeline;
mod traffic;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Analyze a capture file end to end.
pub fn analyze_pcap_file(path: &Path) -> Result<Report, AnalysisError> {
    let source = PcapFileSource::open(path)?;
    analyze_source(path, source)
}

/// Decode every packet from `source` and analyze the resulting frames.
pub fn analyze_source<S: PacketSource>(path: &Path, mut source: S) -> Result<Report, AnalysisError> {
    let mut frames = Vec::new();
    while let Some(PacketEvent { ts, linktype, data }) = source.next_packet()? {
        frames.push(decode_frame(linktype, ts, &data));
    }
    let input_bytes = path.metadata()?.len();
    Ok(analyze_frames(&path.display().to_string(), input_bytes, &frames))
}

/// Run all diagnostic passes over an already-decoded frame sequence.
///
/// This is the engine's input contract: a finite, capture-ordered sequence
/// of frames plus the original capture's byte size. It cannot fail — a
/// degenerate capture produces empty/zero sections, never an error.
pub fn analyze_frames(input_path: &str, input_bytes: u64, frames: &[Frame]) -> Report {
    let mut dns = dns::DnsStats::default();
    let mut routing = routing::RoutingStats::default();
    let mut icmp = icmp::IcmpStats::default();
    let mut security = security::SecurityStats::default();
    let mut traffic = traffic::TrafficStats::default();
    let mut misbehavior = misbehavior::MisbehaviorStats::default();

    for frame in frames {
        dns::add_dns_frame(&mut dns, frame);
        routing::add_routing_frame(&mut routing, frame);
        icmp::add_icmp_frame(&mut icmp, frame);
        security::add_security_frame(&mut security, frame);
        traffic::add_traffic_frame(&mut traffic, frame);
        misbehavior::add_misbehavior_frame(&mut misbehavior, frame);
    }

    let mut report = make_stub_report(input_path, input_bytes);
    report.metadata = metadata::build_metadata(frames, input_bytes);
    report.generated_at = report
        .metadata
        .end_time
        .clone()
        .or_else(|| report.metadata.start_time.clone())
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());

    report.dns_analysis = dns::build_dns_analysis(dns);
    report.routing_analysis = routing::build_routing_analysis(routing);
    report.icmp_analysis = icmp::build_icmp_analysis(icmp);
    report.security_analysis = security::build_security_analysis(security, frames.len() as u64);
    let (traffic_summary, protocol_distribution) = traffic::build_traffic_summary(traffic);
    report.traffic_stats = traffic_summary;
    report.protocol_distribution = protocol_distribution;
    report.misbehaving_resources = misbehavior::build_misbehavior_summary(misbehavior);
    report.timeline = timeline::build_timeline(frames);
    report
}
