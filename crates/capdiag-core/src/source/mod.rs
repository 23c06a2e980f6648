//! Packet sources.
//!
//! A source yields raw packet events (timestamp, link type, bytes) for the
//! decode layer. All file I/O lives here; failure to produce the event
//! stream is the engine's only fatal error.

mod pcap;

pub use pcap::PcapFileSource;

use pcap_parser::Linktype;
use thiserror::Error;

/// One raw packet as read from a capture source.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Capture timestamp in seconds.
    pub ts: f64,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error ({context}): {message}")]
    Pcap {
        context: &'static str,
        message: String,
    },
}
