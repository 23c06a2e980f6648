use crate::TimelineEvent;
use crate::frame::{Frame, TransportHeader};

use super::icmp::icmp_type_name;

/// Target timeline length; the sample stride grows with the capture so the
/// output stays near this size.
pub(crate) const TIMELINE_TARGET: usize = 1000;

pub(crate) fn build_timeline(frames: &[Frame]) -> Vec<TimelineEvent> {
    let start = match frames.first() {
        Some(first) => first.timestamp,
        None => return Vec::new(),
    };
    let stride = (frames.len() / TIMELINE_TARGET).max(1);

    frames
        .iter()
        .step_by(stride)
        .enumerate()
        .map(|(index, frame)| {
            let (event_type, description) = classify(frame);
            TimelineEvent {
                timestamp: frame.timestamp,
                relative_time: frame.timestamp - start,
                packet_num: (index * stride) as u64,
                event_type,
                description,
            }
        })
        .collect()
}

fn classify(frame: &Frame) -> (String, String) {
    if let Some(dns) = &frame.dns {
        let description = if dns.is_response {
            "DNS Response"
        } else {
            "DNS Query"
        };
        ("DNS".to_string(), description.to_string())
    } else if let Some(icmp) = &frame.icmp {
        (
            "ICMP".to_string(),
            icmp_type_name(icmp.icmp_type, icmp.code),
        )
    } else if let Some(TransportHeader::Tcp { flags, .. }) = &frame.transport {
        ("TCP".to_string(), format!("TCP {}", flags.letters()))
    } else if matches!(frame.transport, Some(TransportHeader::Udp { .. })) {
        ("UDP".to_string(), "UDP packet".to_string())
    } else {
        ("Other".to_string(), "Unknown packet".to_string())
    }
}
