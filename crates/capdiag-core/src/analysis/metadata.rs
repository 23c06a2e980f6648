use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::Metadata;
use crate::frame::Frame;

pub(crate) fn build_metadata(frames: &[Frame], input_bytes: u64) -> Metadata {
    let (first, last) = match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => return Metadata::default(),
    };

    let duration = last - first;
    Metadata {
        total_packets: frames.len() as u64,
        file_size_bytes: Some(input_bytes),
        capture_duration: Some(duration),
        start_time: ts_to_rfc3339(first),
        end_time: ts_to_rfc3339(last),
        // Duration floored at one second so single-instant captures still
        // get a finite rate.
        packets_per_second: Some(frames.len() as f64 / duration.max(1.0)),
    }
}

pub(crate) fn ts_to_rfc3339(ts: f64) -> Option<String> {
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

#[cfg(test)]
mod tests {
    use super::build_metadata;
    use crate::frame::Frame;

    fn frame_at(ts: f64) -> Frame {
        Frame {
            timestamp: ts,
            size_bytes: 60,
            ..Frame::default()
        }
    }

    #[test]
    fn empty_capture_reports_zero_packets_only() {
        let metadata = build_metadata(&[], 0);
        assert_eq!(metadata.total_packets, 0);
        assert!(metadata.file_size_bytes.is_none());
        assert!(metadata.capture_duration.is_none());
        assert!(metadata.start_time.is_none());
        assert!(metadata.packets_per_second.is_none());
    }

    #[test]
    fn duration_spans_first_to_last_frame() {
        let frames = vec![frame_at(100.0), frame_at(101.0), frame_at(104.0)];
        let metadata = build_metadata(&frames, 1024);
        assert_eq!(metadata.total_packets, 3);
        assert_eq!(metadata.file_size_bytes, Some(1024));
        assert_eq!(metadata.capture_duration, Some(4.0));
        assert_eq!(metadata.packets_per_second, Some(0.75));
        assert_eq!(metadata.start_time.as_deref(), Some("1970-01-01T00:01:40Z"));
    }

    #[test]
    fn rate_divisor_floors_at_one_second() {
        let frames = vec![frame_at(5.0), frame_at(5.0)];
        let metadata = build_metadata(&frames, 10);
        assert_eq!(metadata.capture_duration, Some(0.0));
        assert_eq!(metadata.packets_per_second, Some(2.0));
    }
}
