use std::net::{Ipv4Addr, Ipv6Addr};

use crate::frame::{DnsAnswer, DnsMessage, DnsQuestion};

use super::error::DnsError;
use super::layout;
use super::reader::DnsReader;

/// Parse a DNS message from a UDP payload.
///
/// DNS has no magic bytes, so callers gate on port 53; payloads shorter than
/// a message header are reported as "not DNS" rather than an error. Errors
/// signal a payload that claimed to be DNS but was cut off or malformed.
pub fn parse_dns(payload: &[u8]) -> Result<Option<DnsMessage>, DnsError> {
    let reader = DnsReader::new(payload);
    if reader.len() < layout::HEADER_LEN {
        return Ok(None);
    }

    let id = reader.read_u16_be(layout::ID_OFFSET)?;
    let flags = reader.read_u16_be(layout::FLAGS_OFFSET)?;
    let qdcount = reader.read_u16_be(layout::QDCOUNT_OFFSET)?;
    let ancount = reader.read_u16_be(layout::ANCOUNT_OFFSET)?;
    let nscount = reader.read_u16_be(layout::NSCOUNT_OFFSET)?;
    let arcount = reader.read_u16_be(layout::ARCOUNT_OFFSET)?;

    let mut offset = layout::HEADER_LEN;
    let mut question = None;
    for index in 0..qdcount {
        let (name, next) = reader.read_name(offset)?;
        if index == 0 {
            let qtype = reader.read_u16_be(next)?;
            question = Some(DnsQuestion { name, qtype });
        }
        offset = next + layout::QUESTION_FIXED_LEN;
    }

    let mut answers = Vec::new();
    for _ in 0..ancount {
        let (name, next) = reader.read_name(offset)?;
        let rtype = reader.read_u16_be(next + layout::RR_TYPE_OFFSET)?;
        let ttl = reader.read_u32_be(next + layout::RR_TTL_OFFSET)?;
        let rdlength = reader.read_u16_be(next + layout::RR_RDLENGTH_OFFSET)? as usize;
        let rdata_start = next + layout::RR_FIXED_LEN;
        let rdata = reader
            .read_slice(rdata_start, rdlength)
            .map_err(|_| DnsError::TruncatedRecord)?;

        answers.push(DnsAnswer {
            name,
            rtype,
            ttl,
            data: render_rdata(&reader, rtype, rdata_start, rdata),
        });
        offset = rdata_start + rdlength;
    }

    Ok(Some(DnsMessage {
        id,
        is_response: flags & layout::QR_MASK != 0,
        response_code: (flags & layout::RCODE_MASK) as u8,
        question,
        answers,
        answer_count: ancount,
        authority_count: nscount,
        additional_count: arcount,
    }))
}

/// Render record data as text: dotted addresses for A/AAAA, names for
/// record types whose rdata is a (possibly compressed) name, lossy text for
/// TXT, hex for everything else. Malformed rdata falls back to hex.
fn render_rdata(reader: &DnsReader<'_>, rtype: u16, rdata_start: usize, rdata: &[u8]) -> String {
    match rtype {
        layout::TYPE_A if rdata.len() == layout::A_RDATA_LEN => {
            Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]).to_string()
        }
        layout::TYPE_AAAA if rdata.len() == layout::AAAA_RDATA_LEN => {
            let mut octets = [0u8; layout::AAAA_RDATA_LEN];
            octets.copy_from_slice(rdata);
            Ipv6Addr::from(octets).to_string()
        }
        layout::TYPE_NS | layout::TYPE_CNAME | layout::TYPE_PTR => reader
            .read_name(rdata_start)
            .map(|(name, _)| name)
            .unwrap_or_else(|_| hex_string(rdata)),
        layout::TYPE_TXT => String::from_utf8_lossy(rdata).into_owned(),
        _ => hex_string(rdata),
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::parse_dns;
    use crate::protocols::dns::error::DnsError;
    use crate::protocols::dns::layout;

    fn push_name(buf: &mut Vec<u8>, labels: &[&str]) {
        for label in labels {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
    }

    fn query_bytes(id: u16, qtype: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&0x0100u16.to_be_bytes()); // RD set, QR clear
        buf.extend_from_slice(&1u16.to_be_bytes()); // qdcount
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        push_name(&mut buf, &["example", "com"]);
        buf.extend_from_slice(&qtype.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes()); // class IN
        buf
    }

    #[test]
    fn parse_query() {
        let bytes = query_bytes(0x1234, layout::TYPE_A);
        let msg = parse_dns(&bytes).unwrap().unwrap();
        assert_eq!(msg.id, 0x1234);
        assert!(!msg.is_response);
        assert_eq!(msg.response_code, 0);
        let question = msg.question.unwrap();
        assert_eq!(question.name, "example.com.");
        assert_eq!(question.qtype, layout::TYPE_A);
        assert!(msg.answers.is_empty());
    }

    #[test]
    fn parse_response_with_a_answer() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x1234u16.to_be_bytes());
        buf.extend_from_slice(&0x8180u16.to_be_bytes()); // QR + RD + RA, NOERROR
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        push_name(&mut buf, &["example", "com"]);
        buf.extend_from_slice(&layout::TYPE_A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        // Answer: pointer to the question name at offset 12.
        buf.extend_from_slice(&[0xC0, 0x0C]);
        buf.extend_from_slice(&layout::TYPE_A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&300u32.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[93, 184, 216, 34]);

        let msg = parse_dns(&buf).unwrap().unwrap();
        assert!(msg.is_response);
        assert_eq!(msg.answer_count, 1);
        assert_eq!(msg.answers.len(), 1);
        let answer = &msg.answers[0];
        assert_eq!(answer.name, "example.com.");
        assert_eq!(answer.ttl, 300);
        assert_eq!(answer.data, "93.184.216.34");
    }

    #[test]
    fn parse_nxdomain_rcode() {
        let mut buf = query_bytes(7, layout::TYPE_A);
        // Flip QR and set RCODE 3 (NXDOMAIN).
        buf[2] = 0x81;
        buf[3] = 0x83;
        let msg = parse_dns(&buf).unwrap().unwrap();
        assert!(msg.is_response);
        assert_eq!(msg.response_code, 3);
    }

    #[test]
    fn short_payload_is_not_dns() {
        assert!(parse_dns(&[0u8; 11]).unwrap().is_none());
    }

    #[test]
    fn truncated_answer_errors() {
        let mut buf = query_bytes(9, layout::TYPE_A);
        buf[7] = 1; // claim one answer that is not present
        let err = parse_dns(&buf).unwrap_err();
        assert!(matches!(
            err,
            DnsError::TooShort { .. } | DnsError::TruncatedRecord
        ));
    }
}
