use std::cmp::Ordering;
use std::collections::HashMap;

use crate::frame::Frame;
use crate::{DnsAnalysis, DnsServerStat, FailedQuery, SlowQuery};

/// Correlated queries slower than this are reported.
pub(crate) const SLOW_QUERY_SECS: f64 = 0.1;
pub(crate) const SLOW_QUERY_LIMIT: usize = 10;

const RCODE_NOERROR: u8 = 0;

#[derive(Debug, Default)]
pub(crate) struct DnsStats {
    total_queries: u64,
    total_responses: u64,
    /// Pending queries keyed by transaction id. Ids are assumed unique
    /// within the capture; a duplicate id overwrites the earlier entry, so
    /// the last query with that id wins for correlation.
    pending: HashMap<u16, PendingQuery>,
    servers: HashMap<String, u64>,
    failed: Vec<FailedQuery>,
}

#[derive(Debug)]
struct PendingQuery {
    query_ts: f64,
    query_name: String,
    query_type: String,
    server: Option<String>,
    response_time: Option<f64>,
}

pub(crate) fn add_dns_frame(stats: &mut DnsStats, frame: &Frame) {
    let dns = match &frame.dns {
        Some(dns) => dns,
        None => return,
    };

    if !dns.is_response {
        let question = match &dns.question {
            Some(question) => question,
            None => return,
        };
        stats.total_queries += 1;

        let server = frame.network.as_ref().map(|net| net.dst.to_string());
        if let Some(server) = &server {
            *stats.servers.entry(server.clone()).or_default() += 1;
        }
        stats.pending.insert(
            dns.id,
            PendingQuery {
                query_ts: frame.timestamp,
                query_name: question.name.clone(),
                query_type: query_type_name(question.qtype),
                server,
                response_time: None,
            },
        );
    } else {
        stats.total_responses += 1;

        if let Some(pending) = stats.pending.get_mut(&dns.id) {
            // May be negative on anomalous ordering; recorded as-is.
            pending.response_time = Some(frame.timestamp - pending.query_ts);

            if dns.response_code != RCODE_NOERROR {
                stats.failed.push(FailedQuery {
                    query: pending.query_name.clone(),
                    query_type: pending.query_type.clone(),
                    error_code: dns.response_code,
                    error_name: rcode_name(dns.response_code),
                    timestamp: frame.timestamp,
                    dns_server: pending.server.clone(),
                });
            }
        }
    }
}

pub(crate) fn build_dns_analysis(stats: DnsStats) -> DnsAnalysis {
    let response_times: Vec<f64> = stats
        .pending
        .values()
        .filter_map(|pending| pending.response_time)
        .collect();
    let pairs = response_times.len() as u64;
    let average_response_time_ms = if response_times.is_empty() {
        0.0
    } else {
        response_times.iter().sum::<f64>() / response_times.len() as f64 * 1000.0
    };
    let queries_without_response = stats
        .pending
        .values()
        .filter(|pending| pending.response_time.is_none())
        .count() as u64;

    let mut slow_queries: Vec<SlowQuery> = stats
        .pending
        .values()
        .filter(|pending| pending.response_time.is_some_and(|rt| rt > SLOW_QUERY_SECS))
        .map(|pending| SlowQuery {
            query_name: pending.query_name.clone(),
            response_time: pending.response_time.unwrap_or_default(),
            dns_server: pending.server.clone(),
        })
        .collect();
    slow_queries.sort_by(|a, b| {
        b.response_time
            .partial_cmp(&a.response_time)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.query_name.cmp(&b.query_name))
    });
    slow_queries.truncate(SLOW_QUERY_LIMIT);

    let mut dns_servers: Vec<DnsServerStat> = stats
        .servers
        .into_iter()
        .map(|(ip, query_count)| DnsServerStat { ip, query_count })
        .collect();
    dns_servers.sort_by(|a, b| {
        b.query_count
            .cmp(&a.query_count)
            .then_with(|| a.ip.cmp(&b.ip))
    });

    DnsAnalysis {
        total_queries: stats.total_queries,
        total_responses: stats.total_responses,
        failed_query_count: stats.failed.len() as u64,
        failed_queries: stats.failed,
        dns_servers,
        average_response_time_ms,
        slow_queries,
        queries_without_response,
        query_response_pairs: pairs,
    }
}

pub(crate) fn query_type_name(qtype: u16) -> String {
    match qtype {
        1 => "A".to_string(),
        2 => "NS".to_string(),
        5 => "CNAME".to_string(),
        6 => "SOA".to_string(),
        12 => "PTR".to_string(),
        15 => "MX".to_string(),
        16 => "TXT".to_string(),
        28 => "AAAA".to_string(),
        33 => "SRV".to_string(),
        257 => "CAA".to_string(),
        other => format!("TYPE{}", other),
    }
}

pub(crate) fn rcode_name(rcode: u8) -> String {
    match rcode {
        0 => "NOERROR".to_string(),
        1 => "FORMERR".to_string(),
        2 => "SERVFAIL".to_string(),
        3 => "NXDOMAIN".to_string(),
        4 => "NOTIMP".to_string(),
        5 => "REFUSED".to_string(),
        other => format!("RCODE{}", other),
    }
}
