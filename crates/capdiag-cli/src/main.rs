use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;

#[derive(Parser, Debug)]
#[command(name = "capdiag")]
#[command(version)]
#[command(
    about = "Offline diagnostic engine for network packet captures.",
    long_about = None,
    after_help = "Examples:\n  capdiag analyze capture.pcap -o report.json\n  capdiag analyse capture.pcapng --stdout --pretty\n  capdiag analyze capture.cap -o report.json --summary"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a capture file and generate a versioned JSON report.
    #[command(alias = "analyse")]
    #[command(
        after_help = "Examples:\n  capdiag analyze capture.pcap -o report.json\n  capdiag analyze capture.pcapng --stdout\n  capdiag analyze capture.pcap -o report.json --strict"
    )]
    Analyze {
        /// Path to a .pcap, .pcapng or .cap file
        input: PathBuf,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "compact")]
        pretty: bool,

        /// Compact JSON output (default)
        #[arg(long)]
        compact: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,

        /// Print a findings digest after analysis
        #[arg(long)]
        summary: bool,

        /// Exit with a non-zero code if security findings are present
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            input,
            report,
            stdout,
            pretty,
            compact,
            quiet,
            summary,
            strict,
        } => cmd_analyze(input, report, stdout, pretty, compact, quiet, summary, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(err.to_string(), None)
    }
}

fn cmd_analyze(
    input: PathBuf,
    report: Option<PathBuf>,
    stdout: bool,
    pretty: bool,
    compact: bool,
    quiet: bool,
    summary: bool,
    strict: bool,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;
    let report = if stdout {
        None
    } else {
        Some(report.ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?)
    };

    if let Some(report_path) = report.as_ref() {
        if let Some(report_dir) = canonical_parent(report_path)? {
            let report_target = report_dir.join(
                report_path
                    .file_name()
                    .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?,
            );
            if report_target == input_abs {
                return Err(CliError::new(
                    format!(
                        "report path must differ from input: {}",
                        report_path.display()
                    ),
                    Some("choose a different output path".to_string()),
                ));
            }
        }
    }

    let meta = fs::metadata(&resolved_input)
        .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;
    if !meta.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap, .pcapng or .cap file".to_string()),
        ));
    }

    let rep =
        capdiag_core::analyze_pcap_file(&resolved_input).context("capture analysis failed")?;
    let json = serialize_report(&rep, pretty, compact)?;

    if stdout {
        print!("{}", json);
    } else {
        let report = report.expect("report required when not using stdout");
        if let Some(parent) = report.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        fs::write(&report, json)
            .with_context(|| format!("Failed to write report: {}", report.display()))?;
        if !quiet {
            eprintln!("OK: report written -> {}", report.display());
        }
    }

    if summary && !quiet {
        print_summary(&rep);
    }
    if strict && has_security_findings(&rep) {
        return Err(CliError::new(
            "security findings detected",
            Some("use --summary to inspect".to_string()),
        ));
    }
    Ok(())
}

fn canonical_parent(path: &PathBuf) -> Result<Option<PathBuf>, CliError> {
    path.parent()
        .map(|parent| {
            if parent.as_os_str().is_empty() {
                fs::canonicalize(".")
            } else {
                fs::canonicalize(parent)
            }
        })
        .transpose()
        .with_context(|| format!("Failed to resolve output path: {}", path.display()))
        .map_err(Into::into)
}

fn serialize_report(
    rep: &capdiag_core::Report,
    pretty: bool,
    compact: bool,
) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn has_security_findings(rep: &capdiag_core::Report) -> bool {
    let security = &rep.security_analysis;
    security.port_scan_count > 0 || security.ddos_suspect_count > 0 || security.syn_flood_count > 0
}

fn print_summary(rep: &capdiag_core::Report) {
    let metadata = &rep.metadata;
    eprintln!("Capture summary:");
    eprintln!("  packets: {}", metadata.total_packets);
    if let Some(duration) = metadata.capture_duration {
        eprintln!("  duration: {:.2}s", duration);
    }
    if let Some(rate) = metadata.packets_per_second {
        eprintln!("  rate: {:.2} packets/s", rate);
    }

    let dns = &rep.dns_analysis;
    eprintln!("DNS:");
    eprintln!(
        "  queries: {} (failed: {}, unanswered: {})",
        dns.total_queries, dns.failed_query_count, dns.queries_without_response
    );
    eprintln!("  avg response: {:.2} ms", dns.average_response_time_ms);

    let routing = &rep.routing_analysis;
    eprintln!("Routing:");
    eprintln!(
        "  OSPF packets: {}, BGP packets: {}, asymmetric routing: {}",
        routing.ospf_packets_detected,
        routing.bgp_packets_detected,
        if routing.asymmetric_routing_detected {
            "yes"
        } else {
            "no"
        }
    );

    let icmp = &rep.icmp_analysis;
    eprintln!("ICMP:");
    eprintln!(
        "  requests: {}, replies: {}, unreachable: {}, avg latency: {:.2} ms",
        icmp.ping_requests, icmp.ping_replies, icmp.unreachable_count, icmp.average_ping_latency_ms
    );

    let security = &rep.security_analysis;
    eprintln!("Security:");
    eprintln!(
        "  port scans: {}, DDoS suspects: {}, SYN floods: {}, blocks: {}, RSTs: {}",
        security.port_scan_count,
        security.ddos_suspect_count,
        security.syn_flood_count,
        security.acl_block_count,
        security.tcp_rst_count
    );

    eprintln!(
        "Misbehavior:\n  retransmissions: {}",
        rep.misbehaving_resources.total_retransmissions
    );
}

fn validate_input_file(input: &PathBuf) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap, .pcapng or .cap file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" && ext != "cap" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap, .pcapng or .cap file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &PathBuf) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.clone());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some(
                "check the path or quote the pattern; expected .pcap, .pcapng or .cap".to_string(),
            ),
        ));
    }
    if matches.len() > 1 {
        let hint = "pass a single capture file, or run once per file".to_string();
        let mut message = format!(
            "multiple files match pattern '{}' ({} matches)",
            pattern,
            matches.len()
        );
        let listed = matches.iter().take(3).collect::<Vec<_>>();
        if !listed.is_empty() {
            let mut details = String::new();
            details.push_str("; matches: ");
            details.push_str(
                &listed
                    .into_iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            if matches.len() > 3 {
                details.push_str(", ...");
            }
            message.push_str(&details);
        }
        return Err(CliError::new(message, Some(hint)));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
