//! PCAP/PCAPNG file source.
//!
//! Sniffs the file magic to pick the legacy or NG reader, tracks per-
//! interface link types for PCAPNG, and emits one `PacketEvent` per data
//! packet. Non-packet blocks (section headers, interface descriptions) are
//! consumed silently.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};

use super::{PacketEvent, PacketSource, SourceError};

const READER_BUFFER_SIZE: usize = 65536;
const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

pub struct PcapFileSource {
    inner: Reader,
}

enum Reader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        file.seek(SeekFrom::Start(0))?;

        let inner = if magic == PCAPNG_MAGIC {
            Reader::Ng {
                reader: PcapNGReader::new(READER_BUFFER_SIZE, file).map_err(|e| {
                    SourceError::Pcap {
                        context: "pcapng reader init",
                        message: e.to_string(),
                    }
                })?,
                linktypes: Vec::new(),
            }
        } else {
            Reader::Legacy {
                reader: LegacyPcapReader::new(READER_BUFFER_SIZE, file).map_err(|e| {
                    SourceError::Pcap {
                        context: "pcap reader init",
                        message: e.to_string(),
                    }
                })?,
                linktype: None,
            }
        };
        Ok(Self { inner })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        loop {
            match &mut self.inner {
                Reader::Legacy { reader, linktype } => match reader.next() {
                    Ok((offset, block)) => {
                        let event = match block {
                            PcapBlockOwned::LegacyHeader(header) => {
                                *linktype = Some(header.network);
                                None
                            }
                            PcapBlockOwned::Legacy(packet) => Some(PacketEvent {
                                ts: packet.ts_sec as f64 + packet.ts_usec as f64 * 1e-6,
                                linktype: linktype.unwrap_or(Linktype::ETHERNET),
                                data: packet.data.to_vec(),
                            }),
                            _ => None,
                        };
                        reader.consume(offset);
                        if event.is_some() {
                            return Ok(event);
                        }
                    }
                    Err(pcap_parser::PcapError::Eof) => return Ok(None),
                    Err(pcap_parser::PcapError::Incomplete(_)) => {
                        reader.refill().map_err(|e| SourceError::Pcap {
                            context: "pcap reader refill",
                            message: e.to_string(),
                        })?;
                    }
                    Err(e) => {
                        return Err(SourceError::Pcap {
                            context: "pcap reader next",
                            message: e.to_string(),
                        });
                    }
                },
                Reader::Ng { reader, linktypes } => match reader.next() {
                    Ok((offset, block)) => {
                        let event = match block {
                            PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                                linktypes.push(intf.linktype);
                                None
                            }
                            PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => Some(PacketEvent {
                                ts: ng_ts_to_seconds(packet.ts_high, packet.ts_low),
                                linktype: linktypes
                                    .get(packet.if_id as usize)
                                    .copied()
                                    .unwrap_or(Linktype::ETHERNET),
                                data: packet.data.to_vec(),
                            }),
                            _ => None,
                        };
                        reader.consume(offset);
                        if event.is_some() {
                            return Ok(event);
                        }
                    }
                    Err(pcap_parser::PcapError::Eof) => return Ok(None),
                    Err(pcap_parser::PcapError::Incomplete(_)) => {
                        reader.refill().map_err(|e| SourceError::Pcap {
                            context: "pcapng reader refill",
                            message: e.to_string(),
                        })?;
                    }
                    Err(e) => {
                        return Err(SourceError::Pcap {
                            context: "pcapng reader next",
                            message: e.to_string(),
                        });
                    }
                },
            }
        }
    }
}

fn ng_ts_to_seconds(ts_high: u32, ts_low: u32) -> f64 {
    let ts = ((ts_high as u64) << 32) | ts_low as u64;
    ts as f64 * 1e-6
}
