//! The fixed-layout portion of a replay: summary header, extra sectors,
//! player blocks, status messages, and the unit-sync catalog. Everything
//! here runs once, before the move region is touched.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::bitstream::{descramble, load_section, lz77_decompress, xor_const};
use crate::error::{Error, Result};

pub const MAGIC: &[u8; 8] = b"TA Demo\0";

/// Fixed replay header: magic, version, player count, per-player unit cap
/// and the map name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub magic: [u8; 8],
    pub version: [u8; 2],
    pub num_players: u8,
    pub max_units: u16,
    pub map_name: String,
}

fn read_nul_padded(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

pub fn parse_summary(input: &[u8]) -> Result<(Summary, &[u8])> {
    const FIXED_LEN: usize = 8 + 2 + 1 + 2 + 64;
    if input.len() < FIXED_LEN {
        return Err(Error::ShortRead {
            needed: FIXED_LEN,
            available: input.len(),
        });
    }
    let mut magic = [0u8; 8];
    magic.copy_from_slice(&input[0..8]);
    let mut version = [0u8; 2];
    version.copy_from_slice(&input[8..10]);
    let num_players = input[10];
    let max_units = LittleEndian::read_u16(&input[11..13]);
    let map_name = read_nul_padded(&input[13..13 + 64]);
    Ok((
        Summary {
            magic,
            version,
            num_players,
            max_units,
            map_name,
        },
        &input[FIXED_LEN..],
    ))
}

/// A sector from the `ExtraSectorList`. Unknown tags are kept verbatim so
/// callers inspecting raw sectors can still see them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraSector {
    Comments(String),
    LobbyChat(Vec<String>),
    VersionString(String),
    DateString(String),
    RecordSource(String),
    PlayerAddress { ip: String },
    Unknown { sector_type: i32, data: Vec<u8> },
}

fn parse_one_extra(sector_type: i32, payload: &[u8]) -> ExtraSector {
    match sector_type {
        1 => ExtraSector::Comments(read_nul_padded(payload)),
        2 => {
            let messages = payload
                .split(|&b| b == 0x0D)
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .filter(|s| !s.is_empty())
                .collect();
            ExtraSector::LobbyChat(messages)
        }
        3 => ExtraSector::VersionString(read_nul_padded(payload)),
        4 => ExtraSector::DateString(read_nul_padded(payload)),
        5 => ExtraSector::RecordSource(read_nul_padded(payload)),
        6 => {
            let decrypted = xor_const(payload);
            const IP_OFFSET: usize = 0x50;
            let ip = if decrypted.len() > IP_OFFSET {
                read_nul_padded(&decrypted[IP_OFFSET..])
            } else {
                String::new()
            };
            ExtraSector::PlayerAddress { ip }
        }
        other => {
            warn!("{}", Error::UnknownSectorType(other));
            ExtraSector::Unknown {
                sector_type: other,
                data: payload.to_vec(),
            }
        }
    }
}

/// Parses the length-prefixed `ExtraHeader` block: a count byte followed
/// by that many length-prefixed extra sectors.
pub fn parse_extra_sectors(input: &[u8]) -> Result<(Vec<ExtraSector>, &[u8])> {
    let (block, rest) = load_section(input)?;
    if block.is_empty() {
        return Ok((Vec::new(), rest));
    }
    let count = block[0] as usize;
    let mut cursor = &block[1..];
    let mut sectors = Vec::with_capacity(count);
    for _ in 0..count {
        if cursor.len() < 2 {
            break;
        }
        let len = LittleEndian::read_u16(&cursor[0..2]) as usize;
        if cursor.len() < len {
            break;
        }
        let sector_body = &cursor[2..len];
        if sector_body.len() < 4 {
            cursor = &cursor[len..];
            continue;
        }
        let sector_type = LittleEndian::read_i32(&sector_body[0..4]);
        let payload = &sector_body[4..];
        sectors.push(parse_one_extra(sector_type, payload));
        cursor = &cursor[len..];
    }
    Ok((sectors, rest))
}

/// One entry of `PlayerBlock[N]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerBlock {
    pub color: u8,
    pub side: u8,
    pub number: u8,
    pub name: String,
}

pub fn parse_player_blocks(mut input: &[u8], num_players: u8) -> Result<(Vec<PlayerBlock>, &[u8])> {
    let mut out = Vec::with_capacity(num_players as usize);
    for _ in 0..num_players {
        let (body, rest) = load_section(input)?;
        if body.len() < 3 {
            return Err(Error::ShortRead {
                needed: 3,
                available: body.len(),
            });
        }
        let color = body[0];
        let side = body[1];
        let number = body[2];
        let name = read_nul_padded(&body[3..]);
        out.push(PlayerBlock {
            color,
            side,
            number,
            name,
        });
        input = rest;
    }
    Ok((out, input))
}

/// A descrambled (and possibly LZ77-decompressed) status message, with
/// the fixed-offset identity fields already extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub number: u8,
    pub color: u8,
    pub cheats_a2: bool,
    pub cheats_a4: bool,
    pub tdpid: i32,
}

const COLOR_OFFSET: usize = 0x9E;
const CHEATS_A2_OFFSET: usize = 0xA2;
const CHEATS_A4_OFFSET: usize = 0xA4;
const CHEATS_FLAG_BIT: u8 = 0x20;
const IDENT_TDPID_OFFSET: usize = 0x08 + 24;

pub fn parse_status_messages(
    mut input: &[u8],
    num_players: u8,
) -> Result<(Vec<StatusMessage>, &[u8])> {
    let mut out = Vec::with_capacity(num_players as usize);
    for _ in 0..num_players {
        let (body, rest) = load_section(input)?;
        if body.is_empty() {
            return Err(Error::ShortRead {
                needed: 1,
                available: 0,
            });
        }
        let number = body[0];
        let payload = &body[1..];
        let descrambled = descramble(payload)?;
        let decoded = if descrambled.first() == Some(&0x04) {
            lz77_decompress(&descrambled[1..2.min(descrambled.len())], &descrambled[2..])
        } else {
            descrambled
        };

        let color = decoded.get(COLOR_OFFSET).copied().unwrap_or(0);
        let cheats_a2 = decoded
            .get(CHEATS_A2_OFFSET)
            .map(|b| b & CHEATS_FLAG_BIT != 0)
            .unwrap_or(false);
        let cheats_a4 = decoded
            .get(CHEATS_A4_OFFSET)
            .map(|b| b & CHEATS_FLAG_BIT != 0)
            .unwrap_or(false);
        let tdpid = if decoded.len() >= IDENT_TDPID_OFFSET + 4 {
            LittleEndian::read_i32(&decoded[IDENT_TDPID_OFFSET..IDENT_TDPID_OFFSET + 4])
        } else {
            0
        };

        out.push(StatusMessage {
            number,
            color,
            cheats_a2,
            cheats_a4,
            tdpid,
        });
        input = rest;
    }
    Ok((out, input))
}

/// One entry in the unit-sync catalog, merged across its two record
/// subtypes which may arrive in either order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitSyncRecord {
    pub id: u32,
    pub crc: Option<u32>,
    pub status: Option<u16>,
    pub limit: Option<u16>,
}

impl UnitSyncRecord {
    /// A unit is in use unless its status is exactly 1.
    pub fn in_use(&self) -> bool {
        self.status.map(|s| s != 1).unwrap_or(true)
    }
}

const UNIT_SYNC_RECORD_LEN: usize = 14;

pub fn parse_unit_sync_catalog(input: &[u8]) -> Result<(Vec<UnitSyncRecord>, &[u8])> {
    let (block, rest) = load_section(input)?;
    let mut by_id: std::collections::BTreeMap<u32, UnitSyncRecord> = std::collections::BTreeMap::new();
    let mut cursor = block;
    while cursor.len() >= UNIT_SYNC_RECORD_LEN {
        let record = &cursor[..UNIT_SYNC_RECORD_LEN];
        let sub = record[1];
        let id = LittleEndian::read_u32(&record[6..10]);
        let entry = by_id.entry(id).or_insert(UnitSyncRecord {
            id,
            ..Default::default()
        });
        match sub {
            0x02 => entry.crc = Some(LittleEndian::read_u32(&record[10..14])),
            0x03 => {
                entry.status = Some(LittleEndian::read_u16(&record[10..12]));
                entry.limit = Some(LittleEndian::read_u16(&record[12..14]));
            }
            other => warn!("unknown unit-sync record subtype {other:#04x}"),
        }
        cursor = &cursor[UNIT_SYNC_RECORD_LEN..];
    }
    Ok((by_id.into_values().collect(), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[5, 0]);
        buf.push(2); // num_players
        buf.extend_from_slice(&500u16.to_le_bytes());
        let mut map_name = b"[V] Dark Comet".to_vec();
        map_name.resize(64, 0);
        buf.extend_from_slice(&map_name);
        buf
    }

    #[test]
    fn parse_summary_reads_fixed_fields() {
        let buf = sample_summary_bytes();
        let (summary, rest) = parse_summary(&buf).unwrap();
        assert_eq!(&summary.magic, MAGIC);
        assert_eq!(summary.version, [5, 0]);
        assert_eq!(summary.num_players, 2);
        assert_eq!(summary.max_units, 500);
        assert_eq!(summary.map_name, "[V] Dark Comet");
        assert!(rest.is_empty());
    }

    #[test]
    fn parse_summary_short_read() {
        let buf = vec![0u8; 10];
        assert!(matches!(parse_summary(&buf), Err(Error::ShortRead { .. })));
    }

    #[test]
    fn lobby_chat_splits_on_cr_and_drops_trailing_empty() {
        let payload = b"hello\rworld\r";
        let sector = parse_one_extra(2, payload);
        assert_eq!(
            sector,
            ExtraSector::LobbyChat(vec!["hello".to_string(), "world".to_string()])
        );
    }

    #[test]
    fn unknown_extra_sector_is_kept_not_discarded() {
        let sector = parse_one_extra(99, &[1, 2, 3]);
        assert_eq!(
            sector,
            ExtraSector::Unknown {
                sector_type: 99,
                data: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn unit_sync_merges_subtypes_by_id_regardless_of_order() {
        let mut buf = Vec::new();
        // subtype 0x03 first for id=7
        let mut rec = vec![1u8, 0x03, 0, 0, 0, 0];
        rec.extend_from_slice(&7u32.to_le_bytes());
        rec.extend_from_slice(&0u16.to_le_bytes()); // status = 0 (in use)
        rec.extend_from_slice(&100u16.to_le_bytes()); // limit
        buf.extend_from_slice(&rec);
        // subtype 0x02 second for the same id
        let mut rec2 = vec![1u8, 0x02, 0, 0, 0, 0];
        rec2.extend_from_slice(&7u32.to_le_bytes());
        rec2.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        buf.extend_from_slice(&rec2);

        let mut section = (buf.len() as u16 + 2).to_le_bytes().to_vec();
        section.extend_from_slice(&buf);

        let (records, _) = parse_unit_sync_catalog(&section).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 7);
        assert_eq!(records[0].crc, Some(0xDEADBEEF));
        assert_eq!(records[0].status, Some(0));
        assert!(records[0].in_use());
    }

    #[test]
    fn unit_sync_status_one_is_not_in_use() {
        let rec = UnitSyncRecord {
            id: 1,
            status: Some(1),
            ..Default::default()
        };
        assert!(!rec.in_use());
    }
}
