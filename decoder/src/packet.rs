//! Typed sub-packet variants and their per-marker decoders.
//!
//! Each variant's named fields come first in marker order; bytes beyond
//! what's named are reserved and read past without further
//! interpretation, since the static length table already fixes the
//! packet's total size.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

fn need(body: &[u8], at: usize, len: usize) -> Result<&[u8]> {
    body.get(at..at + len).ok_or(Error::ShortRead {
        needed: at + len,
        available: body.len(),
    })
}

fn u16_at(body: &[u8], at: usize) -> Result<u16> {
    Ok(LittleEndian::read_u16(need(body, at, 2)?))
}

fn u32_at(body: &[u8], at: usize) -> Result<u32> {
    Ok(LittleEndian::read_u32(need(body, at, 4)?))
}

fn f32_at(body: &[u8], at: usize) -> Result<f32> {
    Ok(LittleEndian::read_f32(need(body, at, 4)?))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub z: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    UnitBuildStart {
        net_id: u16,
        unit_id: u16,
        x: u16,
        y: u16,
        z: u16,
    },
    UnitFinished {
        built_id: u16,
        built_by_id: u16,
    },
    UnitDestroyed {
        destroyed_id: u16,
        destroyer_id: u16,
    },
    UnitStateChange {
        unit_id: u16,
        state: u8,
    },
    Damage {
        damager: u16,
        damaged: u16,
        amount: f32,
        weapon: u16,
    },
    Shot {
        shooter_id: u16,
        shot_id: u16,
        origin: Vec3,
        destination: Vec3,
    },
    Score {
        status: u8,
        kills: u16,
        losses: u16,
        com_kills: u16,
        com_losses: u16,
        metal_stored: f32,
        metal_storage: f32,
        metal_total: f32,
        metal_excess: f32,
        energy_stored: f32,
        energy_storage: f32,
        energy_total: f32,
        energy_excess: f32,
    },
    Alliance {
        player_tdpid: u32,
        allied_tdpid: u32,
        status: u8,
    },
    ChatMessage {
        text: String,
    },
    PlayerReject {
        tdpid: u32,
        status: u8,
    },
    /// The `0x2C/0x0B` sub-variant: a compressed unit position update.
    PositionSync2C0B {
        unit_id_offset: u16,
        net_id: u16,
        x16: u16,
        y16: u16,
    },
    /// Any other `0x2C` sub-variant, kept raw.
    PositionSyncOther {
        sub_marker: u8,
        body: Vec<u8>,
    },
    ViewMove {
        x: u16,
        y: u16,
    },
    Default {
        marker: u8,
        body: Vec<u8>,
    },
}

fn decode_score(body: &[u8]) -> Result<Packet> {
    let status = *need(body, 0, 1)?.first().unwrap();
    let kills = u16_at(body, 1)?;
    let losses = u16_at(body, 3)?;
    let com_kills = u16_at(body, 5)?;
    let com_losses = u16_at(body, 7)?;
    let metal_stored = f32_at(body, 9)?;
    let metal_storage = f32_at(body, 13)?;
    let metal_total = f32_at(body, 17)?;
    let metal_excess = f32_at(body, 21)?;
    let energy_stored = f32_at(body, 25)?;
    let energy_storage = f32_at(body, 29)?;
    let energy_total = f32_at(body, 33)?;
    let energy_excess = f32_at(body, 37)?;
    Ok(Packet::Score {
        status,
        kills,
        losses,
        com_kills,
        com_losses,
        metal_stored,
        metal_storage,
        metal_total,
        metal_excess,
        energy_stored,
        energy_storage,
        energy_total,
        energy_excess,
    })
}

fn decode_shot(body: &[u8]) -> Result<Packet> {
    let shooter_id = u16_at(body, 0)?;
    let shot_id = u16_at(body, 2)?;
    let origin = Vec3 {
        x: f32_at(body, 4)?,
        z: f32_at(body, 8)?,
        y: f32_at(body, 12)?,
    };
    let destination = Vec3 {
        x: f32_at(body, 16)?,
        z: f32_at(body, 20)?,
        y: f32_at(body, 24)?,
    };
    Ok(Packet::Shot {
        shooter_id,
        shot_id,
        origin,
        destination,
    })
}

/// Decodes one sub-packet slice (marker byte included) into its typed
/// variant. `sub[0]` has already been validated as a known marker by the
/// splitter; this does not re-check lengths beyond what each field read
/// requires.
pub fn decode(sub: &[u8]) -> Result<Packet> {
    if sub.is_empty() {
        return Err(Error::ShortRead {
            needed: 1,
            available: 0,
        });
    }
    let marker = sub[0];
    let body = &sub[1..];
    Ok(match marker {
        0x09 => Packet::UnitBuildStart {
            net_id: u16_at(body, 0)?,
            unit_id: u16_at(body, 2)?,
            x: u16_at(body, 4)?,
            y: u16_at(body, 6)?,
            z: u16_at(body, 8)?,
        },
        0x12 => Packet::UnitFinished {
            built_id: u16_at(body, 0)?,
            built_by_id: u16_at(body, 2)?,
        },
        0x0C => Packet::UnitDestroyed {
            destroyed_id: u16_at(body, 0)?,
            destroyer_id: u16_at(body, 2)?,
        },
        0x11 => Packet::UnitStateChange {
            unit_id: u16_at(body, 0)?,
            state: *need(body, 2, 1)?.first().unwrap(),
        },
        0x0B => Packet::Damage {
            damager: u16_at(body, 0)?,
            damaged: u16_at(body, 2)?,
            amount: f32_at(body, 4)?,
            weapon: u16_at(body, 8).unwrap_or(0),
        },
        0x0D => decode_shot(body)?,
        0x28 => decode_score(body)?,
        0x23 => Packet::Alliance {
            player_tdpid: u32_at(body, 0)?,
            allied_tdpid: u32_at(body, 4)?,
            status: *need(body, 8, 1)?.first().unwrap(),
        },
        0x05 => {
            let text_bytes = need(body, 0, body.len().min(64))?;
            let end = text_bytes.iter().position(|&b| b == 0).unwrap_or(text_bytes.len());
            Packet::ChatMessage {
                text: String::from_utf8_lossy(&text_bytes[..end]).into_owned(),
            }
        }
        0x1B => Packet::PlayerReject {
            tdpid: u32_at(body, 0)?,
            status: *need(body, 4, 1)?.first().unwrap(),
        },
        0x2C => {
            let sub_marker = *need(body, 0, 1)?.first().unwrap();
            if sub_marker == 0x0B {
                Packet::PositionSync2C0B {
                    unit_id_offset: u16_at(body, 1)?,
                    net_id: u16_at(body, 3)?,
                    x16: u16_at(body, 5)?,
                    y16: u16_at(body, 7)?,
                }
            } else {
                Packet::PositionSyncOther {
                    sub_marker,
                    body: body.to_vec(),
                }
            }
        }
        0xFC => Packet::ViewMove {
            x: u16_at(body, 0)?,
            y: u16_at(body, 2)?,
        },
        other => Packet::Default {
            marker: other,
            body: body.to_vec(),
        },
    })
}
