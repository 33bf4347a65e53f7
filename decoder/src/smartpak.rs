//! Reconstructs position/health updates the wire format elides behind a
//! rolling per-sender sequence counter.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

/// Strict mode drops sub-packets the unpacker doesn't recognize right
/// after a serial reset; permissive mode forwards everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Permissive,
}

#[derive(Debug, Clone, Copy, Default)]
struct SenderState {
    last_serial: u32,
    pos_sync_complete: u32,
    recent_pos_flag: bool,
}

/// Per-match unpacker state: one sequence-counter state machine per
/// sender, plus the shared health ledger, owned here rather than
/// globally shared.
pub struct SmartpakUnpacker {
    states: std::collections::HashMap<u8, SenderState>,
    health_ledger: Vec<i32>,
    mode: Mode,
}

impl SmartpakUnpacker {
    pub fn new(max_units: u16, mode: Mode) -> Self {
        SmartpakUnpacker {
            states: std::collections::HashMap::new(),
            health_ledger: vec![0; max_units.max(1) as usize],
            mode,
        }
    }

    pub fn health_ledger(&self) -> &[i32] {
        &self.health_ledger
    }

    fn state_for(&mut self, sender: u8) -> &mut SenderState {
        self.states.entry(sender).or_default()
    }

    /// Expands one sender's batch of raw sub-packets for a single move.
    pub fn unpack(&mut self, sender: u8, sub_packets: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let max_units = self.health_ledger.len() as u32;
        let mut out = Vec::with_capacity(sub_packets.len());
        for raw in sub_packets {
            if raw.is_empty() {
                continue;
            }
            let marker = raw[0];
            match marker {
                0xFE => {
                    if raw.len() >= 5 {
                        let serial = LittleEndian::read_u32(&raw[1..5]);
                        self.state_for(sender).last_serial = serial;
                    } else {
                        warn!("sender {sender}: short 0xFE reseed packet");
                    }
                }
                0xFF => {
                    let state = self.state_for(sender);
                    let serial = state.last_serial;
                    let mut synth = vec![0x2C, 0x0B, 0x00];
                    synth.extend_from_slice(&serial.to_le_bytes());
                    synth.extend_from_slice(&[0xFF, 0xFF, 0x01, 0x00]);
                    out.push(synth);
                    self.state_for(sender).last_serial = serial.wrapping_add(1);
                    self.state_for(sender).recent_pos_flag = true;
                }
                0xFD => {
                    if raw.len() < 4 {
                        warn!("sender {sender}: short 0xFD packet");
                        continue;
                    }
                    let serial = self.state_for(sender).last_serial;
                    let mut synth = vec![0x2C];
                    synth.extend_from_slice(&raw[1..4]);
                    synth.extend_from_slice(&serial.to_le_bytes());
                    synth.extend_from_slice(&raw[4..]);

                    if synth.len() >= 14 && max_units > 0 {
                        let marker_field = LittleEndian::read_u16(&synth[7..9]);
                        if marker_field == 0xFFFF {
                            let slot = (serial % max_units) as usize;
                            self.health_ledger[slot] = LittleEndian::read_i32(&synth[10..14]);
                        }
                    }
                    out.push(synth);
                    self.state_for(sender).last_serial = serial.wrapping_add(1);
                }
                0x2C => {
                    if raw.len() >= 7 {
                        let serial = LittleEndian::read_u32(&raw[3..7]);
                        self.state_for(sender).last_serial = serial;
                        self.state_for(sender).pos_sync_complete = serial;
                    }
                    out.push(raw.clone());
                }
                _ => {
                    if self.mode == Mode::Permissive {
                        out.push(raw.clone());
                    }
                }
            }
        }
        out
    }
}
