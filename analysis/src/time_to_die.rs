//! Per-player time-to-die: the clock time a player's commander was
//! destroyed, or the time the session server rejected them.

use decoder::Packet;

use crate::event::Event;

#[derive(Debug, Clone)]
pub struct TimeToDieState {
    max_units: u16,
    tdpid_to_player: std::collections::HashMap<i32, u8>,
    dead_at_ms: std::collections::HashMap<u8, u64>,
    last_clock_ms: u64,
}

impl TimeToDieState {
    pub fn new(max_units: u16, tdpid_by_player_number: &[(u8, i32)]) -> Self {
        let tdpid_to_player = tdpid_by_player_number
            .iter()
            .map(|&(number, tdpid)| (tdpid, number))
            .collect();
        TimeToDieState {
            max_units,
            tdpid_to_player,
            dead_at_ms: std::collections::HashMap::new(),
            last_clock_ms: 0,
        }
    }
}

pub fn use_time_to_die_updates(state: &mut TimeToDieState, event: &Event) {
    state.last_clock_ms = state.last_clock_ms.max(event.clock_ms);
    match &event.packet {
        Packet::UnitDestroyed { destroyed_id, .. } => {
            if state.max_units > 0 && *destroyed_id % state.max_units == 1 {
                state.dead_at_ms.entry(event.sender).or_insert(event.clock_ms);
            }
        }
        Packet::PlayerReject { tdpid, status } if *status == 6 => {
            if let Some(&player) = state.tdpid_to_player.get(tdpid) {
                state.dead_at_ms.entry(player).or_insert(event.clock_ms);
            }
        }
        _ => {}
    }
}

/// `time_to_die[10]`, indexed by player number - 1. Players with
/// `side == 2` (observers) are left at `0`.
pub fn finish(
    state: &TimeToDieState,
    players: &[(u8, u8)], // (number, side)
) -> [u64; 10] {
    let mut out = [0u64; 10];
    for &(number, side) in players {
        if side == 2 || number == 0 || number as usize > out.len() {
            continue;
        }
        let idx = number as usize - 1;
        out[idx] = state
            .dead_at_ms
            .get(&number)
            .copied()
            .unwrap_or(state.last_clock_ms + 1);
    }
    out
}
