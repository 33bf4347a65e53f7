//! Alliance-timeline reducer: tracks mutual-ally ticks between player 0
//! and every other player, via `Alliance (0x23)` packets.

use decoder::Packet;

use crate::event::Event;

const MAX_PLAYERS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct TeamsState {
    tdpid_to_index: std::collections::HashMap<u32, usize>,
    allied_to: [bool; MAX_PLAYERS],
    allied_by: [bool; MAX_PLAYERS],
    paired_ticks: [u32; MAX_PLAYERS],
    last_move_number: u32,
}

impl TeamsState {
    pub fn new(tdpid_by_index: &[i32]) -> Self {
        let mut tdpid_to_index = std::collections::HashMap::new();
        for (i, tdpid) in tdpid_by_index.iter().enumerate() {
            tdpid_to_index.insert(*tdpid as u32, i);
        }
        TeamsState {
            tdpid_to_index,
            ..Default::default()
        }
    }
}

pub fn use_teams_updates(state: &mut TeamsState, event: &Event) {
    if event.move_number != state.last_move_number {
        state.last_move_number = event.move_number;
        for i in 0..MAX_PLAYERS {
            if state.allied_to[i] && state.allied_by[i] {
                state.paired_ticks[i] += 1;
            }
        }
    }

    if let Packet::Alliance {
        player_tdpid,
        allied_tdpid,
        status,
    } = &event.packet
    {
        let allied = *status == 1;
        if let Some(&player_idx) = state.tdpid_to_index.get(player_tdpid) {
            if let Some(&ally_idx) = state.tdpid_to_index.get(allied_tdpid) {
                if player_idx == 0 {
                    state.allied_to[ally_idx] = allied;
                } else if ally_idx == 0 {
                    state.allied_by[player_idx] = allied;
                }
            }
        }
    }
}

/// Player indices (other than 0) that player 0 is allied to for more
/// than 80% of the game's moves. `total_moves` is `Game.total_moves`
/// (the header's move census), not the count of moves this reducer
/// happened to see events for — a move that splits to zero sub-packets
/// still counts in the spec's denominator.
pub fn finish(state: &TeamsState, total_moves: u32) -> Vec<usize> {
    if total_moves == 0 {
        return Vec::new();
    }
    (1..MAX_PLAYERS)
        .filter(|&i| state.paired_ticks[i] as f64 / total_moves as f64 > 0.80)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alliance_event(move_number: u32, player_tdpid: u32, allied_tdpid: u32, status: u8) -> Event {
        Event {
            sender: 1,
            move_number,
            clock_ms: move_number as u64 * 100,
            packet: Packet::Alliance {
                player_tdpid,
                allied_tdpid,
                status,
            },
        }
    }

    #[test]
    fn mutual_alliance_above_threshold_is_reported() {
        let mut state = TeamsState::new(&[100, 200]);
        for mv in 1..=10u32 {
            use_teams_updates(&mut state, &alliance_event(mv, 100, 200, 1));
            use_teams_updates(&mut state, &alliance_event(mv, 200, 100, 1));
        }
        assert_eq!(finish(&state, 10), vec![1]);
    }

    #[test]
    fn one_sided_alliance_is_not_reported() {
        let mut state = TeamsState::new(&[100, 200]);
        for mv in 1..=10u32 {
            use_teams_updates(&mut state, &alliance_event(mv, 100, 200, 1));
        }
        assert!(finish(&state, 10).is_empty());
    }

    #[test]
    fn moves_with_no_events_still_count_toward_the_denominator() {
        // The reducer only observes 10 ticks with an Alliance packet, but
        // the game actually ran 20 moves (some producing no sub-packets
        // at all) — dividing by the game's true move count keeps the
        // ratio from crossing 80% on a too-small denominator.
        let mut state = TeamsState::new(&[100, 200]);
        for mv in 1..=10u32 {
            use_teams_updates(&mut state, &alliance_event(mv, 100, 200, 1));
            use_teams_updates(&mut state, &alliance_event(mv, 200, 100, 1));
        }
        assert!(finish(&state, 20).is_empty());
    }
}
