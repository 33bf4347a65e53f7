//! Final standings and foul-play detection: kills/losses/resource totals
//! should only ever increase across legitimate samples.

use decoder::Packet;

use crate::event::Event;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FinalScore {
    pub sender: u8,
    pub status: u8,
    pub kills: u16,
    pub losses: u16,
    pub com_kills: u16,
    pub com_losses: u16,
    pub metal_total: f32,
    pub energy_total: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FinalScoresState {
    rows: std::collections::HashMap<u8, FinalScore>,
    foul_play: std::collections::HashSet<u8>,
}

pub fn use_final_scores_updates(state: &mut FinalScoresState, event: &Event) {
    let Packet::Score {
        status,
        kills,
        losses,
        com_kills,
        com_losses,
        metal_total,
        energy_total,
        ..
    } = &event.packet
    else {
        return;
    };

    if let Some(prev) = state.rows.get(&event.sender) {
        if *kills < prev.kills
            || *losses < prev.losses
            || *metal_total < prev.metal_total
            || *energy_total < prev.energy_total
        {
            state.foul_play.insert(event.sender);
        }
    }

    state.rows.insert(
        event.sender,
        FinalScore {
            sender: event.sender,
            status: *status,
            kills: *kills,
            losses: *losses,
            com_kills: *com_kills,
            com_losses: *com_losses,
            metal_total: *metal_total,
            energy_total: *energy_total,
        },
    );
}

pub fn finish(state: &FinalScoresState) -> (Vec<FinalScore>, Vec<u8>) {
    let mut rows: Vec<FinalScore> = state.rows.values().copied().collect();
    rows.sort_by_key(|r| r.sender);
    let mut foul_play: Vec<u8> = state.foul_play.iter().copied().collect();
    foul_play.sort();
    (rows, foul_play)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_event(sender: u8, move_number: u32, kills: u16, losses: u16, metal: f32, energy: f32) -> Event {
        Event {
            sender,
            move_number,
            clock_ms: move_number as u64 * 100,
            packet: Packet::Score {
                status: 0,
                kills,
                losses,
                com_kills: 0,
                com_losses: 0,
                metal_stored: 0.0,
                metal_storage: 0.0,
                metal_total: metal,
                metal_excess: 0.0,
                energy_stored: 0.0,
                energy_storage: 0.0,
                energy_total: energy,
                energy_excess: 0.0,
            },
        }
    }

    #[test]
    fn decreasing_kills_flags_foul_play() {
        let mut state = FinalScoresState::default();
        use_final_scores_updates(&mut state, &score_event(1, 1, 5, 0, 10.0, 10.0));
        use_final_scores_updates(&mut state, &score_event(1, 2, 3, 0, 12.0, 12.0));
        let (_, foul_play) = finish(&state);
        assert_eq!(foul_play, vec![1]);
    }

    #[test]
    fn monotonically_increasing_scores_do_not_flag_foul_play() {
        let mut state = FinalScoresState::default();
        use_final_scores_updates(&mut state, &score_event(1, 1, 1, 0, 10.0, 10.0));
        use_final_scores_updates(&mut state, &score_event(1, 2, 2, 0, 20.0, 20.0));
        let (rows, foul_play) = finish(&state);
        assert!(foul_play.is_empty());
        assert_eq!(rows[0].kills, 2);
    }
}
