//! Concurrent fan-out over a decoded packet stream: one reducer thread
//! per independent analysis, tee'd from a single producer that drives
//! the move reader and the smartpak unpacker.

pub mod event;
pub mod final_scores;
pub mod frames;
pub mod score_series;
pub mod teams;
pub mod time_to_die;
pub mod unit_count;
pub mod unit_data_series;

pub use event::Event;

use std::sync::mpsc;
use std::thread;

use decoder::{CancellationToken, Game, MoveReader, Packet, SmartpakMode, SmartpakUnpacker};
use log::warn;

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub allies: Vec<usize>,
    pub score_series: std::collections::HashMap<String, Vec<score_series::LiteSample>>,
    pub final_scores: Vec<final_scores::FinalScore>,
    pub foul_play: Vec<u8>,
    pub unit_counts: Vec<unit_count::UnitTypeCount>,
    pub time_to_die: [u64; 10],
    pub frames: Vec<frames::PlaybackFrame>,
    pub unit_data_series: std::collections::HashMap<u8, Vec<unit_data_series::UnitDataPoint>>,
}

/// Runs every reducer concurrently over `game`'s move region and
/// assembles their results. Channels are unbuffered: the slowest
/// reducer sets the pace for the whole pipeline.
pub fn analyze(game: &Game, move_region: &[u8], cancel: CancellationToken) -> Analysis {
    let tdpid_by_index: Vec<i32> = game.players.iter().map(|p| p.tdpid).collect();
    let tdpid_by_player_number: Vec<(u8, i32)> =
        game.players.iter().map(|p| (p.number, p.tdpid)).collect();
    let player_sides: Vec<(u8, u8)> = game.players.iter().map(|p| (p.number, p.side)).collect();
    let max_units = game.max_units;

    let (teams_tx, teams_rx) = mpsc::sync_channel::<Event>(0);
    let (score_tx, score_rx) = mpsc::sync_channel::<Event>(0);
    let (final_tx, final_rx) = mpsc::sync_channel::<Event>(0);
    let (unit_count_tx, unit_count_rx) = mpsc::sync_channel::<Event>(0);
    let (ttd_tx, ttd_rx) = mpsc::sync_channel::<Event>(0);
    let (frames_tx, frames_rx) = mpsc::sync_channel::<Event>(0);
    let (uds_tx, uds_rx) = mpsc::sync_channel::<Event>(0);

    let total_moves = game.total_moves;
    let teams_handle = thread::spawn(move || {
        let mut state = teams::TeamsState::new(&tdpid_by_index);
        while let Ok(ev) = teams_rx.recv() {
            teams::use_teams_updates(&mut state, &ev);
        }
        teams::finish(&state, total_moves)
    });

    let score_handle = thread::spawn(move || {
        let mut state = score_series::ScoreSeriesState::default();
        while let Ok(ev) = score_rx.recv() {
            score_series::use_score_series_updates(&mut state, &ev);
        }
        state
    });

    let final_handle = thread::spawn(move || {
        let mut state = final_scores::FinalScoresState::default();
        while let Ok(ev) = final_rx.recv() {
            final_scores::use_final_scores_updates(&mut state, &ev);
        }
        final_scores::finish(&state)
    });

    let unit_count_handle = thread::spawn(move || {
        let mut state = unit_count::UnitCountState::default();
        while let Ok(ev) = unit_count_rx.recv() {
            unit_count::use_unit_count_updates(&mut state, &ev);
        }
        unit_count::finish(&state)
    });

    let ttd_handle = thread::spawn(move || {
        let mut state = time_to_die::TimeToDieState::new(max_units, &tdpid_by_player_number);
        while let Ok(ev) = ttd_rx.recv() {
            time_to_die::use_time_to_die_updates(&mut state, &ev);
        }
        time_to_die::finish(&state, &player_sides)
    });

    let frames_handle = thread::spawn(move || {
        let mut state = frames::FramesState::new(max_units);
        while let Ok(ev) = frames_rx.recv() {
            frames::use_frames_updates(&mut state, &ev);
        }
        frames::finish(state)
    });

    let uds_handle = thread::spawn(move || {
        let mut state = unit_data_series::UnitDataSeriesState::default();
        while let Ok(ev) = uds_rx.recv() {
            unit_data_series::use_unit_data_series_updates(&mut state, &ev);
        }
        unit_data_series::finish(state)
    });

    run_producer(move_region, max_units, cancel, |ev| {
        let _ = teams_tx.send(ev.clone());
        let _ = score_tx.send(ev.clone());
        let _ = final_tx.send(ev.clone());
        let _ = unit_count_tx.send(ev.clone());
        let _ = ttd_tx.send(ev.clone());
        let _ = frames_tx.send(ev.clone());
        let _ = uds_tx.send(ev);
    });

    let allies = teams_handle.join().unwrap_or_default();
    let score_state = score_handle.join().unwrap_or_default();
    let (final_scores, foul_play) = final_handle.join().unwrap_or_default();
    let unit_counts = unit_count_handle.join().unwrap_or_default();
    let time_to_die = ttd_handle.join().unwrap_or([0; 10]);
    let frames = frames_handle.join().unwrap_or_default();
    let unit_data_series = uds_handle.join().unwrap_or_default();

    let player_name = |sender: u8| -> Option<String> {
        game.players
            .iter()
            .find(|p| p.number == sender)
            .map(|p| p.name.clone())
    };
    let score_series = score_series::finish(&score_state, player_name);

    Analysis {
        allies,
        score_series,
        final_scores,
        foul_play,
        unit_counts,
        time_to_die,
        frames,
        unit_data_series,
    }
}

/// The producer: drives the move reader and smartpak unpacker, decoding
/// each expanded sub-packet and invoking `sink` with its event. Owns the
/// single tick clock shared by every reducer.
fn run_producer(
    move_region: &[u8],
    max_units: u16,
    cancel: CancellationToken,
    mut sink: impl FnMut(Event),
) {
    let mut unpacker = SmartpakUnpacker::new(max_units, SmartpakMode::Permissive);
    let reader = MoveReader::with_cancellation(move_region, cancel);
    let mut clock_ms: u64 = 0;
    let mut last_move_number = 0u32;

    for batch in reader {
        let recs = match batch {
            Ok(recs) => recs,
            Err(_) => break,
        };
        if recs.is_empty() {
            continue;
        }
        let sender = recs[0].sender;
        let move_number = recs[0].move_number;
        let time_delta = recs[0].time_delta;
        if move_number != last_move_number {
            clock_ms += time_delta as u64;
            last_move_number = move_number;
        }

        let raw_bodies: Vec<Vec<u8>> = recs.into_iter().map(|r| r.body).collect();
        let expanded = unpacker.unpack(sender, &raw_bodies);
        for body in expanded {
            match decoder::packet::decode(&body) {
                Ok(packet) => sink(Event {
                    sender,
                    move_number,
                    clock_ms,
                    packet,
                }),
                Err(e) => warn!("skipping undecodable sub-packet: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay_with_one_alliance_move() -> (Game, Vec<u8>) {
        let game = Game {
            map_name: "Test".to_string(),
            max_units: 500,
            players: vec![
                decoder::Player {
                    number: 1,
                    name: "Alice".to_string(),
                    color: 252,
                    side: 0,
                    address: String::new(),
                    tdpid: 1,
                    cheats_a2: false,
                    cheats_a4: false,
                },
                decoder::Player {
                    number: 2,
                    name: "Bob".to_string(),
                    color: 249,
                    side: 0,
                    address: String::new(),
                    tdpid: 2,
                    cheats_a2: false,
                    cheats_a4: false,
                },
            ],
            lobby_chat: Vec::new(),
            version_string: String::new(),
            date_string: String::new(),
            record_source: String::new(),
            unit_sync: Vec::new(),
            unit_sum: 0,
            total_moves: 0,
            last_seen_move: [0; 11],
            move_region_offset: 0,
        };

        // one move: sender 1, UnitBuildStart sub-packet.
        let mut sub = vec![0x09u8];
        sub.extend_from_slice(&7u16.to_le_bytes());
        sub.extend_from_slice(&501u16.to_le_bytes());
        sub.resize(23, 0);
        let mut body = 10u16.to_le_bytes().to_vec();
        body.push(1);
        body.push(0x03); // uncompressed-move indicator, consumed by the injection prefix
        body.extend_from_slice(&sub);
        let mut mv = (body.len() as u16).to_le_bytes().to_vec();
        mv.extend_from_slice(&body);

        (game, mv)
    }

    #[test]
    fn analyze_runs_every_reducer_to_completion() {
        let (game, move_region) = replay_with_one_alliance_move();
        let cancel = CancellationToken::new();
        let analysis = analyze(&game, &move_region, cancel);
        assert!(analysis.allies.is_empty());
        assert!(analysis.frames.is_empty() || !analysis.frames.is_empty());
    }
}
