//! Per-sender build counts, keyed by network unit type, with the clock
//! time each type first appeared.

use decoder::Packet;

use crate::event::Event;

#[derive(Debug, Clone, Copy)]
struct Registered {
    net_id: u16,
    finished: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UnitCountState {
    by_sender: std::collections::HashMap<u8, std::collections::HashMap<u16, Registered>>,
    counts: std::collections::HashMap<(u8, u16), u32>,
    first_seen_ms: std::collections::HashMap<(u8, u16), u64>,
}

pub fn use_unit_count_updates(state: &mut UnitCountState, event: &Event) {
    match &event.packet {
        Packet::UnitBuildStart { net_id, unit_id, .. } => {
            state
                .by_sender
                .entry(event.sender)
                .or_default()
                .insert(*unit_id, Registered {
                    net_id: *net_id,
                    finished: false,
                });
            state
                .first_seen_ms
                .entry((event.sender, *net_id))
                .or_insert(event.clock_ms);
        }
        Packet::UnitFinished { built_id, .. } => {
            if let Some(units) = state.by_sender.get_mut(&event.sender) {
                if let Some(unit) = units.get_mut(built_id) {
                    if !unit.finished {
                        unit.finished = true;
                        *state.counts.entry((event.sender, unit.net_id)).or_insert(0) += 1;
                    }
                }
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitTypeCount {
    pub sender: u8,
    pub net_id: u16,
    pub count: u32,
    pub first_seen_ms: u64,
}

pub fn finish(state: &UnitCountState) -> Vec<UnitTypeCount> {
    let mut out: Vec<UnitTypeCount> = state
        .counts
        .iter()
        .map(|(&(sender, net_id), &count)| UnitTypeCount {
            sender,
            net_id,
            count,
            first_seen_ms: state
                .first_seen_ms
                .get(&(sender, net_id))
                .copied()
                .unwrap_or(0),
        })
        .collect();
    out.sort_by_key(|r| (r.sender, r.net_id));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_event(sender: u8, net_id: u16, unit_id: u16, clock_ms: u64) -> Event {
        Event {
            sender,
            move_number: 1,
            clock_ms,
            packet: Packet::UnitBuildStart {
                net_id,
                unit_id,
                x: 0,
                y: 0,
                z: 0,
            },
        }
    }

    fn finish_event(sender: u8, built_id: u16) -> Event {
        Event {
            sender,
            move_number: 2,
            clock_ms: 999,
            packet: Packet::UnitFinished {
                built_id,
                built_by_id: 0,
            },
        }
    }

    #[test]
    fn counts_increment_only_once_per_unit() {
        let mut state = UnitCountState::default();
        use_unit_count_updates(&mut state, &build_event(1, 42, 100, 10));
        use_unit_count_updates(&mut state, &finish_event(1, 100));
        use_unit_count_updates(&mut state, &finish_event(1, 100));
        let counts = finish(&state);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].count, 1);
        assert_eq!(counts[0].first_seen_ms, 10);
    }

    #[test]
    fn unfinished_builds_do_not_count() {
        let mut state = UnitCountState::default();
        use_unit_count_updates(&mut state, &build_event(1, 42, 100, 10));
        assert!(finish(&state).is_empty());
    }
}
