//! Live unit map, 10-second frame snapshotting, and the post-hoc
//! movement-smoothing pass.

use decoder::Packet;

use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    Building,
    Commander,
    Mobile,
    Factory,
    Air,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub x: f32,
    pub y: f32,
    pub time_ms: u64,
    pub sequence_id: u32,
}

impl PositionSample {
    pub const NULL: PositionSample = PositionSample {
        x: f32::NAN,
        y: f32::NAN,
        time_ms: 0,
        sequence_id: 0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub owner: u8,
    pub net_id: u16,
    pub finished: bool,
    pub class: UnitClass,
    pub pos: PositionSample,
    pub next_pos: Option<PositionSample>,
    pub stable_id: u64,
}

#[derive(Debug, Clone)]
pub struct PlaybackFrame {
    pub number: u32,
    pub clock_ms: u64,
    pub units: std::collections::HashMap<u16, Unit>,
}

#[derive(Debug, Clone)]
pub struct FramesState {
    max_units: u16,
    live: std::collections::HashMap<u16, Unit>,
    frames: Vec<PlaybackFrame>,
    last_boundary: u64,
    next_stable_id: u64,
}

impl FramesState {
    pub fn new(max_units: u16) -> Self {
        FramesState {
            max_units,
            live: std::collections::HashMap::new(),
            frames: Vec::new(),
            last_boundary: 0,
            next_stable_id: 1,
        }
    }

    pub fn live_units(&self) -> &std::collections::HashMap<u16, Unit> {
        &self.live
    }

    pub fn frames(&self) -> &[PlaybackFrame] {
        &self.frames
    }
}

pub fn use_frames_updates(state: &mut FramesState, event: &Event) {
    match &event.packet {
        Packet::UnitBuildStart { net_id, unit_id, x, y, .. } => {
            let class = if state.max_units > 0 && unit_id % state.max_units == 1 {
                UnitClass::Commander
            } else {
                UnitClass::Building
            };
            let stable_id = state.next_stable_id;
            state.next_stable_id += 1;
            state.live.insert(
                *unit_id,
                Unit {
                    owner: event.sender,
                    net_id: *net_id,
                    finished: false,
                    class,
                    pos: PositionSample {
                        x: *x as f32,
                        y: *y as f32,
                        time_ms: event.clock_ms,
                        sequence_id: 0,
                    },
                    next_pos: None,
                    stable_id,
                },
            );
        }
        Packet::UnitFinished { built_id, built_by_id } => {
            let parent_is_factory = state
                .live
                .get(built_by_id)
                .map(|p| p.class == UnitClass::Factory)
                .unwrap_or(false);
            if let Some(unit) = state.live.get_mut(built_id) {
                unit.finished = true;
                if parent_is_factory {
                    unit.class = UnitClass::Mobile;
                }
            }
        }
        Packet::UnitStateChange { unit_id, state: raw_state } => {
            if let Some(unit) = state.live.get_mut(unit_id) {
                if *raw_state == 9 && unit.class == UnitClass::Building {
                    unit.class = UnitClass::Factory;
                } else if *raw_state == 2 && unit.class == UnitClass::Mobile {
                    unit.class = UnitClass::Air;
                }
            }
        }
        Packet::UnitDestroyed { destroyed_id, .. } => {
            state.live.remove(destroyed_id);
        }
        Packet::Shot {
            shooter_id,
            shot_id,
            origin,
            destination,
        } => {
            if let Some(unit) = state.live.get_mut(shooter_id) {
                unit.pos = PositionSample {
                    x: origin.x,
                    y: origin.y,
                    time_ms: event.clock_ms,
                    sequence_id: unit.pos.sequence_id + 1,
                };
            }
            if let Some(unit) = state.live.get_mut(shot_id) {
                if unit.class != UnitClass::Building {
                    unit.pos = PositionSample {
                        x: destination.x,
                        y: destination.y,
                        time_ms: event.clock_ms,
                        sequence_id: unit.pos.sequence_id + 1,
                    };
                }
            }
        }
        Packet::PositionSync2C0B {
            unit_id_offset,
            net_id,
            x16,
            y16,
        } => {
            let expected_net_id = net_id.wrapping_sub(0x0C00);
            if let Some(unit) = state.live.get_mut(unit_id_offset) {
                if unit.net_id == expected_net_id {
                    unit.pos = PositionSample {
                        x: (*x16 as f32) * 16.0,
                        y: (*y16 as f32) * 16.0,
                        time_ms: event.clock_ms,
                        sequence_id: unit.pos.sequence_id + 1,
                    };
                }
            }
        }
        _ => {}
    }

    let boundary = event.clock_ms / 10_000;
    if boundary > state.last_boundary {
        state.last_boundary = boundary;
        state.frames.push(PlaybackFrame {
            number: state.frames.len() as u32 + 1,
            clock_ms: event.clock_ms,
            units: state.live.clone(),
        });
    }
}

/// Walks the finished frame list and fills in each unit's `next_pos` by
/// searching forward for the next frame in which its `sequence_id`
/// changes, then linearly interpolates `pos` toward it.
pub fn smooth_frames(frames: &mut [PlaybackFrame]) {
    let stable_ids: std::collections::HashSet<u64> = frames
        .iter()
        .flat_map(|f| f.units.values().map(|u| u.stable_id))
        .collect();

    for &stable_id in &stable_ids {
        let indices: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.units.values().any(|u| u.stable_id == stable_id))
            .map(|(i, _)| i)
            .collect();

        for (pos_in_list, &i) in indices.iter().enumerate() {
            let current_seq = frames[i]
                .units
                .values()
                .find(|u| u.stable_id == stable_id)
                .map(|u| u.pos.sequence_id);
            let Some(current_seq) = current_seq else { continue };

            let later = indices[pos_in_list + 1..].iter().find_map(|&j| {
                frames[j]
                    .units
                    .values()
                    .find(|u| u.stable_id == stable_id && u.pos.sequence_id != current_seq)
                    .map(|u| (j, u.pos))
            });

            match later {
                Some((_j, later_pos)) => {
                    for &k in indices[pos_in_list..].iter().take_while(|&&k| {
                        frames[k]
                            .units
                            .values()
                            .find(|u| u.stable_id == stable_id)
                            .map(|u| u.pos.sequence_id == current_seq)
                            .unwrap_or(false)
                    }) {
                        if let Some(unit) = frames[k]
                            .units
                            .values_mut()
                            .find(|u| u.stable_id == stable_id)
                        {
                            unit.next_pos = Some(later_pos);
                            let span = later_pos.time_ms.saturating_sub(unit.pos.time_ms);
                            let elapsed = frames[k].clock_ms.saturating_sub(unit.pos.time_ms);
                            let fraction = if span == 0 {
                                0.0
                            } else {
                                (elapsed as f32 / span as f32).clamp(0.0, 1.0)
                            };
                            unit.pos.x += (later_pos.x - unit.pos.x) * fraction;
                            unit.pos.y += (later_pos.y - unit.pos.y) * fraction;
                        }
                    }
                }
                None => {
                    if let Some(unit) = frames[i]
                        .units
                        .values_mut()
                        .find(|u| u.stable_id == stable_id)
                    {
                        unit.next_pos = Some(PositionSample::NULL);
                    }
                }
            }
        }
    }
}

/// Assigns each player their configured color unless two players
/// collide, in which case every player falls back to the identity map.
pub fn color_map(player_colors: &[(u8, u8)]) -> std::collections::HashMap<u8, u8> {
    let mut seen = std::collections::HashSet::new();
    let mut collision = false;
    for &(_, color) in player_colors {
        if !seen.insert(color) {
            collision = true;
            break;
        }
    }
    if collision {
        player_colors.iter().map(|&(number, _)| (number, number)).collect()
    } else {
        player_colors.iter().copied().collect()
    }
}

pub fn finish(state: FramesState) -> Vec<PlaybackFrame> {
    let mut frames = state.frames;
    smooth_frames(&mut frames);
    frames
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

    #[test]
    fn commander_slot_assigned_by_unit_id_modulus() {
        let mut state = FramesState::new(500);
        use_frames_updates(&mut state, &build_event(1, 7, 501, 0));
        assert_eq!(state.live[&501].class, UnitClass::Commander);
    }

    #[test]
    fn building_becomes_factory_on_state_nine() {
        let mut state = FramesState::new(500);
        use_frames_updates(&mut state, &build_event(1, 7, 100, 0));
        use_frames_updates(
            &mut state,
            &Event {
                sender: 1,
                move_number: 1,
                clock_ms: 0,
                packet: Packet::UnitStateChange { unit_id: 100, state: 9 },
            },
        );
        assert_eq!(state.live[&100].class, UnitClass::Factory);
    }

    #[test]
    fn frame_emitted_at_ten_second_boundary() {
        let mut state = FramesState::new(500);
        use_frames_updates(&mut state, &build_event(1, 7, 100, 9999));
        assert!(state.frames.is_empty());
        use_frames_updates(&mut state, &build_event(1, 8, 101, 10001));
        assert_eq!(state.frames.len(), 1);
        assert_eq!(state.frames[0].number, 1);
    }

    #[test]
    fn color_map_falls_back_to_identity_on_collision() {
        let map = color_map(&[(1, 250), (2, 250)]);
        assert_eq!(map[&1], 1);
        assert_eq!(map[&2], 2);
    }

    #[test]
    fn color_map_uses_configured_colors_without_collision() {
        let map = color_map(&[(1, 250), (2, 210)]);
        assert_eq!(map[&1], 250);
        assert_eq!(map[&2], 210);
    }
}
