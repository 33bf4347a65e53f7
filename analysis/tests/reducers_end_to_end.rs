//! Integration coverage for cross-reducer invariants: unit class
//! transitions are monotone, every non-observer ends up with a
//! time-to-die, and frames land on increasing clock boundaries.

use analysis::frames::{FramesState, UnitClass, use_frames_updates};
use analysis::time_to_die::{TimeToDieState, finish as finish_time_to_die, use_time_to_die_updates};
use analysis::Event;
use decoder::Packet;

fn build(sender: u8, net_id: u16, unit_id: u16, clock_ms: u64) -> Event {
    Event {
        sender,
        move_number: (clock_ms / 100) as u32,
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

fn state_change(unit_id: u16, state: u8, clock_ms: u64) -> Event {
    Event {
        sender: 1,
        move_number: (clock_ms / 100) as u32,
        clock_ms,
        packet: Packet::UnitStateChange { unit_id, state },
    }
}

#[test]
fn building_to_factory_and_mobile_to_air_never_regress() {
    let mut state = FramesState::new(500);
    use_frames_updates(&mut state, &build(1, 10, 200, 0));
    use_frames_updates(&mut state, &state_change(200, 9, 10));
    assert_eq!(state.live_units()[&200].class, UnitClass::Factory);
    // A second, unrelated state byte must not regress the class back to
    // Building.
    use_frames_updates(&mut state, &state_change(200, 5, 20));
    assert_eq!(state.live_units()[&200].class, UnitClass::Factory);
}

#[test]
fn surviving_non_observer_gets_final_clock_plus_one() {
    let mut ttd = TimeToDieState::new(500, &[]);
    use_time_to_die_updates(
        &mut ttd,
        &Event {
            sender: 1,
            move_number: 1,
            clock_ms: 55_000,
            packet: Packet::ViewMove { x: 1, y: 1 },
        },
    );
    let result = finish_time_to_die(&ttd, &[(1, 0), (2, 2)]);
    assert_eq!(result[0], 55_001);
    assert_eq!(result[1], 0); // observer slot untouched
}

#[test]
fn frames_land_on_increasing_ten_second_boundaries() {
    let mut state = FramesState::new(500);
    use_frames_updates(&mut state, &build(1, 1, 100, 500));
    use_frames_updates(&mut state, &build(1, 2, 101, 10_500));
    use_frames_updates(&mut state, &build(1, 3, 102, 25_500));
    let frames = state.frames();
    assert_eq!(frames.len(), 2);
    assert!(frames[0].clock_ms < frames[1].clock_ms);
    assert_eq!(frames[0].number, 1);
    assert_eq!(frames[1].number, 2);
}
