//! Combines unit build/destroy events with the running score sample,
//! producing one record per sender for each build or destruction.

use decoder::Packet;

use crate::event::Event;
use crate::score_series::LiteSample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitDataPoint {
    pub net_id: u16,
    pub running_count: u32,
    pub sample: Option<LiteSample>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PrevScore {
    clock_ms: u64,
    metal_total: f32,
    energy_total: f32,
}

#[derive(Debug, Clone, Default)]
pub struct UnitDataSeriesState {
    unit_to_net_id: std::collections::HashMap<(u8, u16), u16>,
    counts: std::collections::HashMap<(u8, u16), u32>,
    latest_sample: std::collections::HashMap<u8, LiteSample>,
    prev_score: std::collections::HashMap<u8, PrevScore>,
    records: std::collections::HashMap<u8, Vec<UnitDataPoint>>,
}

fn sanitize_rate(rate: f32) -> f32 {
    if rate.is_nan() || rate.is_infinite() {
        1.0
    } else {
        rate
    }
}

pub fn use_unit_data_series_updates(state: &mut UnitDataSeriesState, event: &Event) {
    match &event.packet {
        Packet::Score {
            metal_total,
            energy_total,
            ..
        } => {
            if let Some(prev) = state.prev_score.get(&event.sender).copied() {
                let diff = event.clock_ms.saturating_sub(prev.clock_ms);
                if diff > 0 {
                    let sample = LiteSample {
                        clock_ms: event.clock_ms,
                        metal_rate: sanitize_rate(
                            (metal_total - prev.metal_total) * 1000.0 / diff as f32,
                        ),
                        energy_rate: sanitize_rate(
                            (energy_total - prev.energy_total) * 1000.0 / diff as f32,
                        ),
                    };
                    state.latest_sample.insert(event.sender, sample);
                }
            }
            state.prev_score.insert(
                event.sender,
                PrevScore {
                    clock_ms: event.clock_ms,
                    metal_total: *metal_total,
                    energy_total: *energy_total,
                },
            );
        }
        Packet::UnitBuildStart { net_id, unit_id, .. } => {
            state
                .unit_to_net_id
                .insert((event.sender, *unit_id), *net_id);
            let count = state.counts.entry((event.sender, *net_id)).or_insert(0);
            *count += 1;
            let point = UnitDataPoint {
                net_id: *net_id,
                running_count: *count,
                sample: state.latest_sample.get(&event.sender).copied(),
            };
            state.records.entry(event.sender).or_default().push(point);
        }
        Packet::UnitDestroyed { destroyed_id, .. } => {
            if let Some(&net_id) = state.unit_to_net_id.get(&(event.sender, *destroyed_id)) {
                let count = state.counts.get(&(event.sender, net_id)).copied().unwrap_or(0);
                let point = UnitDataPoint {
                    net_id,
                    running_count: count,
                    sample: state.latest_sample.get(&event.sender).copied(),
                };
                state.records.entry(event.sender).or_default().push(point);
            }
        }
        _ => {}
    }
}

pub fn finish(
    state: UnitDataSeriesState,
) -> std::collections::HashMap<u8, Vec<UnitDataPoint>> {
    state.records
}
