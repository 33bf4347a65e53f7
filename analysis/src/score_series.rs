//! Per-player metal/energy production-rate series, derived from
//! successive `Score (0x28)` packets.

use decoder::Packet;

use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteSample {
    pub clock_ms: u64,
    pub metal_rate: f32,
    pub energy_rate: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct PrevSample {
    clock_ms: u64,
    metal_total: f32,
    energy_total: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreSeriesState {
    prev: std::collections::HashMap<u8, PrevSample>,
    series: std::collections::HashMap<u8, Vec<LiteSample>>,
}

fn sanitize_rate(rate: f32) -> f32 {
    if rate.is_nan() || rate.is_infinite() {
        1.0
    } else {
        rate
    }
}

pub fn use_score_series_updates(state: &mut ScoreSeriesState, event: &Event) {
    let Packet::Score {
        metal_total,
        energy_total,
        ..
    } = &event.packet
    else {
        return;
    };

    let prev = state.prev.get(&event.sender).copied();
    if let Some(prev) = prev {
        let clock_diff = event.clock_ms.saturating_sub(prev.clock_ms);
        if clock_diff > 0 {
            let metal_rate =
                sanitize_rate((metal_total - prev.metal_total) * 1000.0 / clock_diff as f32);
            let energy_rate =
                sanitize_rate((energy_total - prev.energy_total) * 1000.0 / clock_diff as f32);
            if metal_rate > 1.0 || energy_rate > 1.0 {
                state.series.entry(event.sender).or_default().push(LiteSample {
                    clock_ms: event.clock_ms,
                    metal_rate,
                    energy_rate,
                });
            }
        }
    }

    state.prev.insert(
        event.sender,
        PrevSample {
            clock_ms: event.clock_ms,
            metal_total: *metal_total,
            energy_total: *energy_total,
        },
    );
}

/// Maps each sender to their ordered sample list, keyed by the supplied
/// player-name lookup (falling back to the sender number as text).
pub fn finish(
    state: &ScoreSeriesState,
    player_name: impl Fn(u8) -> Option<String>,
) -> std::collections::HashMap<String, Vec<LiteSample>> {
    state
        .series
        .iter()
        .map(|(sender, samples)| {
            let name = player_name(*sender).unwrap_or_else(|| sender.to_string());
            (name, samples.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_event(sender: u8, clock_ms: u64, metal_total: f32, energy_total: f32) -> Event {
        Event {
            sender,
            move_number: (clock_ms / 100) as u32,
            clock_ms,
            packet: Packet::Score {
                status: 0,
                kills: 0,
                losses: 0,
                com_kills: 0,
                com_losses: 0,
                metal_stored: 0.0,
                metal_storage: 0.0,
                metal_total,
                metal_excess: 0.0,
                energy_stored: 0.0,
                energy_storage: 0.0,
                energy_total,
                energy_excess: 0.0,
            },
        }
    }

    #[test]
    fn computes_rate_from_consecutive_samples() {
        let mut state = ScoreSeriesState::default();
        use_score_series_updates(&mut state, &score_event(1, 0, 0.0, 0.0));
        use_score_series_updates(&mut state, &score_event(1, 1000, 50.0, 20.0));
        let result = finish(&state, |_| Some("Alice".to_string()));
        let samples = &result["Alice"];
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].metal_rate, 50.0);
        assert_eq!(samples[0].energy_rate, 20.0);
    }

    #[test]
    fn drops_samples_with_both_rates_at_or_below_one() {
        let mut state = ScoreSeriesState::default();
        use_score_series_updates(&mut state, &score_event(1, 0, 0.0, 0.0));
        use_score_series_updates(&mut state, &score_event(1, 1000, 0.5, 0.5));
        let result = finish(&state, |_| Some("Alice".to_string()));
        assert!(!result.contains_key("Alice"));
    }
}
