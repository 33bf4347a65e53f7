//! The event every reducer consumes: a decoded sub-packet plus the tick
//! clock and move metadata it arrived with.

use decoder::Packet;

#[derive(Debug, Clone)]
pub struct Event {
    pub sender: u8,
    pub move_number: u32,
    pub clock_ms: u64,
    pub packet: Packet,
}
