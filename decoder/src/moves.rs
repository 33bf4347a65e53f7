//! Move-region reader: counts moves on a first pass, then replays them
//! into sub-packet records on a second.

use byteorder::{ByteOrder, LittleEndian};

use crate::bitstream::{lz77_decompress, split_all};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// One length-prefixed record from the move region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move<'a> {
    pub time_delta_ms: u16,
    pub sender: u8,
    pub payload: &'a [u8],
}

fn read_move<'a>(input: &'a [u8]) -> Result<(Move<'a>, &'a [u8])> {
    if input.len() < 2 {
        return Err(Error::TruncatedReplay);
    }
    let len = LittleEndian::read_u16(&input[0..2]) as usize;
    let rest = &input[2..];
    if rest.len() < len {
        return Err(Error::TruncatedReplay);
    }
    let body = &rest[..len];
    if body.len() < 3 {
        return Err(Error::TruncatedReplay);
    }
    let time_delta_ms = LittleEndian::read_u16(&body[0..2]);
    let sender = body[2];
    let payload = &body[3..];
    Ok((
        Move {
            time_delta_ms,
            sender,
            payload,
        },
        &rest[len..],
    ))
}

/// Result of the first pass: total move count and, per sender, the move
/// number in which they were last observed (seed value for time-to-die).
#[derive(Debug, Clone, Default)]
pub struct MoveCensus {
    pub total_moves: u32,
    pub last_seen_move: [u32; 11],
}

pub fn count_moves(mut input: &[u8]) -> MoveCensus {
    let mut census = MoveCensus::default();
    let mut move_number = 0u32;
    while let Ok((mv, rest)) = read_move(input) {
        move_number += 1;
        if (mv.sender as usize) < census.last_seen_move.len() {
            census.last_seen_move[mv.sender as usize] = move_number;
        }
        input = rest;
    }
    census.total_moves = move_number;
    census
}

/// A fully decoded sub-packet, tagged with its originating move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRec {
    pub time_delta: u16,
    pub sender: u8,
    pub move_number: u32,
    pub body: Vec<u8>,
}

/// Replays the move region, injecting the duplicate-marker prefix the
/// wire format expects and splitting each move's payload into
/// sub-packets.
pub struct MoveReader<'a> {
    input: &'a [u8],
    move_number: u32,
    cancelled: Option<CancellationToken>,
}

impl<'a> MoveReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        MoveReader {
            input,
            move_number: 0,
            cancelled: None,
        }
    }

    pub fn with_cancellation(input: &'a [u8], token: CancellationToken) -> Self {
        MoveReader {
            input,
            move_number: 0,
            cancelled: Some(token),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
    }
}

/// If `payload` is LZ77-compressed (`payload[0] == 0x04`), decompresses it
/// into a buffer led by a synthesized `0x03` first, per §4.1 — so that, in
/// either case, the buffer handed to the injection step looks like a
/// normal uncompressed move payload.
fn uncompressed_payload(payload: &[u8]) -> Option<Vec<u8>> {
    match payload.first()? {
        0x04 => {
            let prefix_end = 2.min(payload.len());
            Some(lz77_decompress(&payload[1..prefix_end], &payload[prefix_end..]))
        }
        _ => Some(payload.to_vec()),
    }
}

/// Builds the injected buffer `{payload[0], 'c', 'c', 0xFF,0xFF,0xFF,0xFF,
/// payload[1..]}` and splits the sub-packets starting at offset 7.
fn packets_for_move(payload: &[u8]) -> Vec<Vec<u8>> {
    let Some(payload) = uncompressed_payload(payload) else {
        return Vec::new();
    };
    if payload.is_empty() {
        return Vec::new();
    }
    let mut injected = Vec::with_capacity(payload.len() + 6);
    injected.push(payload[0]);
    injected.push(b'c');
    injected.push(b'c');
    injected.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
    injected.extend_from_slice(&payload[1..]);
    split_all(&injected[7..])
        .into_iter()
        .map(|s| s.to_vec())
        .collect()
}

impl<'a> Iterator for MoveReader<'a> {
    type Item = Result<Vec<PacketRec>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_cancelled() {
            return Some(Err(Error::CancelRequested));
        }
        if self.input.is_empty() {
            return None;
        }
        let (mv, rest) = match read_move(self.input) {
            Ok(v) => v,
            Err(_) => return None,
        };
        self.input = rest;
        self.move_number += 1;

        let recs = packets_for_move(mv.payload)
            .into_iter()
            .map(|body| PacketRec {
                time_delta: mv.time_delta_ms,
                sender: mv.sender,
                move_number: self.move_number,
                body,
            })
            .collect();
        Some(Ok(recs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_move(time_delta: u16, sender: u8, payload: &[u8]) -> Vec<u8> {
        let body_len = 3 + payload.len();
        let mut out = (body_len as u16).to_le_bytes().to_vec();
        out.extend_from_slice(&time_delta.to_le_bytes());
        out.push(sender);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn count_moves_counts_and_tracks_last_sender_seen() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&encode_move(10, 1, &[0x06]));
        buf.extend_from_slice(&encode_move(20, 2, &[0x06]));
        buf.extend_from_slice(&encode_move(30, 1, &[0x06]));
        let census = count_moves(&buf);
        assert_eq!(census.total_moves, 3);
        assert_eq!(census.last_seen_move[1], 3);
        assert_eq!(census.last_seen_move[2], 2);
    }

    #[test]
    fn move_reader_yields_one_batch_per_move_with_move_number() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&encode_move(10, 1, &[0x03, 0x11, 0, 0, 0]));
        let reader = MoveReader::new(&buf);
        let batches: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(batches.len(), 1);
        for rec in &batches[0] {
            assert_eq!(rec.move_number, 1);
            assert_eq!(rec.sender, 1);
            assert_eq!(rec.time_delta, 10);
        }
    }

    #[test]
    fn lz77_compressed_move_payload_is_decompressed_before_splitting() {
        // {0x04, prefix=0x11, tag=0x00 (3 literal bits), literals 0,0,0}
        // decompresses to {0x03, 0x11, 0, 0, 0}; after injection the
        // sub-packet stream is decoded[1..] == {0x11, 0, 0, 0}, a
        // well-formed UnitStateChange sub-packet (static length 4).
        let payload = vec![0x04, 0x11, 0x00, 0, 0, 0];
        let buf = encode_move(5, 1, &payload);
        let reader = MoveReader::new(&buf);
        let batches: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].body, vec![0x11, 0, 0, 0]);
    }

    #[test]
    fn move_reader_stops_on_cancellation() {
        let buf = encode_move(10, 1, &[0x06]);
        let token = CancellationToken::new();
        token.cancel();
        let mut reader = MoveReader::with_cancellation(&buf, token);
        assert!(matches!(reader.next(), Some(Err(Error::CancelRequested))));
    }
}
