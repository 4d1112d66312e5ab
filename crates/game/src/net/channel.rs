use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::protocol::{Frame, FrameFlags, FrameHeader, MAX_PAYLOAD_SIZE, sequence_greater_than};
use super::tracking::{AckTracker, ReceiveTracker};
use crate::error::TransportError;

const MAX_IN_FLIGHT: usize = 256;

#[derive(Debug)]
struct UnackedReliable {
    reliable_id: u32,
    payload: Vec<u8>,
    frame_sequence: u32,
    sent_at: Instant,
}

/// Per-peer sequencing. Reliable payloads are resent under fresh frame
/// sequences until acked and released to the receiver strictly in order;
/// unreliable payloads are framed once and forgotten.
///
/// Frame sequence 0 is never sent, so an ack of 0 means "nothing received".
#[derive(Debug)]
pub struct PeerChannel {
    send_sequence: u32,
    next_reliable_id: u32,
    unacked: Vec<UnackedReliable>,
    acks: AckTracker,
    received: ReceiveTracker,
    next_expected_reliable: u32,
    held: BTreeMap<u32, Vec<u8>>,
    ack_owed: bool,
    resend_after: Duration,
}

impl PeerChannel {
    pub fn new(resend_after: Duration) -> Self {
        Self {
            send_sequence: 1,
            next_reliable_id: 0,
            unacked: Vec::new(),
            acks: AckTracker::new(MAX_IN_FLIGHT),
            received: ReceiveTracker::new(),
            next_expected_reliable: 0,
            held: BTreeMap::new(),
            ack_owed: false,
            resend_after,
        }
    }

    fn next_header(&mut self, now: Instant) -> FrameHeader {
        let sequence = self.send_sequence;
        self.send_sequence = match self.send_sequence.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        self.acks.track(sequence, now);
        self.ack_owed = false;

        let (ack, ack_bitfield) = self.received.ack_data().unwrap_or((0, 0));
        FrameHeader::new(FrameFlags::empty(), sequence, ack, ack_bitfield)
    }

    pub fn reliable(&mut self, payload: Vec<u8>, now: Instant) -> Result<Vec<u8>, TransportError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }

        let reliable_id = self.next_reliable_id;
        self.next_reliable_id = self.next_reliable_id.wrapping_add(1);

        let header = self.next_header(now);
        let frame = Frame {
            header,
            reliable_id: Some(reliable_id),
            payload,
        };
        let bytes = frame.encode()?;

        self.unacked.push(UnackedReliable {
            reliable_id,
            payload: frame.payload,
            frame_sequence: header.sequence,
            sent_at: now,
        });
        Ok(bytes)
    }

    pub fn unreliable(&mut self, payload: &[u8], now: Instant) -> Result<Vec<u8>, TransportError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }
        let frame = Frame {
            header: self.next_header(now),
            reliable_id: None,
            payload: payload.to_vec(),
        };
        frame.encode()
    }

    pub fn ack_frame(&mut self, now: Instant) -> Option<Vec<u8>> {
        if !self.ack_owed {
            return None;
        }
        self.unreliable(&[], now).ok()
    }

    pub fn resend_due(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        for i in 0..self.unacked.len() {
            if now.duration_since(self.unacked[i].sent_at) < self.resend_after {
                continue;
            }
            let header = self.next_header(now);
            let pending = &mut self.unacked[i];
            pending.frame_sequence = header.sequence;
            pending.sent_at = now;

            let frame = Frame {
                header,
                reliable_id: Some(pending.reliable_id),
                payload: pending.payload.clone(),
            };
            match frame.encode() {
                Ok(bytes) => frames.push(bytes),
                Err(e) => log::error!("Dropping reliable message {}: {}", pending.reliable_id, e),
            }
        }
        frames
    }

    pub fn receive(&mut self, frame: Frame, now: Instant) -> Vec<Vec<u8>> {
        let header = frame.header;
        if header.ack != 0 {
            let acked = self.acks.process_ack(header.ack, header.ack_bitfield, now);
            if !acked.is_empty() {
                self.unacked
                    .retain(|pending| !acked.contains(&pending.frame_sequence));
            }
        }

        if !self.received.record(header.sequence) {
            return Vec::new();
        }
        self.ack_owed = true;

        let Some(reliable_id) = frame.reliable_id else {
            if frame.payload.is_empty() {
                return Vec::new();
            }
            return vec![frame.payload];
        };

        if sequence_greater_than(self.next_expected_reliable, reliable_id) {
            // Resent copy of something already delivered.
            return Vec::new();
        }
        self.held.insert(reliable_id, frame.payload);

        let mut released = Vec::new();
        while let Some(payload) = self.held.remove(&self.next_expected_reliable) {
            released.push(payload);
            self.next_expected_reliable = self.next_expected_reliable.wrapping_add(1);
        }
        released
    }

    pub fn unacked_count(&self) -> usize {
        self.unacked.len()
    }

    pub fn srtt_ms(&self) -> f32 {
        self.acks.srtt_ms()
    }
}
