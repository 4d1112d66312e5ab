use std::collections::VecDeque;
use std::time::Instant;

use super::protocol::sequence_greater_than;

const ACK_WINDOW: u32 = 32;

#[derive(Debug, Clone)]
struct InFlight {
    sequence: u32,
    sent_at: Instant,
}

#[derive(Debug)]
pub struct AckTracker {
    in_flight: VecDeque<InFlight>,
    max_in_flight: usize,
    srtt_ms: f32,
    rtt_var_ms: f32,
}

impl AckTracker {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            in_flight: VecDeque::with_capacity(max_in_flight),
            max_in_flight,
            srtt_ms: 100.0,
            rtt_var_ms: 50.0,
        }
    }

    pub fn track(&mut self, sequence: u32, now: Instant) {
        while self.in_flight.len() >= self.max_in_flight {
            self.in_flight.pop_front();
        }
        self.in_flight.push_back(InFlight {
            sequence,
            sent_at: now,
        });
    }

    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32, now: Instant) -> Vec<u32> {
        let mut acked = Vec::new();
        let mut samples = Vec::new();

        self.in_flight.retain(|frame| {
            let covered = frame.sequence == ack
                || (sequence_greater_than(ack, frame.sequence) && {
                    let diff = ack.wrapping_sub(frame.sequence);
                    diff <= ACK_WINDOW && ack_bitfield & (1 << (diff - 1)) != 0
                });
            if covered {
                acked.push(frame.sequence);
                samples.push(now.duration_since(frame.sent_at).as_secs_f32() * 1000.0);
            }
            !covered
        });

        for rtt in samples {
            self.update_rtt(rtt);
        }
        acked
    }

    fn update_rtt(&mut self, rtt_ms: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let diff = (rtt_ms - self.srtt_ms).abs();
        self.rtt_var_ms = (1.0 - BETA) * self.rtt_var_ms + BETA * diff;
        self.srtt_ms = (1.0 - ALPHA) * self.srtt_ms + ALPHA * rtt_ms;
    }

    pub fn srtt_ms(&self) -> f32 {
        self.srtt_ms
    }

    pub fn rtt_var_ms(&self) -> f32 {
        self.rtt_var_ms
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[derive(Debug)]
pub struct ReceiveTracker {
    latest: Option<u32>,
    bitfield: u32,
    recent: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            latest: None,
            bitfield: 0,
            recent: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    pub fn record(&mut self, sequence: u32) -> bool {
        if self.recent.contains(&sequence) {
            return false;
        }
        if self.recent.len() >= self.max_recent {
            self.recent.pop_front();
        }
        self.recent.push_back(sequence);

        match self.latest {
            None => {
                self.latest = Some(sequence);
            }
            Some(latest) if sequence_greater_than(sequence, latest) => {
                let diff = sequence.wrapping_sub(latest);
                self.bitfield = if diff <= ACK_WINDOW {
                    // The old latest becomes bit diff-1.
                    self.bitfield.checked_shl(diff).unwrap_or(0) | (1 << (diff - 1))
                } else {
                    0
                };
                self.latest = Some(sequence);
            }
            Some(latest) => {
                let diff = latest.wrapping_sub(sequence);
                if diff > 0 && diff <= ACK_WINDOW {
                    self.bitfield |= 1 << (diff - 1);
                }
            }
        }
        true
    }

    pub fn ack_data(&self) -> Option<(u32, u32)> {
        self.latest.map(|latest| (latest, self.bitfield))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_receive_tracker_bitfield() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(1);
        tracker.record(2);
        tracker.record(3);

        assert_eq!(tracker.ack_data(), Some((3, 0b11)));
    }

    #[test]
    fn test_receive_tracker_out_of_order() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(3);
        tracker.record(1);
        tracker.record(2);

        assert_eq!(tracker.ack_data(), Some((3, 0b11)));
    }

    #[test]
    fn test_duplicate_detection() {
        let mut tracker = ReceiveTracker::new();
        assert!(tracker.record(0));
        assert!(!tracker.record(0));
        assert!(tracker.record(1));
        assert_eq!(tracker.ack_data(), Some((1, 0b1)));
    }

    #[test]
    fn nothing_received_means_no_ack() {
        assert_eq!(ReceiveTracker::new().ack_data(), None);
    }

    #[test]
    fn test_ack_tracker_covers_bitfield() {
        let mut tracker = AckTracker::new(32);
        let start = Instant::now();
        for seq in 0..4 {
            tracker.track(seq, start);
        }

        let later = start + Duration::from_millis(40);
        let mut acked = tracker.process_ack(3, 0b010, later);
        acked.sort_unstable();
        assert_eq!(acked, vec![1, 3]);
        assert_eq!(tracker.in_flight(), 2);
        assert!(tracker.srtt_ms() < 100.0);
    }
}
