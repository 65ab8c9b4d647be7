//! The reliable-delivery bookkeeping layered on top of the outer
//! frame codec: outbound id allocation, the in-flight ack table, and
//! keep-alive pinger deferral (§4.4).

use crate::errors::*;
use fnv::FnvHashMap;
use std::time::Instant;

/// A pending outbound reliable frame, waiting for its ack.
struct InFlight {
    sent_at: Instant,
    on_ack: Option<Box<dyn FnOnce(u32) + Send>>,
}

/// Tracks outbound reliable ids and their ack callbacks, and when the
/// keep-alive pinger should next fire.
pub struct Reliability {
    next_id: u16,
    in_flight: FnvHashMap<u16, InFlight>,
    pinger_deadline: Instant,
    keep_alive_timeout: std::time::Duration,
}

impl Reliability {
    /// Creates a fresh reliability tracker; the first allocated id is 1.
    pub fn new(keep_alive_timeout: std::time::Duration) -> Reliability {
        Reliability {
            next_id: 1,
            in_flight: FnvHashMap::default(),
            pinger_deadline: Instant::now() + keep_alive_timeout,
            keep_alive_timeout,
        }
    }

    /// Allocates the next outbound reliable id. Ids are monotonic
    /// starting from 1; wrapping past `u16::max_value()` is treated as
    /// an unrecoverable session error rather than silently wrapping,
    /// since a wrapped id could collide with one still in flight.
    pub fn next_id(&mut self) -> Result<u16> {
        if self.next_id == 0 {
            return Err(ErrorKind::ReliableIdOverflow.into());
        }
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(0);
        Ok(id)
    }

    /// Records a sent reliable frame awaiting ack. `on_ack`, if given,
    /// is invoked with the round-trip latency in milliseconds once the
    /// matching `Ack` arrives.
    pub fn track(&mut self, id: u16, on_ack: Option<Box<dyn FnOnce(u32) + Send>>) {
        self.in_flight.insert(
            id,
            InFlight {
                sent_at: Instant::now(),
                on_ack,
            },
        );
    }

    /// Processes an inbound `Ack`. Invokes and removes the matching
    /// in-flight record if one exists; an ack for an unknown id
    /// (duplicate, or arriving post-disconnect) is silently ignored,
    /// per §4.4.
    pub fn handle_ack(&mut self, id: u16) {
        if let Some(entry) = self.in_flight.remove(&id) {
            if let Some(cb) = entry.on_ack {
                let latency_ms = Self::latency_ms(entry.sent_at);
                cb(latency_ms);
            }
        }
    }

    fn latency_ms(sent_at: Instant) -> u32 {
        let elapsed = sent_at.elapsed().as_secs_f64();
        (elapsed * 1000.0).round().max(1.0) as u32
    }

    /// The number of reliable frames still awaiting ack.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Pushes the pinger's next scheduled send out by `keep_alive_timeout`,
    /// called whenever a reliable frame other than Ping/Ack is sent.
    pub fn defer_pinger(&mut self) {
        self.pinger_deadline = Instant::now() + self.keep_alive_timeout;
    }

    /// Whether the pinger should fire a `Ping` now.
    pub fn pinger_due(&self) -> bool {
        Instant::now() >= self.pinger_deadline
    }

    /// Marks that a `Ping` was just sent, scheduling the next one.
    pub fn mark_ping_sent(&mut self) {
        self.pinger_deadline = Instant::now() + self.keep_alive_timeout;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_ids_are_monotonic_from_one() {
        let mut r = Reliability::new(Duration::from_millis(1000));
        assert_eq!(r.next_id().unwrap(), 1);
        assert_eq!(r.next_id().unwrap(), 2);
        assert_eq!(r.next_id().unwrap(), 3);
    }

    #[test]
    fn test_ack_invokes_callback_once() {
        let mut r = Reliability::new(Duration::from_millis(1000));
        let id = r.next_id().unwrap();
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        r.track(id, Some(Box::new(move |_latency| {
            hits2.fetch_add(1, Ordering::SeqCst);
        })));
        assert_eq!(r.in_flight_count(), 1);
        r.handle_ack(id);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(r.in_flight_count(), 0);

        // A duplicate/unknown ack is silently ignored.
        r.handle_ack(id);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_defer_pinger_pushes_deadline_out() {
        let mut r = Reliability::new(Duration::from_millis(20));
        assert!(!r.pinger_due());
        std::thread::sleep(Duration::from_millis(30));
        assert!(r.pinger_due());
        r.defer_pinger();
        assert!(!r.pinger_due());
    }
}
