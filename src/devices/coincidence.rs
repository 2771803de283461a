//! Time-windowed coincidence detection for two-port interference devices.
//!
//! Arrivals are buffered until a flush time far enough after the latest
//! arrival that a partner on the other port could still show up. Every
//! new arrival can only push the flush later, never earlier.

use crate::core::types::SimTime;

/// Photon arrival held by a [`CoincidenceResolver`]
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonArrival<T> {
    pub time: SimTime,
    /// Timing uncertainty of the wave packet
    pub sigma: f64,
    /// Input port the photon arrived on
    pub port: &'static str,
    pub payload: T,
}

/// What a flush dispatch should do
#[derive(Debug, Clone, PartialEq)]
pub enum Flush<T> {
    /// Nothing buffered
    Idle,
    /// A later flush has been requested since this one was scheduled
    Stale { scheduled: SimTime },
    /// One arrival, no partner
    Single(PhotonArrival<T>),
    /// Cross-port pairs in buffer order, plus arrivals without a partner
    Coincidences {
        pairs: Vec<(PhotonArrival<T>, PhotonArrival<T>)>,
        unpaired: Vec<PhotonArrival<T>>,
    },
}

#[derive(Debug, Clone)]
pub struct CoincidenceResolver<T> {
    buffer: Vec<PhotonArrival<T>>,
    scheduled_flush: Option<SimTime>,
    flush_factor: f64,
}

impl<T: Clone> CoincidenceResolver<T> {
    pub const DEFAULT_FLUSH_FACTOR: f64 = 10.0;

    /// Resolver waiting `flush_factor * sigma^2` after each arrival
    pub fn new(flush_factor: f64) -> Self {
        Self {
            buffer: Vec::new(),
            scheduled_flush: None,
            flush_factor,
        }
    }

    /// Buffer `arrivals` received at `time`
    ///
    /// Returns the time a flush must be scheduled at, or `None` if the
    /// flush already pending is at least as late.
    pub fn receive(&mut self, time: SimTime, arrivals: Vec<PhotonArrival<T>>) -> Option<SimTime> {
        if arrivals.is_empty() {
            return None;
        }

        let delay = arrivals
            .iter()
            .map(|a| self.flush_factor * a.sigma * a.sigma)
            .fold(0.0, f64::max);
        self.buffer.extend(arrivals);

        let candidate = time + delay;
        match self.scheduled_flush {
            Some(scheduled) if candidate <= scheduled => None,
            _ => {
                self.scheduled_flush = Some(candidate);
                Some(candidate)
            }
        }
    }

    /// Drain the buffer at `now`
    pub fn flush(&mut self, now: SimTime) -> Flush<T> {
        if let Some(scheduled) = self.scheduled_flush {
            if now < scheduled {
                return Flush::Stale { scheduled };
            }
        }
        self.scheduled_flush = None;

        let mut buffer = std::mem::take(&mut self.buffer);
        match buffer.len() {
            0 => Flush::Idle,
            1 => match buffer.pop() {
                Some(arrival) => Flush::Single(arrival),
                None => Flush::Idle,
            },
            n => {
                let mut pairs = Vec::new();
                let mut paired = vec![false; n];
                for i in 0..n {
                    for j in (i + 1)..n {
                        if buffer[i].port != buffer[j].port {
                            pairs.push((buffer[i].clone(), buffer[j].clone()));
                            paired[i] = true;
                            paired[j] = true;
                        }
                    }
                }
                let unpaired = buffer
                    .into_iter()
                    .zip(paired)
                    .filter(|(_, p)| !p)
                    .map(|(a, _)| a)
                    .collect();
                Flush::Coincidences { pairs, unpaired }
            }
        }
    }

    pub fn buffered(&self) -> &[PhotonArrival<T>] {
        &self.buffer
    }

    pub fn scheduled_flush(&self) -> Option<SimTime> {
        self.scheduled_flush
    }

    pub fn flush_factor(&self) -> f64 {
        self.flush_factor
    }
}

impl<T: Clone> Default for CoincidenceResolver<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FLUSH_FACTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGMA: f64 = 1e-9;

    fn arrival(time: SimTime, port: &'static str, tag: u32) -> PhotonArrival<u32> {
        PhotonArrival {
            time,
            sigma: SIGMA,
            port,
            payload: tag,
        }
    }

    #[test]
    fn test_single_arrival_flushes_alone() {
        let mut resolver = CoincidenceResolver::default();
        let flush_at = resolver.receive(0.0, vec![arrival(0.0, "A", 1)]).unwrap();
        assert_eq!(flush_at, 10.0 * SIGMA * SIGMA);

        assert_eq!(resolver.flush(flush_at), Flush::Single(arrival(0.0, "A", 1)));
        assert!(resolver.buffered().is_empty());
        assert_eq!(resolver.scheduled_flush(), None);
    }

    #[test]
    fn test_later_arrival_extends_window() {
        let mut resolver = CoincidenceResolver::default();
        let first = resolver.receive(0.0, vec![arrival(0.0, "A", 1)]).unwrap();
        let second = resolver.receive(2e-9, vec![arrival(2e-9, "B", 2)]).unwrap();
        assert!(second >= 2e-9 + 10.0 * SIGMA * SIGMA);

        assert_eq!(resolver.flush(first), Flush::Stale { scheduled: second });
        assert_eq!(resolver.buffered().len(), 2, "Stale flush must keep the buffer");

        match resolver.flush(second) {
            Flush::Coincidences { pairs, unpaired } => {
                assert_eq!(pairs.len(), 1);
                assert_eq!(pairs[0].0.port, "A");
                assert_eq!(pairs[0].1.port, "B");
                assert_eq!((pairs[0].1.time - pairs[0].0.time).abs(), 2e-9);
                assert!(unpaired.is_empty());
            }
            other => panic!("Expected a coincidence, got {:?}", other),
        }
        assert!(resolver.buffered().is_empty());
    }

    #[test]
    fn test_earlier_candidate_does_not_reschedule() {
        let mut resolver = CoincidenceResolver::new(10.0);
        let wide = PhotonArrival {
            sigma: 1e-3,
            ..arrival(0.0, "A", 1)
        };
        let scheduled = resolver.receive(0.0, vec![wide]).unwrap();
        assert_eq!(resolver.receive(1e-9, vec![arrival(1e-9, "B", 2)]), None);
        assert_eq!(resolver.scheduled_flush(), Some(scheduled));
    }

    #[test]
    fn test_same_port_arrivals_never_pair() {
        let mut resolver = CoincidenceResolver::default();
        resolver.receive(0.0, vec![arrival(0.0, "A", 1)]);
        resolver.receive(0.0, vec![arrival(0.0, "A", 2)]);
        resolver.receive(0.0, vec![arrival(0.0, "B", 3)]);
        let flush_at = resolver.scheduled_flush().unwrap();

        match resolver.flush(flush_at) {
            Flush::Coincidences { pairs, unpaired } => {
                let tags: Vec<(u32, u32)> = pairs.iter().map(|(a, b)| (a.payload, b.payload)).collect();
                assert_eq!(tags, vec![(1, 3), (2, 3)]);
                assert!(unpaired.is_empty());
            }
            other => panic!("Expected coincidences, got {:?}", other),
        }

        resolver.receive(1.0, vec![arrival(1.0, "B", 4), arrival(1.0, "B", 5)]);
        let flush_at = resolver.scheduled_flush().unwrap();
        match resolver.flush(flush_at) {
            Flush::Coincidences { pairs, unpaired } => {
                assert!(pairs.is_empty());
                assert_eq!(unpaired.len(), 2);
            }
            other => panic!("Expected unpaired arrivals, got {:?}", other),
        }
    }

    #[test]
    fn test_flush_with_empty_buffer_is_idle() {
        let mut resolver: CoincidenceResolver<u32> = CoincidenceResolver::default();
        assert_eq!(resolver.receive(0.0, Vec::new()), None);
        assert_eq!(resolver.flush(0.0), Flush::Idle);
    }
}
