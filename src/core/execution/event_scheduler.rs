use super::event::{Event, EventFlags};
use crate::core::signals::Signal;
use crate::core::types::{DeviceId, EventId, SimTime};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
pub struct ScheduledEvent {
    pub time: OrderedFloat<SimTime>,
    pub sequence_num: u64,
    pub event: Event,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence_num == other.sequence_num
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.sequence_num.cmp(&self.sequence_num))
    }
}

/// Time-ordered event queue, FIFO among equal timestamps
pub struct EventScheduler {
    event_queue: BinaryHeap<ScheduledEvent>,
    sequence_counter: u64,
}

impl EventScheduler {
    /// Create a new EventScheduler
    pub fn new() -> Self {
        Self {
            event_queue: BinaryHeap::new(),
            sequence_counter: 0,
        }
    }

    /// Schedule an event at an absolute time; returns its id
    pub fn schedule_event(
        &mut self,
        time: SimTime,
        target: DeviceId,
        signals: Vec<(String, Signal)>,
        flags: EventFlags,
    ) -> EventId {
        let id = self.sequence_counter;
        let scheduled_event = ScheduledEvent {
            time: OrderedFloat(time),
            sequence_num: id,
            event: Event::new(id, time, target, signals, flags),
        };

        self.event_queue.push(scheduled_event);
        self.sequence_counter += 1;
        id
    }

    /// Remove and return the earliest event
    pub fn pop_next(&mut self) -> Option<Event> {
        self.event_queue.pop().map(|scheduled| scheduled.event)
    }

    /// Check if there are any events remaining in the queue
    pub fn has_events(&self) -> bool {
        !self.event_queue.is_empty()
    }

    /// Get the next event time without removing it
    pub fn peek_next_time(&self) -> Option<SimTime> {
        self.event_queue.peek().map(|event| event.time.into_inner())
    }

    pub fn len(&self) -> usize {
        self.event_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_queue.is_empty()
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_pop_in_time_then_fifo_order() {
        let mut scheduler = EventScheduler::new();
        let device = DeviceId::new();
        let ids: Vec<EventId> = [5.0, 3.0, 3.0, 7.0]
            .iter()
            .map(|&t| scheduler.schedule_event(t, device, Vec::new(), EventFlags::default()))
            .collect();

        let mut order = Vec::new();
        while let Some(event) = scheduler.pop_next() {
            order.push((event.time, event.id));
        }

        assert_eq!(
            order,
            vec![(3.0, ids[1]), (3.0, ids[2]), (5.0, ids[0]), (7.0, ids[3])],
            "Events should pop by time, ties in scheduling order"
        );
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut scheduler = EventScheduler::new();
        assert_eq!(scheduler.peek_next_time(), None);

        scheduler.schedule_event(2e-9, DeviceId::new(), Vec::new(), EventFlags::process_now());
        assert_eq!(scheduler.peek_next_time(), Some(2e-9));
        assert_eq!(scheduler.len(), 1);

        let event = scheduler.pop_next().unwrap();
        assert!(event.flags.process_now);
        assert!(!scheduler.has_events());
    }
}
