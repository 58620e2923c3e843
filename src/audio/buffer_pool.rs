// Event queue - bounded lock-free hand-off from the audio source to the analysis thread
//
// The source callback (cpal thread, file reader thread or synthetic generator)
// is the single producer; the analysis thread is the single consumer. Both ends
// are `rtrb` SPSC ring buffers so neither side ever takes a lock.
//
// Flow:
// 1. Source pushes SourceEvent::Frame / SourceEvent::Encoded into the ring
// 2. Analysis thread pops events in arrival order
// 3. SourceEvent::EndOfStream tells the analysis thread the source is gone
//
// Overflow policy depends on the source: live callbacks cannot wait, so a full
// ring drops the newest event and counts it; file and synthetic sources block
// (with a short sleep) until the analysis thread catches up.

use rtrb::{Consumer, PopError, Producer, PushError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::frame::SourceEvent;

/// Default queue capacity in events
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Producer half handed to an [`AudioSource`](crate::audio::AudioSource).
pub struct SourceSink {
    producer: Producer<SourceEvent>,
    dropped: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

/// Consumer half owned by the analysis thread.
pub struct EventReceiver {
    consumer: Consumer<SourceEvent>,
    dropped: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
    capacity: usize,
}

/// Bounded SPSC queue of [`SourceEvent`]s.
pub struct EventQueue;

impl EventQueue {
    /// Create a queue holding at most `capacity` events.
    ///
    /// # Panics
    /// Panics if capacity is 0 (validated earlier by `CaptureConfig::validate`).
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize) -> (SourceSink, EventReceiver) {
        assert!(capacity > 0, "queue capacity must be greater than 0");

        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));

        (
            SourceSink {
                producer,
                dropped: Arc::clone(&dropped),
                cancelled: Arc::clone(&cancelled),
            },
            EventReceiver {
                consumer,
                dropped,
                cancelled,
                capacity,
            },
        )
    }
}

impl SourceSink {
    /// Non-blocking push for real-time callbacks. Returns false when the event
    /// was dropped because the ring is full.
    pub fn try_push(&mut self, event: SourceEvent) -> bool {
        match self.producer.push(event) {
            Ok(()) => true,
            Err(PushError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Blocking push for non-real-time sources. Gives up (returning false)
    /// once the consumer has been cancelled or dropped.
    pub fn push_blocking(&mut self, mut event: SourceEvent) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            match self.producer.push(event) {
                Ok(()) => return true,
                Err(PushError::Full(returned)) => {
                    event = returned;
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    /// True once the analysis side stopped listening.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.producer.is_abandoned()
    }
}

impl EventReceiver {
    pub fn pop(&mut self) -> Option<SourceEvent> {
        match self.consumer.pop() {
            Ok(event) => Some(event),
            Err(PopError::Empty) => None,
        }
    }

    /// True once the producer was dropped and the ring is drained.
    pub fn is_finished(&self) -> bool {
        self.consumer.is_abandoned() && self.consumer.is_empty()
    }

    /// Signal the producer to stop pushing; queued events remain poppable.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Events lost to overflow since creation.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue occupancy in percent.
    pub fn occupancy_percent(&self) -> f32 {
        (self.consumer.slots() as f32 / self.capacity as f32 * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::AudioFrame;

    fn frame(value: f32) -> SourceEvent {
        SourceEvent::Frame(AudioFrame::mono(vec![value; 4], 8_000))
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (mut sink, mut receiver) = EventQueue::new(4);
        assert!(sink.try_push(frame(0.1)));
        assert!(sink.try_push(SourceEvent::Encoded(vec![1, 2, 3])));
        assert!(sink.try_push(frame(0.2)));

        assert_eq!(receiver.pop(), Some(frame(0.1)));
        assert_eq!(receiver.pop(), Some(SourceEvent::Encoded(vec![1, 2, 3])));
        assert_eq!(receiver.pop(), Some(frame(0.2)));
        assert_eq!(receiver.pop(), None);
    }

    #[test]
    fn test_overflow_drops_newest_and_counts() {
        let (mut sink, mut receiver) = EventQueue::new(2);
        assert!(sink.try_push(frame(0.1)));
        assert!(sink.try_push(frame(0.2)));
        assert!(!sink.try_push(frame(0.3)));

        assert_eq!(receiver.dropped_events(), 1);
        assert_eq!(receiver.occupancy_percent(), 100.0);
        assert_eq!(receiver.pop(), Some(frame(0.1)));
        assert_eq!(receiver.pop(), Some(frame(0.2)));
    }

    #[test]
    fn test_blocking_push_gives_up_after_cancel() {
        let (mut sink, receiver) = EventQueue::new(1);
        assert!(sink.push_blocking(frame(0.1)));
        receiver.cancel();
        assert!(!sink.push_blocking(frame(0.2)));
    }

    #[test]
    fn test_finished_after_producer_dropped_and_drained() {
        let (mut sink, mut receiver) = EventQueue::new(2);
        sink.try_push(frame(0.1));
        drop(sink);

        assert!(!receiver.is_finished());
        assert!(receiver.pop().is_some());
        assert!(receiver.is_finished());
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SourceSink>();
        assert_send::<EventReceiver>();
    }

    #[test]
    #[should_panic(expected = "queue capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _ = EventQueue::new(0);
    }
}
