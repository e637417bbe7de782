//! FIFO hand-off between the voice worker (single producer) and the game loop
//! (single consumer). Neither side ever blocks.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// What happened to an item handed to [`CommandProducer::push`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after discarding the oldest pending item to make room.
    Evicted,
    /// The consumer is gone; the item was discarded.
    Disconnected,
}

struct Shared {
    dropped: AtomicUsize,
    consumer_closed: AtomicBool,
}

/// Producer half. Not `Clone`: the queue has exactly one producer.
pub struct CommandProducer<T> {
    sender: Sender<T>,
    // Lets the producer evict the stalest entry when the consumer falls behind.
    evictor: Receiver<T>,
    shared: Arc<Shared>,
}

/// Consumer half, owned by the game loop.
pub struct CommandConsumer<T> {
    receiver: Receiver<T>,
    shared: Arc<Shared>,
}

/// Build a bounded queue holding at most `capacity` pending items.
pub fn command_queue<T>(capacity: usize) -> (CommandProducer<T>, CommandConsumer<T>) {
    let (sender, receiver) = bounded(capacity.max(1));
    let shared = Arc::new(Shared {
        dropped: AtomicUsize::new(0),
        consumer_closed: AtomicBool::new(false),
    });
    (
        CommandProducer {
            sender,
            evictor: receiver.clone(),
            shared: shared.clone(),
        },
        CommandConsumer { receiver, shared },
    )
}

impl<T> CommandProducer<T> {
    /// Enqueue without blocking. A full queue drops its oldest item first so the
    /// most recent command always gets through.
    pub fn push(&self, item: T) -> PushOutcome {
        if self.shared.consumer_closed.load(Ordering::Acquire) {
            return PushOutcome::Disconnected;
        }
        let mut pending = item;
        let mut evicted = false;
        loop {
            match self.sender.try_send(pending) {
                Ok(()) => {
                    return if evicted {
                        PushOutcome::Evicted
                    } else {
                        PushOutcome::Queued
                    };
                }
                // `evictor` keeps the channel connected, so a failed send means full.
                Err(full) => {
                    if self.evictor.try_recv().is_ok() {
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                        evicted = true;
                    }
                    pending = full.into_inner();
                }
            }
        }
    }
}

impl<T> CommandConsumer<T> {
    /// Pop the oldest pending item, if any.
    pub fn try_pop(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Take everything pending right now, oldest first.
    pub fn try_pop_all(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Items discarded because the queue was full.
    pub fn dropped(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Drop for CommandConsumer<T> {
    fn drop(&mut self) {
        self.shared.consumer_closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn drains_in_push_order() {
        let (tx, rx) = command_queue(8);
        for item in ["a", "b", "c"] {
            assert_eq!(tx.push(item), PushOutcome::Queued);
        }
        assert_eq!(rx.try_pop_all(), vec!["a", "b", "c"]);
        assert!(rx.try_pop_all().is_empty());
    }

    #[test]
    fn try_pop_returns_none_when_empty() {
        let (tx, rx) = command_queue::<u32>(4);
        assert_eq!(rx.try_pop(), None);
        tx.push(7);
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_pop(), Some(7));
        assert_eq!(rx.try_pop(), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn full_queue_evicts_oldest() {
        let (tx, rx) = command_queue(2);
        assert_eq!(tx.push(1), PushOutcome::Queued);
        assert_eq!(tx.push(2), PushOutcome::Queued);
        assert_eq!(tx.push(3), PushOutcome::Evicted);
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.try_pop_all(), vec![2, 3]);
    }

    #[test]
    fn push_reports_disconnect_after_consumer_drops() {
        let (tx, rx) = command_queue(2);
        assert_eq!(tx.push("early"), PushOutcome::Queued);
        drop(rx);
        assert_eq!(tx.push("late"), PushOutcome::Disconnected);
    }

    #[test]
    fn queue_stays_connected_while_consumer_lives() {
        let (tx, rx) = command_queue(1);
        for i in 0..10 {
            assert_ne!(tx.push(i), PushOutcome::Disconnected);
        }
        assert_eq!(rx.dropped(), 9);
        assert_eq!(rx.try_pop_all(), vec![9]);
    }

    #[test]
    fn fifo_holds_across_threads() {
        let (tx, rx) = command_queue(1024);
        let producer = thread::spawn(move || {
            for i in 0..500u32 {
                tx.push(i);
            }
        });
        producer.join().expect("producer thread");
        let drained = rx.try_pop_all();
        assert_eq!(drained, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn pops_return_immediately_while_producer_is_idle() {
        let (tx, rx) = command_queue::<String>(4);
        let idle = thread::spawn(move || {
            // Hold the producer open without pushing, like a worker mid-listen.
            thread::sleep(Duration::from_millis(200));
            drop(tx);
        });
        let started = Instant::now();
        for _ in 0..100 {
            assert!(rx.try_pop_all().is_empty());
            assert!(rx.try_pop().is_none());
        }
        assert!(started.elapsed() < Duration::from_millis(100));
        idle.join().expect("idle producer");
    }
}
