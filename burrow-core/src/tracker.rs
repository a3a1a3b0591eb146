//! Pending-work accounting.
//!
//! Every message that enters a pipeline queue carries a [`Ticket`]. The
//! ticket is taken when the message is enqueued and released when the
//! message is dropped, whichever path drops it. The run is finished when no
//! tickets are outstanding.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct WorkTracker {
    inner: Arc<Inner>,
}

impl WorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one new unit of work.
    pub fn ticket(&self) -> Ticket {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        Ticket {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Resolve once the outstanding ticket count is zero.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the load and the
            // await cannot be missed.
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One outstanding unit of work. Released on drop.
#[derive(Debug)]
pub struct Ticket {
    inner: Arc<Inner>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// A queued message together with the ticket that accounts for it.
#[derive(Debug)]
pub struct Tracked<T> {
    item: T,
    ticket: Ticket,
}

impl<T> Tracked<T> {
    pub fn into_parts(self) -> (T, Ticket) {
        (self.item, self.ticket)
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

#[derive(Debug)]
enum Sender<T> {
    Bounded(mpsc::Sender<Tracked<T>>),
    Unbounded(mpsc::UnboundedSender<Tracked<T>>),
}

/// Sending half of a tracked pipeline queue.
#[derive(Debug)]
pub struct Queue<T> {
    tx: Sender<T>,
    tracker: WorkTracker,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        let tx = match &self.tx {
            Sender::Bounded(tx) => Sender::Bounded(tx.clone()),
            Sender::Unbounded(tx) => Sender::Unbounded(tx.clone()),
        };
        Self {
            tx,
            tracker: self.tracker.clone(),
        }
    }
}

impl<T> Queue<T> {
    /// Enqueue `item`, waiting for capacity on a bounded queue. Returns
    /// `false` if the receiver is gone, in which case the work is already
    /// released.
    pub async fn push(&self, item: T) -> bool {
        let tracked = Tracked {
            item,
            ticket: self.tracker.ticket(),
        };
        match &self.tx {
            Sender::Bounded(tx) => tx.send(tracked).await.is_ok(),
            Sender::Unbounded(tx) => tx.send(tracked).is_ok(),
        }
    }
}

pub fn queue<T>(capacity: usize, tracker: &WorkTracker) -> (Queue<T>, mpsc::Receiver<Tracked<T>>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Queue {
            tx: Sender::Bounded(tx),
            tracker: tracker.clone(),
        },
        rx,
    )
}

/// A queue whose pushes never wait. Used where the consumer also feeds a
/// bounded queue the producer depends on.
pub fn unbounded_queue<T>(
    tracker: &WorkTracker,
) -> (Queue<T>, mpsc::UnboundedReceiver<Tracked<T>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Queue {
            tx: Sender::Unbounded(tx),
            tracker: tracker.clone(),
        },
        rx,
    )
}
