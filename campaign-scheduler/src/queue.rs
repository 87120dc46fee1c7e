//! A single-producer-tracked-depth multiple-producer, single-consumer
//! queue: workers push completed results, a logger consumes them. Both
//! sides share an `in_queue` counter so the scheduler's submission gate
//! can see how many completed results are waiting to be archived without
//! needing the consumer to report back explicitly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

pub struct BoundedSender<T> {
    inner: mpsc::Sender<T>,
    in_queue: Arc<AtomicUsize>,
}

impl<T> Clone for BoundedSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            in_queue: Arc::clone(&self.in_queue),
        }
    }
}

impl<T> BoundedSender<T> {
    pub fn send(&self, value: T) -> Result<(), mpsc::SendError<T>> {
        self.in_queue.fetch_add(1, Ordering::SeqCst);
        self.inner.send(value).map_err(|err| {
            self.in_queue.fetch_sub(1, Ordering::SeqCst);
            err
        })
    }

    pub fn len(&self) -> usize {
        self.in_queue.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct BoundedReceiver<T> {
    inner: mpsc::Receiver<T>,
    in_queue: Arc<AtomicUsize>,
}

impl<T> BoundedReceiver<T> {
    pub fn recv(&self) -> Result<T, mpsc::RecvError> {
        let value = self.inner.recv()?;
        self.in_queue.fetch_sub(1, Ordering::SeqCst);
        Ok(value)
    }

    pub fn try_recv(&self) -> Result<T, mpsc::TryRecvError> {
        let value = self.inner.try_recv()?;
        self.in_queue.fetch_sub(1, Ordering::SeqCst);
        Ok(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }
}

pub fn bounded_channel<T>() -> (BoundedSender<T>, BoundedReceiver<T>) {
    let (inner_tx, inner_rx) = mpsc::channel();
    let in_queue = Arc::new(AtomicUsize::new(0));
    (
        BoundedSender {
            inner: inner_tx,
            in_queue: Arc::clone(&in_queue),
        },
        BoundedReceiver { inner: inner_rx, in_queue },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_tracks_unconsumed_results() {
        let (tx, rx) = bounded_channel::<u32>();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(tx.len(), 2);
        rx.recv().unwrap();
        assert_eq!(tx.len(), 1);
    }
}
