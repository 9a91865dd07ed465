// src/observable.rs
//! Live values: one current value plus change notification to subscribers.
//!
//! `Cell` is the publishing side, `Watch` a plain subscription, and `Mapped` /
//! `Combined` are derived values recomputed from their inputs on every read.
//! Nothing derived is cached, so a derived value can never disagree with
//! its sources.

use std::sync::Arc;
use tokio::sync::watch;

pub struct Cell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Cell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Cell { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Reads the current value in place, without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Replaces the value and notifies every subscriber.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutates the value in place and notifies every subscriber.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub fn subscribe(&self) -> Watch<T> {
        Watch { rx: self.tx.subscribe() }
    }
}

#[derive(Clone)]
pub struct Watch<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Watch<T> {
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Waits for the next published value. `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.get())
    }
}

impl<T> Watch<T> {
    pub fn map<U, F>(self, project: F) -> Mapped<T, U>
    where
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        Mapped {
            source: self.rx,
            project: Arc::new(project),
        }
    }

    pub fn combine<B, U, F>(self, other: Watch<B>, combine: F) -> Combined<T, B, U>
    where
        F: Fn(&T, &B) -> U + Send + Sync + 'static,
    {
        Combined {
            left: self.rx,
            right: other.rx,
            left_closed: false,
            right_closed: false,
            combine: Arc::new(combine),
        }
    }
}

/// Projection of a single source.
pub struct Mapped<S, T> {
    source: watch::Receiver<S>,
    project: Arc<dyn Fn(&S) -> T + Send + Sync>,
}

impl<S, T> Clone for Mapped<S, T> {
    fn clone(&self) -> Self {
        Mapped {
            source: self.source.clone(),
            project: Arc::clone(&self.project),
        }
    }
}

impl<S, T> Mapped<S, T> {
    pub fn get(&self) -> T {
        let source = self.source.borrow();
        (self.project)(&*source)
    }

    pub async fn changed(&mut self) -> Option<T> {
        self.source.changed().await.ok()?;
        Some(self.get())
    }
}

/// Deterministic combination of two sources, recomputed when either changes.
pub struct Combined<A, B, T> {
    left: watch::Receiver<A>,
    right: watch::Receiver<B>,
    left_closed: bool,
    right_closed: bool,
    combine: Arc<dyn Fn(&A, &B) -> T + Send + Sync>,
}

impl<A, B, T> Combined<A, B, T> {
    pub fn get(&self) -> T {
        let left = self.left.borrow();
        let right = self.right.borrow();
        (self.combine)(&*left, &*right)
    }

    /// Waits until either input publishes. `None` once both publishers are gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            let (from_left, result) = tokio::select! {
                r = self.left.changed(), if !self.left_closed => (true, r),
                r = self.right.changed(), if !self.right_closed => (false, r),
                else => return None,
            };
            match result {
                Ok(()) => return Some(self.get()),
                Err(_) if from_left => self.left_closed = true,
                Err(_) => self.right_closed = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watch_sees_updates() {
        let cell = Cell::new(1);
        let mut watch = cell.subscribe();
        assert_eq!(watch.get(), 1);
        cell.set(2);
        assert_eq!(watch.changed().await, Some(2));
        cell.update(|v| *v += 5);
        assert_eq!(watch.changed().await, Some(7));
    }

    #[test]
    fn test_with_reads_current_value() {
        let cell = Cell::new(vec![1, 2, 3]);
        assert_eq!(cell.with(|v| v.len()), 3);
        cell.update(|v| v.clear());
        assert!(cell.with(|v| v.is_empty()));
    }

    #[tokio::test]
    async fn test_watch_ends_when_publisher_dropped() {
        let cell = Cell::new("a".to_string());
        let mut watch = cell.subscribe();
        drop(cell);
        assert_eq!(watch.changed().await, None);
        assert_eq!(watch.get(), "a");
    }

    #[tokio::test]
    async fn test_mapped_recomputes() {
        let cell = Cell::new(vec![1, 2, 3]);
        let mut sum = cell.subscribe().map(|v: &Vec<i32>| v.iter().sum::<i32>());
        assert_eq!(sum.get(), 6);
        cell.update(|v| v.push(4));
        assert_eq!(sum.changed().await, Some(10));
    }

    #[tokio::test]
    async fn test_combined_reacts_to_either_input() {
        let items = Cell::new(vec!["apple".to_string(), "banana".to_string()]);
        let query = Cell::new(String::new());
        let mut filtered = items.subscribe().combine(query.subscribe(), |items: &Vec<String>, q: &String| {
            items.iter().filter(|i| i.contains(q.as_str())).cloned().collect::<Vec<_>>()
        });
        assert_eq!(filtered.get().len(), 2);

        query.set("ban".to_string());
        assert_eq!(filtered.changed().await, Some(vec!["banana".to_string()]));

        items.update(|v| v.push("bandana".to_string()));
        assert_eq!(filtered.changed().await.map(|v| v.len()), Some(2));
    }

    #[tokio::test]
    async fn test_combined_survives_one_closed_input() {
        let left = Cell::new(1);
        let right = Cell::new(10);
        let mut total = left.subscribe().combine(right.subscribe(), |a: &i32, b: &i32| a + b);
        drop(left);
        right.set(20);
        assert_eq!(total.changed().await, Some(21));
        drop(right);
        assert_eq!(total.changed().await, None);
    }
}
