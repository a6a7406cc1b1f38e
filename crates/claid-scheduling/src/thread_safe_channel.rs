// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::{Result, SchedulingError};

struct ChannelState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Closable FIFO shared between threads.
///
/// With a maximum size the oldest item is dropped to make room. Readers block
/// until an item arrives or the channel is closed; a closed channel still
/// hands out what it holds before reporting the end.
pub struct ThreadSafeChannel<T> {
    name: String,
    max_size: Option<usize>,
    state: Mutex<ChannelState<T>>,
    available: Condvar,
}

impl<T> ThreadSafeChannel<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_size: None,
            state: Mutex::new(ChannelState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn with_max_size(name: impl Into<String>, max_size: usize) -> Self {
        Self {
            max_size: Some(max_size.max(1)),
            ..Self::new(name)
        }
    }

    pub fn put(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SchedulingError::ChannelClosed(self.name.clone()));
        }
        if let Some(max) = self.max_size {
            while state.items.len() >= max {
                state.items.pop_front();
            }
        }
        state.items.push_back(item);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until an item is available. `None` once closed and empty.
    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Like [`get`](Self::get) but gives up after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return state.items.pop_front();
            }
        }
    }

    pub fn try_get(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Close the channel and wake every blocked reader.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Reopen a closed channel, keeping whatever it still holds.
    pub fn reopen(&self) {
        self.state.lock().closed = false;
    }

    pub fn clear(&self) {
        self.state.lock().items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let channel = ThreadSafeChannel::new("test");
        for i in 0..5 {
            channel.put(i).unwrap();
        }
        let drained: Vec<_> = (0..5).filter_map(|_| channel.try_get()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_max_size_drops_oldest() {
        let channel = ThreadSafeChannel::with_max_size("bounded", 2);
        channel.put("a").unwrap();
        channel.put("b").unwrap();
        channel.put("c").unwrap();
        assert_eq!(channel.size(), 2);
        assert_eq!(channel.get(), Some("b"));
        assert_eq!(channel.get(), Some("c"));
    }

    #[test]
    fn test_put_on_closed_channel_fails() {
        let channel = ThreadSafeChannel::new("closed");
        channel.close();
        assert!(matches!(
            channel.put(1),
            Err(SchedulingError::ChannelClosed(_))
        ));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let channel = ThreadSafeChannel::new("drain");
        channel.put(7).unwrap();
        channel.close();
        assert_eq!(channel.get(), Some(7));
        assert_eq!(channel.get(), None);
    }

    #[test]
    fn test_close_wakes_blocked_reader() {
        let channel = Arc::new(ThreadSafeChannel::<u32>::new("wake"));
        let reader = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.get())
        };
        thread::sleep(Duration::from_millis(50));
        channel.close();
        assert_eq!(reader.join().unwrap(), None);
    }

    #[test]
    fn test_get_timeout_returns_none_when_empty() {
        let channel = ThreadSafeChannel::<u8>::new("timeout");
        let started = Instant::now();
        assert_eq!(channel.get_timeout(Duration::from_millis(30)), None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
