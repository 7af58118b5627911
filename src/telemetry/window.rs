use std::collections::VecDeque;

/// Bounded, append-only history of the most recent samples.
///
/// Oldest samples are evicted first. Samples are never handed out mutably,
/// so nothing changes after a push.
#[derive(Debug, Clone)]
pub struct TimeWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> TimeWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one if the window is full.
    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples in arrival order, oldest first.
    pub fn values(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&T> {
        self.samples.back()
    }

    /// Most recent sample, or `default` when nothing has been pushed yet.
    pub fn last_or(&self, default: T) -> T {
        self.samples.back().cloned().unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
