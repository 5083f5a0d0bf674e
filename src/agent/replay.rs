use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

/// One observed decision outcome.
///
/// States are the scalar normalized gap; transitions are immutable once
/// appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: f64,
    pub action: usize,
    pub reward: f64,
    pub next_state: f64,
    pub terminal: bool,
}

/// Fixed-capacity ring buffer of transitions. Overwrites oldest-first once
/// full.
pub struct ReplayMemory {
    buffer: Vec<Transition>,
    capacity: usize,
    position: usize,
    len: usize,
    rng: StdRng,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        assert!(capacity > 0, "replay capacity must be positive");
        ReplayMemory {
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity,
            position: 0,
            len: 0,
            rng,
        }
    }

    /// Append a transition. Overwrites the oldest entry when full.
    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[self.position] = transition;
        }
        self.position = (self.position + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    /// Uniform minibatch without replacement.
    pub fn sample(&mut self, batch_size: usize) -> Vec<Transition> {
        assert!(batch_size <= self.len, "Not enough transitions to sample");
        let indices = index::sample(&mut self.rng, self.len, batch_size);
        indices.iter().map(|i| self.buffer[i].clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the stored transitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let (tail, head) = self.buffer.split_at(self.position.min(self.buffer.len()));
        head.iter().chain(tail.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(tag: f64) -> Transition {
        Transition {
            state: tag,
            action: 0,
            reward: 1.0,
            next_state: tag,
            terminal: false,
        }
    }

    #[test]
    fn test_push_and_len() {
        let mut mem = ReplayMemory::with_seed(10, 1);
        assert!(mem.is_empty());
        for i in 0..10 {
            mem.push(transition(i as f64));
        }
        assert_eq!(mem.len(), 10);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut mem = ReplayMemory::with_seed(5, 1);
        for i in 0..20 {
            mem.push(transition(i as f64));
        }
        assert_eq!(mem.len(), 5);
    }

    #[test]
    fn test_fifo_eviction_discards_oldest() {
        let mut mem = ReplayMemory::with_seed(5, 1);
        for i in 0..8 {
            mem.push(transition(i as f64));
        }
        let states: Vec<f64> = mem.iter().map(|t| t.state).collect();
        assert_eq!(states, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_sample_size() {
        let mut mem = ReplayMemory::with_seed(100, 1);
        for i in 0..50 {
            mem.push(transition(i as f64));
        }
        assert_eq!(mem.sample(32).len(), 32);
    }

    #[test]
    #[should_panic(expected = "Not enough transitions")]
    fn test_sample_too_many() {
        let mut mem = ReplayMemory::with_seed(10, 1);
        mem.push(transition(0.0));
        mem.sample(5);
    }
}
