//! Fixed-capacity ring storage with oldest-to-newest readout.
//!
//! Unwritten slots hold the default value and are returned by [`CircularBuffer::get`]
//! like any other slot. Callers that care about fill state keep their own count.

/// Ring buffer over `T` whose write pointer only ever grows.
#[derive(Debug, Clone)]
pub struct CircularBuffer<T> {
    /// Backing slots
    mem: Vec<T>,
    /// Total number of items ever added (next slot is `count % len`)
    count: u64,
}

impl<T: Clone + Default> CircularBuffer<T> {
    /// Create a buffer with `capacity` default-valued slots.
    ///
    /// A capacity of zero is bumped to one so that `add` always has a slot.
    pub fn new(capacity: usize) -> Self {
        Self::filled_with(capacity, T::default())
    }
}

impl<T: Clone> CircularBuffer<T> {
    /// Create a buffer whose unwritten slots read as `value`.
    pub fn filled_with(capacity: usize, value: T) -> Self {
        Self {
            mem: vec![value; capacity.max(1)],
            count: 0,
        }
    }

    /// Overwrite the slot at the write pointer and advance it.
    pub fn add(&mut self, item: T) {
        let slot = self.slot(self.count);
        self.mem[slot] = item;
        self.count += 1;
    }

    /// All slots ordered from oldest to newest.
    pub fn get(&self) -> Vec<T> {
        let split = self.slot(self.count);
        let mut out = Vec::with_capacity(self.mem.len());
        out.extend_from_slice(&self.mem[split..]);
        out.extend_from_slice(&self.mem[..split]);
        out
    }

    /// The most recently added item, if any.
    pub fn latest(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        Some(&self.mem[self.slot(self.count - 1)])
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    /// Number of items ever added. Never reset.
    pub fn total_written(&self) -> u64 {
        self.count
    }

    fn slot(&self, position: u64) -> usize {
        (position % self.mem.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfilled_slots_read_as_default() {
        let mut buffer: CircularBuffer<f64> = CircularBuffer::new(4);
        buffer.add(1.0);
        buffer.add(2.0);

        assert_eq!(buffer.get(), vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_get_orders_oldest_to_newest() {
        let mut buffer: CircularBuffer<i32> = CircularBuffer::new(3);
        for i in 1..=7 {
            buffer.add(i);
        }

        let items = buffer.get();
        assert_eq!(items.len(), 3);
        assert_eq!(items, vec![5, 6, 7]);
        assert_eq!(*items.last().unwrap(), 7);
        // first item is the one added capacity - 1 steps before the newest
        assert_eq!(items[0], 7 - 2);
    }

    #[test]
    fn test_length_is_always_capacity() {
        let mut buffer: CircularBuffer<u8> = CircularBuffer::new(5);
        for n in 0..12 {
            assert_eq!(buffer.get().len(), 5);
            buffer.add(n);
        }
        assert_eq!(buffer.total_written(), 12);
    }

    #[test]
    fn test_latest() {
        let mut buffer: CircularBuffer<i32> = CircularBuffer::new(2);
        assert!(buffer.latest().is_none());
        buffer.add(10);
        buffer.add(20);
        buffer.add(30);
        assert_eq!(buffer.latest(), Some(&30));
    }

    #[test]
    fn test_vector_slots() {
        let mut buffer = CircularBuffer::filled_with(2, vec![0.0; 3]);
        buffer.add(vec![1.0, 1.0, 1.0]);
        assert_eq!(buffer.get(), vec![vec![0.0; 3], vec![1.0, 1.0, 1.0]]);
    }
}
