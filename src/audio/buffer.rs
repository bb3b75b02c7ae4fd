//! Fixed-capacity circular buffer used for detector pre-roll.
//!
//! The phrase detector pushes every capture frame through this ring while
//! idle, so the instant a frame crosses the energy threshold the most recent
//! `capacity` samples (the attack that preceded the crossing) are available
//! to seed the new phrase.
//!
//! # Example
//!
//! ```rust
//! use jam_session::audio::RingBuffer;
//!
//! let mut ring = RingBuffer::new(4);
//! ring.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // oldest sample dropped
//!
//! let mut phrase = Vec::new();
//! ring.drain_into(&mut phrase);
//! assert_eq!(phrase, vec![2.0, 3.0, 4.0, 5.0]);
//! assert!(ring.is_empty());
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer that overwrites its oldest entries.
///
/// Storage is allocated once in [`RingBuffer::new`]; pushing and draining
/// never reallocate the ring itself.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid entries currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest entries once full.
    pub fn push_slice(&mut self, data: &[T]) {
        let capacity = self.capacity();
        // Only the newest `capacity` items can survive.
        let data = &data[data.len().saturating_sub(capacity)..];

        let first = (capacity - self.write_pos).min(data.len());
        self.buf[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);
        let rest = data.len() - first;
        self.buf[..rest].copy_from_slice(&data[first..]);

        self.write_pos = (self.write_pos + data.len()) % capacity;
        self.len = (self.len + data.len()).min(capacity);
    }

    /// The stored entries in chronological order, as two contiguous runs.
    pub fn as_slices(&self) -> (&[T], &[T]) {
        if self.len < self.capacity() {
            let start = (self.write_pos + self.capacity() - self.len) % self.capacity();
            if start + self.len <= self.capacity() {
                (&self.buf[start..start + self.len], &[])
            } else {
                let head = self.capacity() - start;
                (&self.buf[start..], &self.buf[..self.len - head])
            }
        } else {
            (&self.buf[self.write_pos..], &self.buf[..self.write_pos])
        }
    }

    /// Append all stored entries to `out` in chronological order, then
    /// empty the ring.
    pub fn drain_into(&mut self, out: &mut Vec<T>) {
        let (a, b) = self.as_slices();
        out.reserve(a.len() + b.len());
        out.extend_from_slice(a);
        out.extend_from_slice(b);
        self.clear();
    }

    /// Discard all entries and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Seconds of audio currently held, assuming mono at `sample_rate`.
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.len as f64 / sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
