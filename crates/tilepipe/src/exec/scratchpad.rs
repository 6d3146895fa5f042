use crate::error::{Result, TileError};

/// Byte accountant for one core's scratchpad.
///
/// Hands out offsets bump-style; a request past capacity fails instead of
/// truncating the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scratchpad {
    capacity: usize,
    used: usize,
    peak: usize,
}

impl Scratchpad {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            peak: 0,
        }
    }

    /// Reserve `bytes`, returning the offset of the reservation.
    pub fn reserve(&mut self, bytes: usize) -> Result<usize> {
        let available = self.available();
        if bytes > available {
            return Err(TileError::ScratchpadExhausted {
                requested: bytes,
                available,
                capacity: self.capacity,
            });
        }
        let offset = self.used;
        self.used += bytes;
        self.peak = self.peak.max(self.used);
        Ok(offset)
    }

    /// Return the most recent `bytes` to the pool.
    pub fn release(&mut self, bytes: usize) {
        self.used = self.used.saturating_sub(bytes);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn available(&self) -> usize {
        self.capacity - self.used
    }

    /// High-water mark since construction.
    pub fn peak(&self) -> usize {
        self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn test_reserve_until_exhausted() {
        let mut pad = Scratchpad::new(1024);
        assert_eq!(pad.reserve(512).unwrap(), 0);
        assert_eq!(pad.reserve(256).unwrap(), 512);
        let err = pad.reserve(512).unwrap_err();
        assert_eq!(
            err,
            TileError::ScratchpadExhausted {
                requested: 512,
                available: 256,
                capacity: 1024
            }
        );
        assert_eq!(err.class(), ErrorClass::ResourceExhaustion);
        // A failed request leaves the books untouched.
        assert_eq!(pad.used(), 768);
    }

    #[test]
    fn test_release_keeps_peak() {
        let mut pad = Scratchpad::new(100);
        pad.reserve(60).unwrap();
        pad.release(60);
        assert_eq!(pad.used(), 0);
        assert_eq!(pad.peak(), 60);
        assert_eq!(pad.reserve(100).unwrap(), 0);
        assert_eq!(pad.available(), 0);
    }

    #[test]
    fn test_zero_capacity() {
        let mut pad = Scratchpad::new(0);
        assert_eq!(pad.reserve(0).unwrap(), 0);
        assert!(pad.reserve(1).is_err());
    }
}
