//! Availability: is index `i` of a fixed-size domain present?

use std::fmt;

use crate::core::{Error, Result};
use crate::implicit::subtree::BufferSlice;

/// Boolean availability over `[0, length)`
pub trait AvailabilityInfo: fmt::Debug + Send + Sync {
    /// Size of the index domain
    fn length(&self) -> u64;

    /// Whether `index` is available. Fails outside `[0, length)`.
    fn is_available(&self, index: u64) -> Result<bool>;

    /// Number of available indices
    fn available_count(&self) -> u64;

    /// Number of available indices below `index`. Fails outside `[0, length)`.
    fn available_before(&self, index: u64) -> Result<u64>;
}

fn check_index(index: u64, length: u64) -> Result<()> {
    if index >= length {
        return Err(Error::OutOfRange(format!(
            "availability index {} not below length {}",
            index, length
        )));
    }
    Ok(())
}

/// The same answer for every index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantAvailability {
    length: u64,
    available: bool,
}

impl ConstantAvailability {
    pub fn new(length: u64, available: bool) -> Self {
        Self { length, available }
    }
}

impl AvailabilityInfo for ConstantAvailability {
    fn length(&self) -> u64 {
        self.length
    }

    fn is_available(&self, index: u64) -> Result<bool> {
        check_index(index, self.length)?;
        Ok(self.available)
    }

    fn available_count(&self) -> u64 {
        if self.available { self.length } else { 0 }
    }

    fn available_before(&self, index: u64) -> Result<u64> {
        check_index(index, self.length)?;
        Ok(if self.available { index } else { 0 })
    }
}

/// Bytes per rank block of a bitstream
const RANK_BLOCK_BYTES: usize = 64;

/// Bit-packed availability, LSB first: bit `i` is bit `i % 8` of byte `i / 8`
#[derive(Clone)]
pub struct BufferAvailability {
    bits: BufferSlice,
    length: u64,
    /// Set bits before each block of `RANK_BLOCK_BYTES` bytes
    block_ranks: Vec<u64>,
    count: u64,
}

impl BufferAvailability {
    /// Wrap a bitstream view. The view must hold at least `ceil(length / 8)` bytes.
    pub fn new(bits: BufferSlice, length: u64) -> Result<Self> {
        let needed = length.div_ceil(8);
        if (bits.len() as u64) < needed {
            return Err(Error::OutOfRange(format!(
                "bitstream of {} bytes cannot hold {} availability bits",
                bits.len(),
                length
            )));
        }
        let used = &bits.as_bytes()[..needed as usize];
        let mut block_ranks = Vec::with_capacity(used.len().div_ceil(RANK_BLOCK_BYTES));
        let mut rank = 0u64;
        for block in used.chunks(RANK_BLOCK_BYTES) {
            block_ranks.push(rank);
            rank += block.iter().map(|b| b.count_ones() as u64).sum::<u64>();
        }
        let mut availability = Self { bits, length, block_ranks, count: 0 };
        if length > 0 {
            let last = length - 1;
            availability.count = availability.rank(last) + availability.bit(last) as u64;
        }
        Ok(availability)
    }

    fn bit(&self, index: u64) -> bool {
        (self.bits.as_bytes()[(index >> 3) as usize] >> (index % 8)) & 1 == 1
    }

    /// Set bits in `[0, index)`; `index` must be below `length`
    fn rank(&self, index: u64) -> u64 {
        let bytes = self.bits.as_bytes();
        let byte = (index / 8) as usize;
        let block = byte / RANK_BLOCK_BYTES;
        let mut rank = self.block_ranks[block];
        rank += bytes[block * RANK_BLOCK_BYTES..byte]
            .iter()
            .map(|b| b.count_ones() as u64)
            .sum::<u64>();
        let rest = index % 8;
        if rest > 0 {
            rank += (bytes[byte] & ((1u8 << rest) - 1)).count_ones() as u64;
        }
        rank
    }
}

impl fmt::Debug for BufferAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferAvailability")
            .field("length", &self.length)
            .field("bytes", &self.bits.len())
            .finish()
    }
}

impl AvailabilityInfo for BufferAvailability {
    fn length(&self) -> u64 {
        self.length
    }

    fn is_available(&self, index: u64) -> Result<bool> {
        check_index(index, self.length)?;
        Ok(self.bit(index))
    }

    fn available_count(&self) -> u64 {
        self.count
    }

    fn available_before(&self, index: u64) -> Result<u64> {
        check_index(index, self.length)?;
        Ok(self.rank(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(bytes: &[u8]) -> BufferSlice {
        BufferSlice::from_vec(bytes.to_vec())
    }

    #[test]
    fn test_buffer_bit_order() {
        let availability = BufferAvailability::new(bits(&[0b10110010, 0b00000001]), 16).unwrap();
        assert!(!availability.is_available(0).unwrap());
        assert!(availability.is_available(1).unwrap());
        assert!(availability.is_available(4).unwrap());
        assert!(availability.is_available(7).unwrap());
        assert!(availability.is_available(8).unwrap());
        assert!(!availability.is_available(9).unwrap());
        assert!(matches!(availability.is_available(16), Err(Error::OutOfRange(_))));
        assert_eq!(availability.available_count(), 5);
    }

    #[test]
    fn test_partial_last_byte_is_masked() {
        let availability = BufferAvailability::new(bits(&[0xff, 0xff]), 13).unwrap();
        assert_eq!(availability.available_count(), 13);
        assert!(availability.is_available(13).is_err());
    }

    #[test]
    fn test_short_bitstream_rejected() {
        assert!(BufferAvailability::new(bits(&[0]), 9).is_err());
        assert!(BufferAvailability::new(bits(&[0, 0]), 9).is_ok());
    }

    #[test]
    fn test_available_before_counts_across_blocks() {
        // 200 bytes spans several rank blocks; every third bit set
        let bytes: Vec<u8> = (0..200 * 8)
            .collect::<Vec<u64>>()
            .chunks(8)
            .map(|c| c.iter().enumerate().fold(0u8, |b, (i, &n)| b | (((n % 3 == 0) as u8) << i)))
            .collect();
        let availability = BufferAvailability::new(bits(&bytes), 1597).unwrap();
        for index in [0u64, 1, 3, 7, 8, 511, 512, 513, 1000, 1596] {
            assert_eq!(availability.available_before(index).unwrap(), index.div_ceil(3));
        }
        assert_eq!(availability.available_count(), 1597u64.div_ceil(3));
        assert!(availability.available_before(1597).is_err());
    }

    #[test]
    fn test_constant_available_before() {
        let huge = ConstantAvailability::new(u64::MAX / 2, true);
        assert_eq!(huge.available_before(1 << 60).unwrap(), 1 << 60);
        assert_eq!(ConstantAvailability::new(10, false).available_before(9).unwrap(), 0);
    }

    #[test]
    fn test_constant() {
        let available = ConstantAvailability::new(5, true);
        assert!(available.is_available(4).unwrap());
        assert!(available.is_available(5).is_err());
        assert_eq!(available.available_count(), 5);

        let unavailable = ConstantAvailability::new(5, false);
        assert!(!unavailable.is_available(0).unwrap());
        assert_eq!(unavailable.available_count(), 0);
    }
}
