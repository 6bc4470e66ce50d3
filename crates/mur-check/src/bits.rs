//! Bit-level access to packed state buffers
//!
//! Every model variable occupies a contiguous run of bits inside a state's
//! byte buffer. Variables are packed back to back in declaration order with no
//! alignment padding, so a field can start at any bit and straddle byte
//! boundaries.
//!
//! # Encoding
//!
//! Bits are numbered little-endian: bit `i` of the buffer is bit `i % 8` of
//! byte `i / 8`. A field of width `w` at offset `o` holds an unsigned `w`-bit
//! integer whose least significant bit is buffer bit `o`. Signedness and value
//! offsets are applied by the typed views in [`crate::view`].

/// Number of bytes needed to hold `bits` bits.
#[inline]
pub const fn bytes_for_bits(bits: usize) -> usize {
    (bits + 7) / 8
}

/// Read a `width`-bit unsigned field starting at bit `offset`.
///
/// A zero-width field always reads as 0.
///
/// # Panics
/// Debug builds assert `width <= 64` and that the field lies inside `data`.
#[inline]
pub fn read_bits(data: &[u8], offset: usize, width: usize) -> u64 {
    debug_assert!(width <= 64, "read of too large a value");
    if width == 0 {
        return 0;
    }
    debug_assert!(offset + width <= data.len() * 8, "out of bounds read");

    let first = offset / 8;
    let last = bytes_for_bits(offset + width);
    let mut window = [0u8; 16];
    window[..last - first].copy_from_slice(&data[first..last]);

    let v = u128::from_le_bytes(window) >> (offset % 8);
    let mask = (1u128 << width) - 1;
    (v & mask) as u64
}

/// Write the low `width` bits of `value` to the field starting at bit `offset`.
///
/// Bits outside `[offset, offset + width)` are left untouched: the target
/// window is masked out before the new bits are OR-ed in, and any bits of
/// `value` above `width` are discarded.
#[inline]
pub fn write_bits(data: &mut [u8], offset: usize, width: usize, value: u64) {
    debug_assert!(width <= 64, "write of too large a value");
    debug_assert!(
        width == 64 || value >> width == 0,
        "write of a value wider than its field"
    );
    if width == 0 {
        return;
    }
    debug_assert!(offset + width <= data.len() * 8, "out of bounds write");

    let first = offset / 8;
    let last = bytes_for_bits(offset + width);
    let len = last - first;
    let mut window = [0u8; 16];
    window[..len].copy_from_slice(&data[first..last]);

    let shift = offset % 8;
    let mask = ((1u128 << width) - 1) << shift;
    let v = (u128::from_le_bytes(window) & !mask) | (((value as u128) << shift) & mask);
    data[first..last].copy_from_slice(&v.to_le_bytes()[..len]);
}

/// Anything that exposes a packed bit buffer.
///
/// Implemented by [`crate::State`] (model states) and [`BitBuffer`]
/// (free-standing composite values). Typed views read and write through this
/// trait so the same view works against either.
pub trait BitBlock {
    /// The raw bytes backing this block.
    fn bytes(&self) -> &[u8];

    /// Mutable access to the raw bytes backing this block.
    fn bytes_mut(&mut self) -> &mut [u8];

    #[inline]
    fn read(&self, offset: usize, width: usize) -> u64 {
        read_bits(self.bytes(), offset, width)
    }

    #[inline]
    fn write(&mut self, offset: usize, width: usize, value: u64) {
        write_bits(self.bytes_mut(), offset, width, value)
    }
}

/// A fixed-capacity, zero-initialized bit buffer not owned by any state.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitBuffer {
    data: Box<[u8]>,
    bits: usize,
}

impl BitBuffer {
    /// Create a zeroed buffer able to hold `bits` bits.
    pub fn new(bits: usize) -> Self {
        BitBuffer {
            data: vec![0u8; bytes_for_bits(bits)].into_boxed_slice(),
            bits,
        }
    }

    /// Capacity in bits.
    #[inline]
    pub fn capacity_bits(&self) -> usize {
        self.bits
    }
}

impl BitBlock for BitBuffer {
    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitBuffer({} bits: ", self.bits)?;
        for b in self.data.iter() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_for_bits() {
        assert_eq!(bytes_for_bits(0), 0);
        assert_eq!(bytes_for_bits(1), 1);
        assert_eq!(bytes_for_bits(8), 1);
        assert_eq!(bytes_for_bits(9), 2);
        assert_eq!(bytes_for_bits(64), 8);
    }

    #[test]
    fn test_aligned_byte_roundtrip() {
        let mut data = [0u8; 4];
        write_bits(&mut data, 8, 8, 0xAB);
        assert_eq!(data, [0x00, 0xAB, 0x00, 0x00]);
        assert_eq!(read_bits(&data, 8, 8), 0xAB);
    }

    #[test]
    fn test_field_straddles_byte_boundary() {
        let mut data = [0u8; 3];
        // 10 bits starting at bit 5 cover bytes 0 and 1
        write_bits(&mut data, 5, 10, 0x3FF);
        assert_eq!(read_bits(&data, 5, 10), 0x3FF);
        assert_eq!(read_bits(&data, 0, 5), 0);
        assert_eq!(read_bits(&data, 15, 9), 0);
    }

    #[test]
    fn test_write_does_not_perturb_neighbours() {
        let mut data = [0xFFu8; 3];
        write_bits(&mut data, 3, 7, 0);
        assert_eq!(read_bits(&data, 0, 3), 0b111);
        assert_eq!(read_bits(&data, 3, 7), 0);
        assert_eq!(read_bits(&data, 10, 14), 0x3FFF);
    }

    #[test]
    fn test_full_width_unaligned() {
        let mut data = [0u8; 9];
        write_bits(&mut data, 3, 64, u64::MAX - 1);
        assert_eq!(read_bits(&data, 3, 64), u64::MAX - 1);
        assert_eq!(read_bits(&data, 0, 3), 0);
        assert_eq!(read_bits(&data, 67, 5), 0);
    }

    #[test]
    fn test_zero_width_is_noop() {
        let mut data = [0x5Au8; 1];
        write_bits(&mut data, 8, 0, 0);
        assert_eq!(data, [0x5A]);
        assert_eq!(read_bits(&data, 8, 0), 0);
        // Zero-width reads are legal even on an empty buffer
        assert_eq!(read_bits(&[], 0, 0), 0);
    }

    #[test]
    fn test_bit_buffer_block() {
        let mut buf = BitBuffer::new(12);
        assert_eq!(buf.capacity_bits(), 12);
        assert_eq!(buf.bytes().len(), 2);
        buf.write(4, 8, 0x81);
        assert_eq!(buf.read(4, 8), 0x81);
        assert_eq!(buf.read(0, 4), 0);
    }
}
