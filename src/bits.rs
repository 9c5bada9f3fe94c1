//! Repacks byte streams into fixed-width bit groups and back.
//!
//! Base32 works on 5-bit groups while bytes are 8 bits wide, so both
//! directions of the codec go through the same bit stream. Positions that
//! carry no real data are [`Bit::Filler`] rather than zero, which keeps the
//! "this symbol is padding" decision explicit.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bit {
    Zero,
    One,
    Filler,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct BitGrouper {
    bits: Vec<Bit>,
}

impl BitGrouper {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        let mut grouper = Self {
            bits: Vec::with_capacity(bytes.len() * 8),
        };

        for byte in bytes {
            grouper.push_value(*byte, 8);
        }

        grouper
    }

    /// Appends the lowest `width` bits of `value`, most significant first
    pub(crate) fn push_value(&mut self, value: u8, width: usize) {
        for shift in (0..width).rev() {
            let bit = if (value >> shift) & 1 == 1 {
                Bit::One
            } else {
                Bit::Zero
            };

            self.bits.push(bit);
        }
    }

    /// Fills the stream with [`Bit::Filler`] up to the next multiple of `width`
    pub(crate) fn pad_to_multiple(&mut self, width: usize) {
        let remainder = self.bits.len() % width;

        if remainder != 0 {
            self.bits
                .resize(self.bits.len() + width - remainder, Bit::Filler);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bits.len()
    }

    /// Splits the stream into groups of `width`; the last one may be shorter
    pub(crate) fn chunks(&self, width: usize) -> std::slice::Chunks<'_, Bit> {
        self.bits.chunks(width)
    }
}

/// Reads a chunk as an unsigned number.
///
/// Filler mixed with real bits reads as zero. A chunk made only of filler
/// has no value.
pub(crate) fn chunk_value(chunk: &[Bit]) -> Option<u8> {
    if chunk.iter().all(|bit| *bit == Bit::Filler) {
        return None;
    }

    Some(
        chunk
            .iter()
            .fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit == Bit::One)),
    )
}
