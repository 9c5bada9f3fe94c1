//! RFC4648 base32 with `=` padding.
//!
//! Encoding always emits uppercase text padded to a multiple of 8 symbols.
//! Decoding is case-insensitive and, by default, lenient about the length
//! of the trailing group: bits that do not complete a byte are dropped.
//! [`decode_strict`] rejects anything the encoder could not have produced.

use crate::bits::{chunk_value, BitGrouper};

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const PAD: char = '=';

const BLOCK_BITS: usize = 40;
const SYMBOL_BITS: usize = 5;
const BYTE_BITS: usize = 8;
const SYMBOLS_PER_BLOCK: usize = 8;

/// Pad runs the encoder can emit for the last 8-symbol group
const LEGAL_PAD_COUNTS: [usize; 5] = [0, 1, 3, 4, 6];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid base32 character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("Invalid base32 padding at position {position}")]
    InvalidPadding { position: usize },
}

/// Encodes bytes as padded uppercase base32
pub fn encode(bytes: &[u8]) -> String {
    let mut grouper = BitGrouper::from_bytes(bytes);
    grouper.pad_to_multiple(BLOCK_BITS);

    grouper
        .chunks(SYMBOL_BITS)
        .map(|chunk| match chunk_value(chunk) {
            Some(value) => ALPHABET[usize::from(value)] as char,
            None => PAD,
        })
        .collect()
}

/// Decodes base32 text, ignoring trailing bits that do not fill a byte.
///
/// Padding is optional but, when present, must be a trailing run.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let values = symbol_values(text)?;

    Ok(regroup(&values))
}

/// Decodes base32 text, also rejecting group lengths the encoder never emits
pub fn decode_strict(text: &str) -> Result<Vec<u8>, DecodeError> {
    let values = symbol_values(text)?;

    let padding = values.iter().rev().take_while(|v| v.is_none()).count();
    let data = values.len() - padding;
    let missing = (SYMBOLS_PER_BLOCK - data % SYMBOLS_PER_BLOCK) % SYMBOLS_PER_BLOCK;

    if !LEGAL_PAD_COUNTS.contains(&missing) || (padding != 0 && padding != missing) {
        return Err(DecodeError::InvalidPadding { position: data });
    }

    Ok(regroup(&values))
}

/// Maps every symbol to its 5-bit value, pad symbols to `None`
fn symbol_values(text: &str) -> Result<Vec<Option<u8>>, DecodeError> {
    let mut values = Vec::with_capacity(text.len());
    let mut padding_start = None;

    for (position, character) in text.chars().enumerate() {
        if character == PAD {
            padding_start.get_or_insert(position);
            values.push(None);
            continue;
        }

        if let Some(position) = padding_start {
            return Err(DecodeError::InvalidPadding { position });
        }

        let value = symbol_value(character).ok_or(DecodeError::InvalidCharacter {
            character,
            position,
        })?;
        values.push(Some(value));
    }

    Ok(values)
}

fn symbol_value(character: char) -> Option<u8> {
    match character.to_ascii_uppercase() {
        c @ 'A'..='Z' => Some(c as u8 - b'A'),
        c @ '2'..='7' => Some(c as u8 - b'2' + 26),
        _ => None,
    }
}

fn regroup(values: &[Option<u8>]) -> Vec<u8> {
    let mut grouper = BitGrouper::new();

    for value in values.iter().map_while(|v| *v) {
        grouper.push_value(value, SYMBOL_BITS);
    }

    let dropped = grouper.len() % BYTE_BITS;
    if dropped != 0 {
        tracing::trace!(dropped, "discarding bits that do not complete a byte");
    }

    grouper
        .chunks(BYTE_BITS)
        .filter(|chunk| chunk.len() == BYTE_BITS)
        .filter_map(chunk_value)
        .collect()
}
