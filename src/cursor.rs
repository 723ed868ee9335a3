//! Little-endian decoding helpers over an advancing slice cursor.
//!
//! A cursor is simply a `&mut &[u8]`: each helper decodes at the front of the
//! slice and shrinks it past the consumed bytes, so the borrowed data keeps
//! the lifetime of the underlying byte region. Codec implementations use the
//! same helpers to decode their own length prefixes.

use byteorder::{ByteOrder, LittleEndian};

/// Decodes a little-endian `u16` at the front of `cursor` and advances past it.
///
/// # Panics
///
/// Panics if fewer than two bytes remain.
pub fn read_u16<'t>(cursor: &mut &'t [u8]) -> u16 {
    let bytes = *cursor;
    let value = LittleEndian::read_u16(bytes);
    *cursor = &bytes[2..];
    value
}

/// Decodes a little-endian `u32` at the front of `cursor` and advances past it.
///
/// # Panics
///
/// Panics if fewer than four bytes remain.
pub fn read_u32<'t>(cursor: &mut &'t [u8]) -> u32 {
    let bytes = *cursor;
    let value = LittleEndian::read_u32(bytes);
    *cursor = &bytes[4..];
    value
}

/// Splits `len` bytes off the front of `cursor` and advances past them.
///
/// # Panics
///
/// Panics if fewer than `len` bytes remain.
pub fn take<'t>(cursor: &mut &'t [u8], len: usize) -> &'t [u8] {
    let bytes = *cursor;
    let (taken, rest) = bytes.split_at(len);
    *cursor = rest;
    taken
}
