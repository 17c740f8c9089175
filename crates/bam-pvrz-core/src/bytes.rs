//! Bounds-checked little-endian field access over byte buffers.

use crate::error::{BamError, Result};

#[inline]
fn field<const N: usize>(data: &[u8], offset: usize, name: &'static str) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .map(|s| {
            let mut out = [0u8; N];
            out.copy_from_slice(s);
            out
        })
        .ok_or(BamError::TruncatedInput {
            field: name,
            offset,
            needed: N,
            len: data.len(),
        })
}

pub fn read_u32(data: &[u8], offset: usize, name: &'static str) -> Result<u32> {
    field::<4>(data, offset, name).map(u32::from_le_bytes)
}

pub fn read_u64(data: &[u8], offset: usize, name: &'static str) -> Result<u64> {
    field::<8>(data, offset, name).map(u64::from_le_bytes)
}

pub fn read_i16(data: &[u8], offset: usize, name: &'static str) -> Result<i16> {
    field::<2>(data, offset, name).map(i16::from_le_bytes)
}

pub fn read_tag(data: &[u8], offset: usize, name: &'static str) -> Result<[u8; 4]> {
    field::<4>(data, offset, name)
}

pub fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
