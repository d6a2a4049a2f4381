use alloc::vec::Vec;

use bitvec::field::BitField;
use bitvec::prelude::*;
use nom_bitvec::BSlice;

use crate::DecodeError;

/// Number of octets the length coding of ETSI TS 103 097 v1.2.1 needs for `length`.
///
/// Every octet carries seven value bits. Values that need more than eight
/// octets yield a size above eight and cannot be encoded.
#[must_use]
pub fn length_coding_size(length: usize) -> usize {
    let mut size = 1;
    while size < 10 && (length as u64) >> (7 * size) != 0 {
        size += 1;
    }
    size
}

/// Appends `bits` as octets, filling up the first octet with leading zeros
pub(crate) fn write_into_vec_left_padded(bits: BSlice<'_, u8, Msb0>, vec: &mut Vec<u8>) {
    let mut padded = BitVec::<u8, Msb0>::repeat(false, (8 - bits.0.len() % 8) % 8);
    padded.extend_from_bitslice(bits.0);
    vec.extend(padded.chunks(8).map(BitField::load_be::<u8>));
}

/// Converts the error of a nom result, e.g. from bit to byte input
pub(crate) fn cast_nom_err<I, O>(error: nom::Err<DecodeError<I>>) -> nom::Err<DecodeError<O>>
where
    DecodeError<I>: Into<DecodeError<O>>,
{
    error.map(Into::into)
}
