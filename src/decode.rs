use alloc::{format, string::String, vec::Vec};
use core::fmt::Display;

use bitvec::prelude::*;
use nom::{
    bytes::streaming::take,
    combinator::map,
    error::{ErrorKind, FromExternalError, ParseError},
    sequence::tuple,
    Needed,
};
use nom_bitvec::BSlice;
use num::{FromPrimitive, Integer};

use crate::{
    util::{cast_nom_err, write_into_vec_left_padded},
    *,
};

type DecodeIn<'input> = BSlice<'input, u8, Msb0>;

/// Returns the value of a decoding attempt
#[derive(Debug, PartialEq)]
pub struct Decoded<T: Debug + PartialEq> {
    /// indicates the number of bytes that were consumed by the decoder
    pub bytes_consumed: usize,
    /// the decoded return value
    pub decoded: T,
}

pub trait Decode<'s>: Sized + Debug + PartialEq {
    /// Decodes a self-describing record from binary data.
    ///
    /// Implemented for
    ///  - `CommonHeader`
    ///  - `GeoAreaHeader` (a.k.a. `GeoBroadcast` and `GeoAnycast`)
    ///  - `LongPositionVector`
    ///  - `EncryptionParameters`
    ///  - `PublicKeyAlgorithm`
    ///  - `SymmetricAlgorithm`
    /// ### Usage
    /// ```rust
    /// # use itsg5_codec::*;
    /// let data: &'static [u8] = &[0x20, 0x40, 0x03, 0x00, 0x00, 0x08, 0x0a, 0x00];
    /// let result = CommonHeader::decode(data).unwrap();
    /// assert_eq!(8, result.bytes_consumed);
    /// assert_eq!(
    ///     HeaderType::GeoBroadcast(AreaType::Circular),
    ///     result.decoded.header_type_and_subtype
    /// );
    /// ```
    fn decode<'input: 's, I: Into<&'input [u8]>>(
        input: I,
    ) -> Result<Decoded<Self>, DecodeError<&'input [u8]>>;
}

pub trait DecodeWith<'s, P>: Sized + Debug + PartialEq {
    /// Decodes a record whose layout depends on parameters that are transmitted
    /// elsewhere, e.g. the symmetric algorithm of an encrypted message
    /// determining the ciphertext length within each `RecipientInfo`.
    ///
    /// `bytes_consumed` of the result lets callers advance over consecutive records.
    /// ### Usage
    /// ```rust
    /// # use itsg5_codec::*;
    /// let data: &'static [u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 0x00, 0x03, 0xaa, 0xbb, 0xcc];
    /// let result = RecipientInfo::decode_with(data, SymmetricAlgorithm::Aes128Ccm).unwrap();
    /// assert_eq!(13, result.bytes_consumed);
    /// ```
    fn decode_with<'input: 's, I: Into<&'input [u8]>>(
        input: I,
        params: P,
    ) -> Result<Decoded<Self>, DecodeError<&'input [u8]>>;
}

macro_rules! decode {
    ($typ:ty) => {
        impl<'s> Decode<'s> for $typ {
            fn decode<'input: 's, I: Into<&'input [u8]>>(
                input: I,
            ) -> Result<Decoded<Self>, DecodeError<&'input [u8]>> {
                let input = input.into();
                let (remaining, decoded) = <$typ>::decode_bytewise(input)?;
                Ok(Decoded {
                    bytes_consumed: input.len() - remaining.len(),
                    decoded,
                })
            }
        }
    };
}

macro_rules! decode_with {
    ($lt:lifetime, $typ:ty, $params:ty) => {
        impl<$lt> DecodeWith<$lt, $params> for $typ {
            fn decode_with<'input: $lt, I: Into<&'input [u8]>>(
                input: I,
                params: $params,
            ) -> Result<Decoded<Self>, DecodeError<&'input [u8]>> {
                let input = input.into();
                let (remaining, decoded) = <$typ>::decode_bytewise_with(input, params)?;
                Ok(Decoded {
                    bytes_consumed: input.len() - remaining.len(),
                    decoded,
                })
            }
        }
    };
}

decode!(CommonHeader);
decode!(GeoAreaHeader);
decode!(LongPositionVector);
decode!(EncryptionParameters);
decode!(PublicKeyAlgorithm);
decode!(SymmetricAlgorithm);
decode_with!('s, EccPoint<'s>, PublicKeyAlgorithm);
decode_with!('s, RecipientInfo<'s>, SymmetricAlgorithm);
decode_with!('s, RecipientInfoList<'s>, SymmetricAlgorithm);

#[derive(Debug, PartialEq)]
pub enum DecodeError<I> {
    IntegerError(String),
    EnumError(String),
    ArrayError(String),
    ParserError(String),
    /// The input ended inside a field. Holds the number of bytes that are missing at least.
    Truncated(usize),
    Nom(I, ErrorKind),
    #[cfg(feature = "json")]
    Json(String),
}

impl<I> Display for DecodeError<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::IntegerError(s)
            | DecodeError::EnumError(s)
            | DecodeError::ArrayError(s)
            | DecodeError::ParserError(s) => f.write_str(s),
            DecodeError::Truncated(n) => {
                write!(f, "Unexpected end of input: Needs at least other {n} bytes!")
            }
            DecodeError::Nom(_, kind) => write!(f, "Parser error: {}", kind.description()),
            #[cfg(feature = "json")]
            DecodeError::Json(s) => f.write_str(s),
        }
    }
}

impl<T> From<nom::Err<DecodeError<T>>> for DecodeError<T> {
    fn from(value: nom::Err<DecodeError<T>>) -> Self {
        match value {
            nom::Err::Incomplete(Needed::Size(n)) => DecodeError::Truncated(n.get()),
            nom::Err::Incomplete(Needed::Unknown) => DecodeError::Truncated(1),
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
        }
    }
}

impl From<DecodeError<DecodeIn<'_>>> for DecodeError<&'_ [u8]> {
    fn from(value: DecodeError<DecodeIn<'_>>) -> Self {
        match value {
            DecodeError::IntegerError(s) => Self::IntegerError(s),
            DecodeError::EnumError(s) => Self::EnumError(s),
            DecodeError::ArrayError(s) => Self::ArrayError(s),
            DecodeError::ParserError(s) => Self::ParserError(s),
            DecodeError::Truncated(n) => Self::Truncated(n),
            DecodeError::Nom(_, k) => Self::Nom(&[], k),
            #[cfg(feature = "json")]
            DecodeError::Json(s) => Self::Json(s),
        }
    }
}

impl<I> ParseError<I> for DecodeError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        DecodeError::Nom(input, kind)
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I, E> FromExternalError<I, E> for DecodeError<I> {
    fn from_external_error(input: I, kind: ErrorKind, _: E) -> Self {
        DecodeError::Nom(input, kind)
    }
}

pub type IResult<I, T> = nom::IResult<I, T, DecodeError<I>>;

/// Decoding of records that are aligned to octets
trait InternalDecode<'s>: Sized {
    fn decode_bytewise<'input: 's>(input: &'input [u8]) -> IResult<&'input [u8], Self>;
}

/// Decoding of records whose layout depends on out-of-band parameters
trait InternalDecodeWith<'s, P>: Sized {
    fn decode_bytewise_with<'input: 's>(
        input: &'input [u8],
        params: P,
    ) -> IResult<&'input [u8], Self>;
}

/// Decoding of records containing fields narrower than an octet
trait BitwiseDecode: Sized {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self>;
}

/// Runs a bitwise parser over octet-aligned input.
/// Missing input is reported in bytes, not in bits.
fn bytewise<'input, T>(
    parser: impl FnOnce(DecodeIn<'input>) -> IResult<DecodeIn<'input>, T>,
    input: &'input [u8],
) -> IResult<&'input [u8], T> {
    let bits = DecodeIn::from(BitSlice::<u8, Msb0>::from_slice(input));
    let (remaining, instance) = parser(bits).map_err(|e| match e {
        nom::Err::Incomplete(Needed::Size(missing_bits)) => nom::Err::Incomplete(Needed::new(
            Integer::div_ceil(&missing_bits.get(), &8usize),
        )),
        e => cast_nom_err(e),
    })?;
    Ok((
        &input[(input.len() - Integer::div_ceil(&remaining.len(), &8usize))..],
        instance,
    ))
}

macro_rules! decode_from_bits {
    ($($typ:ty),+) => {
        $(
            impl<'s> InternalDecode<'s> for $typ {
                fn decode_bytewise<'input: 's>(input: &'input [u8]) -> IResult<&'input [u8], Self> {
                    bytewise(Self::decode_bitwise, input)
                }
            }
        )+
    };
}

decode_from_bits!(CommonHeader, GeoAreaHeader, LongPositionVector);

// =====================================================
// GeoNetworking (bitwise)
// =====================================================

fn take_bits<'input>(
    count: usize,
) -> impl FnMut(DecodeIn<'input>) -> IResult<DecodeIn<'input>, DecodeIn<'input>> {
    take(count)
}

fn read_as_uint<'input, I: FromPrimitive>(
    bit_count: usize,
) -> impl FnMut(DecodeIn<'input>) -> IResult<DecodeIn<'input>, I> {
    move |input| {
        let (input, bits) = take_bits(bit_count)(input)?;
        let value = bits
            .iter()
            .fold(0u64, |acc, bit| acc << 1 | u64::from(*bit));
        I::from_u64(value).map(|int| (input, int)).ok_or_else(|| {
            nom::Err::Error(DecodeError::IntegerError(format!(
                "Integer value does not fit into {bit_count} bits!"
            )))
        })
    }
}

fn read_enum<'input, E: TryFrom<u8>>(
    bit_count: usize,
    name: &'static str,
) -> impl FnMut(DecodeIn<'input>) -> IResult<DecodeIn<'input>, E> {
    move |input| {
        let (input, value) = read_as_uint::<u8>(bit_count)(input)?;
        E::try_from(value).map(|e| (input, e)).map_err(|_| {
            nom::Err::Error(DecodeError::EnumError(format!(
                "No corresponding {name} for value {value}!"
            )))
        })
    }
}

/// Speed is a 15 bit two's complement value
fn read_speed_value(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, i16> {
    map(read_as_uint::<u16>(15), |raw| {
        i16::from_be_bytes((raw << 1).to_be_bytes()) >> 1
    })(input)
}

impl BitwiseDecode for bool {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(take_bits(1), |bits: DecodeIn<'_>| bits[0])(input)
    }
}

impl BitwiseDecode for i32 {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(read_as_uint::<u32>(32), |raw| {
            i32::from_be_bytes(raw.to_be_bytes())
        })(input)
    }
}

impl<const SIZE: usize> BitwiseDecode for [u8; SIZE] {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        let (input, bits) = take_bits(SIZE * 8)(input)?;
        let mut vec = Vec::with_capacity(SIZE);
        write_into_vec_left_padded(bits, &mut vec);
        vec.try_into().map(|array| (input, array)).map_err(|_| {
            nom::Err::Error(DecodeError::ArrayError(format!(
                "Failed to decode an array of {SIZE} bytes!"
            )))
        })
    }
}

impl BitwiseDecode for Address {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(
            tuple((
                bool::decode_bitwise,
                read_enum(5, "station type"),
                read_as_uint(10),
                <[u8; 6]>::decode_bitwise,
            )),
            |(manually_configured, station_type, reserved, address)| Address {
                manually_configured,
                station_type,
                reserved,
                address,
            },
        )(input)
    }
}

impl BitwiseDecode for Timestamp {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(read_as_uint(32), Timestamp)(input)
    }
}

impl BitwiseDecode for LongPositionVector {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(
            tuple((
                Address::decode_bitwise,
                Timestamp::decode_bitwise,
                i32::decode_bitwise,
                i32::decode_bitwise,
                bool::decode_bitwise,
                read_speed_value,
                read_as_uint(16),
            )),
            |(gn_address, timestamp, latitude, longitude, position_accuracy, speed, heading)| {
                LongPositionVector {
                    gn_address,
                    timestamp,
                    latitude,
                    longitude,
                    position_accuracy,
                    speed,
                    heading,
                }
            },
        )(input)
    }
}

impl BitwiseDecode for TrafficClass {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(
            tuple((bool::decode_bitwise, bool::decode_bitwise, read_as_uint(6))),
            |(store_carry_forward, channel_offload, traffic_class_id)| TrafficClass {
                store_carry_forward,
                channel_offload,
                traffic_class_id,
            },
        )(input)
    }
}

impl BitwiseDecode for CommonHeader {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(
            tuple((
                read_enum(4, "next header"),
                read_as_uint(4),
                read_enum(8, "header type"),
                TrafficClass::decode_bitwise,
                read_as_uint(8),
                read_as_uint(16),
                read_as_uint(8),
                read_as_uint(8),
            )),
            |(
                next_header,
                reserved_1,
                header_type_and_subtype,
                traffic_class,
                flags,
                payload_length,
                maximum_hop_limit,
                reserved_2,
            )| CommonHeader {
                next_header,
                reserved_1,
                header_type_and_subtype,
                traffic_class,
                flags,
                payload_length,
                maximum_hop_limit,
                reserved_2,
            },
        )(input)
    }
}

impl BitwiseDecode for GeoAreaHeader {
    fn decode_bitwise(input: DecodeIn<'_>) -> IResult<DecodeIn<'_>, Self> {
        map(
            tuple((
                read_as_uint(16),
                read_as_uint(16),
                LongPositionVector::decode_bitwise,
                i32::decode_bitwise,
                i32::decode_bitwise,
                read_as_uint(16),
                read_as_uint(16),
                read_as_uint(16),
                read_as_uint(16),
            )),
            |(
                sequence_number,
                reserved_1,
                source_position_vector,
                geo_area_position_latitude,
                geo_area_position_longitude,
                distance_a,
                distance_b,
                angle,
                reserved_2,
            )| GeoAreaHeader {
                sequence_number,
                reserved_1,
                source_position_vector,
                geo_area_position_latitude,
                geo_area_position_longitude,
                distance_a,
                distance_b,
                angle,
                reserved_2,
            },
        )(input)
    }
}

// =====================================================
// ETSI TS 103 097 v1.2.1 (bytewise)
// =====================================================

fn take_bytes<'input>(
    count: usize,
) -> impl FnMut(&'input [u8]) -> IResult<&'input [u8], &'input [u8]> {
    take(count)
}

fn decode_bytewise_array<const SIZE: usize>(input: &[u8]) -> IResult<&[u8], [u8; SIZE]> {
    let (input, bytes) = take_bytes(SIZE)(input)?;
    let mut array = [0u8; SIZE];
    array.copy_from_slice(bytes);
    Ok((input, array))
}

/// Variable length determinant (ETSI TS 103 097 v1.2.1, clause 4.1).
///
/// The count of leading one bits in the first octet is the count of
/// subsequent octets, the remaining bits carry the length in big-endian order.
/// Only the shortest coding of a length is accepted, so every decoded length
/// re-encodes to the octets it was read from.
fn decode_bytewise_variable_length(input: &[u8]) -> IResult<&[u8], usize> {
    let (input, first) = take_bytes(1)(input)?;
    let additional = first[0].leading_ones() as usize;
    if additional > 7 {
        return Err(nom::Err::Error(DecodeError::ParserError(
            "Length coding exceeds eight octets!".into(),
        )));
    }
    let (input, rest) = take_bytes(additional)(input)?;
    let length = rest.iter().fold(
        u64::from(first[0] & (0x7f >> additional)),
        |acc, byte| acc << 8 | u64::from(*byte),
    );
    let length = usize::try_from(length).map_err(|_| {
        nom::Err::Error(DecodeError::IntegerError(format!(
            "Length {length} exceeds the address space!"
        )))
    })?;
    if length_coding_size(length) != additional + 1 {
        log::debug!(
            "Rejecting {}-octet coding of length {length}",
            additional + 1
        );
        return Err(nom::Err::Error(DecodeError::ParserError(format!(
            "Length {length} is not coded in the fewest octets!"
        ))));
    }
    Ok((input, length))
}

impl<'s> InternalDecode<'s> for PublicKeyAlgorithm {
    fn decode_bytewise<'input: 's>(input: &'input [u8]) -> IResult<&'input [u8], Self> {
        map(take_bytes(1), |byte: &[u8]| PublicKeyAlgorithm(byte[0]))(input)
    }
}

impl<'s> InternalDecode<'s> for SymmetricAlgorithm {
    fn decode_bytewise<'input: 's>(input: &'input [u8]) -> IResult<&'input [u8], Self> {
        let (input, byte) = take_bytes(1)(input)?;
        SymmetricAlgorithm::try_from(byte[0])
            .map(|algorithm| (input, algorithm))
            .map_err(|()| {
                nom::Err::Error(DecodeError::EnumError(format!(
                    "No corresponding symmetric algorithm for value {}!",
                    byte[0]
                )))
            })
    }
}

impl<'s> InternalDecode<'s> for EncryptionParameters {
    fn decode_bytewise<'input: 's>(input: &'input [u8]) -> IResult<&'input [u8], Self> {
        let (input, symmetric_algorithm) = SymmetricAlgorithm::decode_bytewise(input)?;
        let (input, nonce) = decode_bytewise_array::<NONCE_LENGTH>(input)?;
        Ok((
            input,
            Self {
                symmetric_algorithm,
                nonce,
            },
        ))
    }
}

impl<'s> InternalDecodeWith<'s, PublicKeyAlgorithm> for EccPoint<'s> {
    fn decode_bytewise_with<'input: 's>(
        input: &'input [u8],
        pk_algo: PublicKeyAlgorithm,
    ) -> IResult<&'input [u8], Self> {
        let field_size = pk_algo.field_size().ok_or_else(|| {
            nom::Err::Error(DecodeError::EnumError(format!(
                "No field size known for public key algorithm {}!",
                pk_algo.0
            )))
        })?;
        let (input, point_type) = take_bytes(1)(input)?;
        match point_type[0] {
            0 => map(take_bytes(field_size), EccPoint::XCoordinateOnly)(input),
            2 => map(take_bytes(field_size), EccPoint::CompressedLsbY0)(input),
            3 => map(take_bytes(field_size), EccPoint::CompressedLsbY1)(input),
            4 => {
                let (input, x) = take_bytes(field_size)(input)?;
                let (input, y) = take_bytes(field_size)(input)?;
                Ok((input, EccPoint::Uncompressed { x, y }))
            }
            other => Err(nom::Err::Error(DecodeError::EnumError(format!(
                "No corresponding ECC point type for value {other}!"
            )))),
        }
    }
}

impl<'s> InternalDecodeWith<'s, SymmetricAlgorithm> for RecipientInfo<'s> {
    fn decode_bytewise_with<'input: 's>(
        input: &'input [u8],
        sym_algo: SymmetricAlgorithm,
    ) -> IResult<&'input [u8], Self> {
        let (input, cert_id) = decode_bytewise_array::<8>(input)?;
        let (input, pk_algo) = PublicKeyAlgorithm::decode_bytewise(input)?;
        let (input, enc_key) = match pk_algo {
            PublicKeyAlgorithm::ECIES_NISTP256 => {
                let (input, v) = EccPoint::decode_bytewise_with(input, pk_algo)?;
                let (input, c) = take_bytes(sym_algo.field_size())(input)?;
                let (input, t) = decode_bytewise_array::<AUTH_TAG_LENGTH>(input)?;
                (
                    input,
                    EncryptedKey::EciesNistP256(EciesNistP256EncryptedKey { v, c, t }),
                )
            }
            algorithm => {
                if algorithm != PublicKeyAlgorithm::ECDSA_NISTP256_WITH_SHA256 {
                    log::trace!(
                        "Taking key of unassigned public key algorithm {} as opaque",
                        algorithm.0
                    );
                }
                let (input, length) = decode_bytewise_variable_length(input)?;
                if length > input.len() {
                    log::debug!(
                        "Opaque key length {length} exceeds the remaining {} bytes",
                        input.len()
                    );
                    return Err(nom::Err::Incomplete(Needed::new(length - input.len())));
                }
                let (input, key) = take_bytes(length)(input)?;
                (input, EncryptedKey::Opaque { algorithm, key })
            }
        };
        Ok((input, RecipientInfo { cert_id, enc_key }))
    }
}

impl<'s> InternalDecodeWith<'s, SymmetricAlgorithm> for RecipientInfoList<'s> {
    fn decode_bytewise_with<'input: 's>(
        input: &'input [u8],
        sym_algo: SymmetricAlgorithm,
    ) -> IResult<&'input [u8], Self> {
        let (input, length) = decode_bytewise_variable_length(input)?;
        let (input, mut content) = take_bytes(length)(input)?;
        let mut recipients = Vec::new();
        while !content.is_empty() {
            match RecipientInfo::decode_bytewise_with(content, sym_algo) {
                Ok((remaining, info)) => {
                    recipients.push(info);
                    content = remaining;
                }
                Err(nom::Err::Incomplete(_)) => {
                    return Err(nom::Err::Error(DecodeError::ParserError(format!(
                        "Recipient info exceeds the list length of {length} bytes!"
                    ))))
                }
                Err(e) => return Err(e),
            }
        }
        log::trace!("Decoded {} recipient info records", recipients.len());
        Ok((input, RecipientInfoList(recipients)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GBC: &[u8] = &[
        0x00, 0x07, 0x00, 0x00, 0x94, 0x00, 0x00, 0x60, 0xe0, 0x69, 0x57, 0x8d, 0x20, 0x5c, 0xb8,
        0xc0, 0x1f, 0xec, 0x38, 0x28, 0x05, 0xf2, 0x4d, 0x90, 0x02, 0xa8, 0x08, 0x4a, 0x1d, 0x16,
        0x4a, 0x00, 0x06, 0xda, 0xc2, 0xc0, 0x01, 0xf4, 0x00, 0xfa, 0x00, 0x2d, 0x00, 0x00,
    ];

    fn ecies_record() -> Vec<u8> {
        let mut bytes = vec![0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0x01, 0x03];
        bytes.extend_from_slice(&[0x11; 32]);
        bytes.extend_from_slice(&[0x22; 16]);
        bytes.extend_from_slice(&[0x33; 16]);
        bytes
    }

    #[test]
    fn decodes_integer() {
        let bits = bitvec::prelude::bits![static u8, Msb0; 0, 0, 1, 1];
        assert_eq!(3u8, read_as_uint::<u8>(4)(BSlice(bits)).unwrap().1);
        let bits = bitvec::prelude::bits![static u8, Msb0; 1, 0, 0, 1];
        assert_eq!(9u16, read_as_uint::<u16>(4)(BSlice(bits)).unwrap().1);
    }

    #[test]
    fn decodes_negative_speed() {
        let bits = [0x7fu8, 0x9c];
        let input = DecodeIn::from(BitSlice::<u8, Msb0>::from_slice(&bits[..]));
        let (_, pai) = bool::decode_bitwise(input).unwrap();
        assert!(!pai);
        let input = DecodeIn::from(&BitSlice::<u8, Msb0>::from_slice(&bits[..])[1..]);
        assert_eq!(-100, read_speed_value(input).unwrap().1);
    }

    #[test]
    fn decodes_common_header() {
        let data: &[u8] = &[0x20, 0x40, 0x83, 0x80, 0x00, 0x08, 0x0a, 0x00];
        let result = CommonHeader::decode(data).unwrap();
        assert_eq!(
            Decoded {
                bytes_consumed: 8,
                decoded: CommonHeader {
                    next_header: NextAfterCommon::BTPB,
                    reserved_1: 0,
                    header_type_and_subtype: HeaderType::GeoBroadcast(AreaType::Circular),
                    traffic_class: TrafficClass {
                        store_carry_forward: true,
                        channel_offload: false,
                        traffic_class_id: 3,
                    },
                    flags: 0x80,
                    payload_length: 8,
                    maximum_hop_limit: 10,
                    reserved_2: 0,
                }
            },
            result
        );
    }

    #[test]
    fn rejects_unknown_geobroadcast_subtype() {
        let data: &[u8] = &[0x20, 0x43, 0x03, 0x00, 0x00, 0x08, 0x0a, 0x00];
        assert!(matches!(
            CommonHeader::decode(data),
            Err(DecodeError::EnumError(_))
        ));
    }

    #[test]
    fn decodes_gbc_header_and_destination() {
        let result = GeoBroadcast::decode(GBC).unwrap();
        assert_eq!(44, result.bytes_consumed);
        let header = result.decoded;
        assert_eq!(7, header.sequence_number);
        assert_eq!(
            Address {
                manually_configured: true,
                station_type: StationType::PassengerCar,
                reserved: 0,
                address: [0x00, 0x60, 0xe0, 0x69, 0x57, 0x8d],
            },
            header.source_position_vector.gn_address
        );
        assert_eq!(
            Timestamp(542_947_520),
            header.source_position_vector.timestamp
        );
        assert_eq!(680, header.source_position_vector.speed);
        assert_eq!(2122, header.source_position_vector.heading);

        let center = GeoPosition {
            latitude: 488_000_000,
            longitude: 115_000_000,
        };
        assert_eq!(
            Ok(Area::Circle(Circle {
                center,
                radius: 500
            })),
            header.destination(HeaderType::GeoBroadcast(AreaType::Circular))
        );
        assert_eq!(
            Ok(Area::Rectangle(Rectangle {
                center,
                distance_a: 500,
                distance_b: 250,
                angle: 45
            })),
            header.destination(HeaderType::GeoBroadcast(AreaType::Rectangular))
        );
    }

    #[test]
    fn truncated_gbc_header_reports_missing_bytes() {
        assert_eq!(
            Err(DecodeError::Truncated(2)),
            GeoBroadcast::decode(&GBC[..40])
        );
    }

    #[test]
    fn decodes_variable_length() {
        let cases: &[(&[u8], usize)] = &[
            (&[0x00], 0),
            (&[0x7f], 127),
            (&[0x80, 0x80], 128),
            (&[0xbf, 0xff], 16_383),
            (&[0xc0, 0x40, 0x00], 16_384),
            (&[0xfd, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00], 1 << 48),
        ];
        for (input, expected) in cases {
            let (remaining, length) = decode_bytewise_variable_length(input).unwrap();
            assert!(remaining.is_empty());
            assert_eq!(*expected, length);
        }
        assert!(matches!(
            decode_bytewise_variable_length(&[0xff, 0x00]),
            Err(nom::Err::Error(DecodeError::ParserError(_)))
        ));
        let longer_than_needed: [&[u8]; 4] = [
            &[0x80, 0x05],
            &[0x80, 0x7f],
            &[0xc0, 0x00, 0x80],
            &[0xfe, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00],
        ];
        for input in longer_than_needed {
            assert!(matches!(
                decode_bytewise_variable_length(input),
                Err(nom::Err::Error(DecodeError::ParserError(_)))
            ));
        }
        assert_eq!(
            DecodeError::Truncated(2),
            DecodeError::from(decode_bytewise_variable_length(&[0xc0]).unwrap_err())
        );
    }

    #[test]
    fn decodes_opaque_recipient_info() {
        let data: &[u8] = &[
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x00, 0x03, 0xaa, 0xbb, 0xcc,
        ];
        let result = RecipientInfo::decode_with(data, SymmetricAlgorithm::Aes128Ccm).unwrap();
        pretty_assertions::assert_eq!(
            Decoded {
                bytes_consumed: 13,
                decoded: RecipientInfo {
                    cert_id: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
                    enc_key: EncryptedKey::opaque(&[0xaa, 0xbb, 0xcc]),
                }
            },
            result
        );
        assert_eq!(result.bytes_consumed, result.decoded.encoded_size());
    }

    #[test]
    fn rejects_opaque_key_with_padded_length() {
        let data: &[u8] = &[
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x00, 0x80, 0x03, 0xaa, 0xbb, 0xcc,
        ];
        assert!(matches!(
            RecipientInfo::decode_with(data, SymmetricAlgorithm::Aes128Ccm),
            Err(DecodeError::ParserError(_))
        ));
        let list: &[u8] = &[0x80, 0x00];
        assert!(matches!(
            RecipientInfoList::decode_with(list, SymmetricAlgorithm::Aes128Ccm),
            Err(DecodeError::ParserError(_))
        ));
    }

    #[test]
    fn decodes_ecies_recipient_info() {
        let data = ecies_record();
        let result =
            RecipientInfo::decode_with(data.as_slice(), SymmetricAlgorithm::Aes128Ccm).unwrap();
        assert_eq!(8 + 1 + 33 + 16 + 16, result.bytes_consumed);
        pretty_assertions::assert_eq!(
            RecipientInfo {
                cert_id: [0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7],
                enc_key: EncryptedKey::EciesNistP256(EciesNistP256EncryptedKey {
                    v: EccPoint::CompressedLsbY1(&[0x11; 32]),
                    c: &[0x22; 16],
                    t: [0x33; 16],
                }),
            },
            result.decoded
        );
        assert_eq!(
            PublicKeyAlgorithm::ECIES_NISTP256,
            result.decoded.pk_encryption()
        );
    }

    #[test]
    fn truncated_recipient_info_fails_at_every_boundary() {
        let data = ecies_record();
        for end in 0..data.len() {
            assert!(
                matches!(
                    RecipientInfo::decode_with(&data[..end], SymmetricAlgorithm::Aes128Ccm),
                    Err(DecodeError::Truncated(_))
                ),
                "decoding {end} bytes must fail"
            );
        }
        let opaque: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x03, 0xaa, 0xbb, 0xcc];
        for end in 0..opaque.len() {
            assert!(matches!(
                RecipientInfo::decode_with(&opaque[..end], SymmetricAlgorithm::Aes128Ccm),
                Err(DecodeError::Truncated(_))
            ));
        }
    }

    #[test]
    fn opaque_length_beyond_input_is_truncation() {
        let data: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0xbf, 0xff, 0x01, 0x02];
        assert_eq!(
            Err(DecodeError::Truncated(16_381)),
            RecipientInfo::decode_with(data, SymmetricAlgorithm::Aes128Ccm)
        );
    }

    #[test]
    fn unassigned_algorithms_take_the_opaque_branch() {
        let data: &[u8] = &[8, 7, 6, 5, 4, 3, 2, 1, 0xf0, 0x02, 0xde, 0xad, 0xff];
        let result = RecipientInfo::decode_with(data, SymmetricAlgorithm::Aes128Ccm).unwrap();
        assert_eq!(12, result.bytes_consumed);
        assert_eq!(
            EncryptedKey::Opaque {
                algorithm: PublicKeyAlgorithm(0xf0),
                key: &[0xde, 0xad],
            },
            result.decoded.enc_key
        );
        assert_eq!(PublicKeyAlgorithm(0xf0), result.decoded.pk_encryption());
    }

    #[test]
    fn rejects_unknown_point_type() {
        let mut data = ecies_record();
        data[9] = 0x01;
        assert!(matches!(
            RecipientInfo::decode_with(data.as_slice(), SymmetricAlgorithm::Aes128Ccm),
            Err(DecodeError::EnumError(_))
        ));
    }

    #[test]
    fn decodes_uncompressed_point() {
        let mut data = vec![0x04];
        data.extend_from_slice(&[0x01; 32]);
        data.extend_from_slice(&[0x02; 32]);
        let result = EccPoint::decode_with(data.as_slice(), PublicKeyAlgorithm::ECIES_NISTP256)
            .unwrap();
        assert_eq!(65, result.bytes_consumed);
        assert_eq!(
            EccPoint::Uncompressed {
                x: &[0x01; 32],
                y: &[0x02; 32]
            },
            result.decoded
        );
        assert!(matches!(
            EccPoint::decode_with(data.as_slice(), PublicKeyAlgorithm(7)),
            Err(DecodeError::EnumError(_))
        ));
    }

    #[test]
    fn decodes_recipient_list_with_shared_cursor() {
        let opaque: &[u8] = &[1, 1, 1, 1, 1, 1, 1, 1, 0x00, 0x01, 0x55];
        let ecies = ecies_record();
        let mut data = vec![(opaque.len() + ecies.len()) as u8];
        data.extend_from_slice(opaque);
        data.extend_from_slice(&ecies);
        data.push(0xee);

        let result =
            RecipientInfoList::decode_with(data.as_slice(), SymmetricAlgorithm::Aes128Ccm)
                .unwrap();
        assert_eq!(data.len() - 1, result.bytes_consumed);
        assert_eq!(2, result.decoded.0.len());
        assert_eq!(
            PublicKeyAlgorithm::ECDSA_NISTP256_WITH_SHA256,
            result.decoded.0[0].pk_encryption()
        );
        assert_eq!(
            PublicKeyAlgorithm::ECIES_NISTP256,
            result.decoded.0[1].pk_encryption()
        );
        assert_eq!(result.bytes_consumed, result.decoded.encoded_size());
    }

    #[test]
    fn recipient_overrunning_list_length_is_rejected() {
        let data: &[u8] = &[0x0a, 1, 1, 1, 1, 1, 1, 1, 1, 0x00, 0x02, 0x55, 0x66];
        assert!(matches!(
            RecipientInfoList::decode_with(data, SymmetricAlgorithm::Aes128Ccm),
            Err(DecodeError::ParserError(_))
        ));
    }

    #[test]
    fn decodes_encryption_parameters() {
        let data: &[u8] = &[0x00, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        assert_eq!(
            Ok(Decoded {
                bytes_consumed: 13,
                decoded: EncryptionParameters {
                    symmetric_algorithm: SymmetricAlgorithm::Aes128Ccm,
                    nonce: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
                }
            }),
            EncryptionParameters::decode(data)
        );
        assert!(matches!(
            EncryptionParameters::decode(&[0x05, 0, 0][..]),
            Err(DecodeError::EnumError(_))
        ));
    }
}
