use alloc::{format, string::String};
use core::fmt::Display;

use bitvec::prelude::*;
use nom_bitvec::BSlice;
use num_traits::ToBytes;

use crate::util::write_into_vec_left_padded;

use super::*;

#[derive(Debug, PartialEq)]
pub enum EncodeError {
    Unsupported(String),
    Common(String),
    #[cfg(feature = "json")]
    Json(String),
}

impl EncodeError {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unsupported(message) | Self::Common(message) => message,
            #[cfg(feature = "json")]
            Self::Json(message) => message,
        }
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Default)]
pub struct Encoder {
    bits: BitVec<u8, Msb0>,
}

impl Encoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bits: bitvec![u8, Msb0;],
        }
    }
}

impl From<Encoder> for Vec<u8> {
    fn from(val: Encoder) -> Self {
        let mut vec = alloc::vec![];
        write_into_vec_left_padded(BSlice(val.bits.as_bitslice()), &mut vec);
        vec
    }
}

impl From<Encoder> for bytes::Bytes {
    fn from(val: Encoder) -> Self {
        <Encoder as core::convert::Into<Vec<u8>>>::into(val).into()
    }
}

impl From<Encoder> for BitVec<u8, Msb0> {
    fn from(val: Encoder) -> Self {
        val.bits
    }
}

pub trait Encode {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError>;

    fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut encoder = Encoder::new();
        self.encode(&mut encoder)?;
        Ok(encoder.into())
    }

    #[cfg(feature = "json")]
    fn encode_to_json(&self) -> Result<String, EncodeError>
    where
        Self: Sized + Serialize,
    {
        serde_json::to_string(self)
            .map_err(|e| EncodeError::Json(format!("Error encoding JSON: {e:?}")))
    }
}

/// Encoding of records whose layout depends on parameters that are not part of the record
pub trait EncodeWith<P> {
    fn encode_with(&self, params: P, output: &mut Encoder) -> Result<(), EncodeError>;

    fn encode_to_vec_with(&self, params: P) -> Result<Vec<u8>, EncodeError> {
        let mut encoder = Encoder::new();
        self.encode_with(params, &mut encoder)?;
        Ok(encoder.into())
    }
}

impl Encode for bool {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        output.bits.push(*self);
        Ok(())
    }
}

#[allow(clippy::unnecessary_wraps)]
fn write_as_int<I: num::Integer + ToBytes + Display>(
    integer: &I,
    bit_count: usize,
    output: &mut Encoder,
) -> Result<(), EncodeError> {
    let bytes = integer.to_be_bytes();
    let bits = bytes.as_bits::<Msb0>();
    output
        .bits
        .extend_from_bitslice(&bits[(bits.len() - bit_count)..bits.len()]);
    Ok(())
}

/// Writes an unsigned value into fewer bits than its type has, rejecting values that do not fit
fn write_as_narrow_int<I: num::Integer + num::Unsigned + ToBytes + Display + Into<u64> + Copy>(
    integer: &I,
    bit_count: usize,
    output: &mut Encoder,
) -> Result<(), EncodeError> {
    let value: u64 = (*integer).into();
    if value >> bit_count != 0 {
        return Err(EncodeError::Common(format!(
            "Integer value {integer} does not fit into {bit_count} bits!"
        )));
    }
    write_as_int(integer, bit_count, output)
}

impl<const SIZE: usize> Encode for [u8; SIZE] {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        output.bits.extend_from_bitslice(self.view_bits::<Msb0>());
        Ok(())
    }
}

impl Encode for &'_ [u8] {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        output.bits.extend_from_bitslice(self.as_bits::<Msb0>());
        Ok(())
    }
}

// =====================================================
// GeoNetworking
// =====================================================

impl Encode for Timestamp {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        write_as_int(&self.0, 32, output)
    }
}

impl Encode for StationType {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        write_as_int(&(*self as u8), 5, output)
    }
}

impl Encode for Address {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        self.manually_configured.encode(output)?;
        self.station_type.encode(output)?;
        write_as_narrow_int(&self.reserved, 10, output)?;
        self.address.encode(output)
    }
}

impl Encode for LongPositionVector {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        if !(-(1 << 14)..(1 << 14)).contains(&self.speed) {
            return Err(EncodeError::Common(format!(
                "Speed {} does not fit into 15 bits!",
                self.speed
            )));
        }
        self.gn_address.encode(output)?;
        self.timestamp.encode(output)?;
        write_as_int(&self.latitude, 32, output)?;
        write_as_int(&self.longitude, 32, output)?;
        self.position_accuracy.encode(output)?;
        write_as_int(&self.speed, 15, output)?;
        write_as_int(&self.heading, 16, output)
    }
}

impl Encode for TrafficClass {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        self.store_carry_forward.encode(output)?;
        self.channel_offload.encode(output)?;
        write_as_narrow_int(&self.traffic_class_id, 6, output)
    }
}

impl Encode for NextAfterCommon {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        write_as_int(&(*self as u8), 4, output)
    }
}

impl Encode for HeaderType {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        write_as_int(&u8::from(*self), 8, output)
    }
}

impl Encode for CommonHeader {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        self.next_header.encode(output)?;
        write_as_narrow_int(&self.reserved_1, 4, output)?;
        self.header_type_and_subtype.encode(output)?;
        self.traffic_class.encode(output)?;
        write_as_int(&self.flags, 8, output)?;
        write_as_int(&self.payload_length, 16, output)?;
        write_as_int(&self.maximum_hop_limit, 8, output)?;
        write_as_int(&self.reserved_2, 8, output)
    }
}

impl Encode for GeoAreaHeader {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        write_as_int(&self.sequence_number, 16, output)?;
        write_as_int(&self.reserved_1, 16, output)?;
        self.source_position_vector.encode(output)?;
        write_as_int(&self.geo_area_position_latitude, 32, output)?;
        write_as_int(&self.geo_area_position_longitude, 32, output)?;
        write_as_int(&self.distance_a, 16, output)?;
        write_as_int(&self.distance_b, 16, output)?;
        write_as_int(&self.angle, 16, output)?;
        write_as_int(&self.reserved_2, 16, output)
    }
}

// =====================================================
// ETSI TS 103 097 v1.2.1
// =====================================================

/// Variable length determinant (ETSI TS 103 097 v1.2.1, clause 4.1)
fn encode_variable_length(length: usize, output: &mut Encoder) -> Result<(), EncodeError> {
    let size = length_coding_size(length);
    if size > 8 {
        return Err(EncodeError::Unsupported(format!(
            "Length {length} exceeds the length coding range!"
        )));
    }
    let raw = (length as u64).to_be_bytes();
    let mut length_bytes = [0u8; 8];
    length_bytes[..size].copy_from_slice(&raw[(8 - size)..]);
    length_bytes[0] |= !(0xffu8 >> (size - 1));
    output.bits.extend_from_raw_slice(&length_bytes[..size]);
    Ok(())
}

impl Encode for PublicKeyAlgorithm {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        write_as_int(&self.0, 8, output)
    }
}

impl Encode for SymmetricAlgorithm {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        write_as_int(&(*self as u8), 8, output)
    }
}

impl Encode for EncryptionParameters {
    fn encode(&self, output: &mut Encoder) -> Result<(), EncodeError> {
        self.symmetric_algorithm.encode(output)?;
        self.nonce.encode(output)
    }
}

impl EncodeWith<PublicKeyAlgorithm> for EccPoint<'_> {
    fn encode_with(
        &self,
        pk_algo: PublicKeyAlgorithm,
        output: &mut Encoder,
    ) -> Result<(), EncodeError> {
        let field_size = pk_algo.field_size().ok_or_else(|| {
            EncodeError::Unsupported(format!(
                "No field size known for public key algorithm {}!",
                pk_algo.0
            ))
        })?;
        let coordinates_fit = match self {
            EccPoint::Uncompressed { x, y } => x.len() == field_size && y.len() == field_size,
            _ => self.x().len() == field_size,
        };
        if !coordinates_fit {
            return Err(EncodeError::Common(format!(
                "ECC point coordinates must be {field_size} bytes long!"
            )));
        }
        write_as_int(&self.point_type(), 8, output)?;
        self.x().encode(output)?;
        if let EccPoint::Uncompressed { y, .. } = self {
            y.encode(output)?;
        }
        Ok(())
    }
}

impl EncodeWith<SymmetricAlgorithm> for RecipientInfo<'_> {
    fn encode_with(
        &self,
        sym_algo: SymmetricAlgorithm,
        output: &mut Encoder,
    ) -> Result<(), EncodeError> {
        self.cert_id.encode(output)?;
        match &self.enc_key {
            EncryptedKey::EciesNistP256(key) => {
                if key.c.len() != sym_algo.field_size() {
                    return Err(EncodeError::Common(format!(
                        "Encrypted key of {} bytes does not match {:?}!",
                        key.c.len(),
                        sym_algo
                    )));
                }
                self.pk_encryption().encode(output)?;
                key.v.encode_with(PublicKeyAlgorithm::ECIES_NISTP256, output)?;
                key.c.encode(output)?;
                key.t.encode(output)
            }
            EncryptedKey::Opaque { algorithm, key } => {
                if *algorithm == PublicKeyAlgorithm::ECIES_NISTP256 {
                    return Err(EncodeError::Common(
                        "Opaque key must not be tagged as ECIES NIST P-256!".into(),
                    ));
                }
                algorithm.encode(output)?;
                encode_variable_length(key.len(), output)?;
                key.encode(output)
            }
        }
    }
}

impl EncodeWith<SymmetricAlgorithm> for RecipientInfoList<'_> {
    fn encode_with(
        &self,
        sym_algo: SymmetricAlgorithm,
        output: &mut Encoder,
    ) -> Result<(), EncodeError> {
        encode_variable_length(self.content_size(), output)?;
        for recipient in &self.0 {
            recipient.encode_with(sym_algo, output)?;
        }
        Ok(())
    }
}
