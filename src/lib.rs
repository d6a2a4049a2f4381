#![doc = include_str!("../README.md")]
#![cfg(not(doctest))]
#![cfg_attr(not(test), no_std)]
extern crate alloc;

use alloc::vec::Vec;
use core::fmt::{Debug, Display};

mod decode;
mod encode;
pub(crate) mod util;
#[cfg(feature = "validate")]
mod validate;

pub use decode::{Decode, DecodeError, DecodeWith, Decoded};
pub use encode::{Encode, EncodeError, EncodeWith, Encoder};
pub use util::length_coding_size;
#[cfg(feature = "validate")]
pub use validate::{Validate, ValidationError, ValidationResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

//**************************************************************************
//                     GeoNetworking (EN 302 636-4-1)
//**************************************************************************

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Address {
    /// This bit allows distinguishing between manually configured network address
    /// and the initial GeoNetworking address. M is set to 1 if the address is manually configured otherwise it equals 0.
    pub manually_configured: bool,
    /// ITS Station type
    pub station_type: StationType,
    /// Reserved, 10 bits wide
    pub reserved: u16,
    /// Represents the `LL_ADDR`
    pub address: [u8; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum StationType {
    Unknown = 0,
    Pedestrian = 1,
    Cyclist = 2,
    Moped = 3,
    Motorcycle = 4,
    PassengerCar = 5,
    Bus = 6,
    LightTruck = 7,
    HeavyTruck = 8,
    Trailer = 9,
    SpecialVehicle = 10,
    Tram = 11,
    RoadSideUnit = 15,
}

impl TryFrom<u8> for StationType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Pedestrian),
            2 => Ok(Self::Cyclist),
            3 => Ok(Self::Moped),
            4 => Ok(Self::Motorcycle),
            5 => Ok(Self::PassengerCar),
            6 => Ok(Self::Bus),
            7 => Ok(Self::LightTruck),
            8 => Ok(Self::HeavyTruck),
            9 => Ok(Self::Trailer),
            10 => Ok(Self::SpecialVehicle),
            11 => Ok(Self::Tram),
            15 => Ok(Self::RoadSideUnit),
            _ => Err(()),
        }
    }
}

/// Time in milliseconds at which the position was acquired:
/// TST = TST(TAI) % 2^32, counted from 2004-01-01 00:00:00.000 UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Timestamp(pub u32);

impl Timestamp {
    #[must_use]
    pub fn as_unix_timestamp(&self) -> u64 {
        u64::from(self.0) + 1_072_915_200_000
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct LongPositionVector {
    pub gn_address: Address,
    pub timestamp: Timestamp,
    /// WGS 84 latitude of the GeoAdhoc router reference position expressed in 1/10 micro degree
    pub latitude: i32,
    /// WGS 84 longitude of the GeoAdhoc router reference position expressed in 1/10 micro degree
    pub longitude: i32,
    /// Position accuracy indicator of the GeoAdhoc router reference position
    pub position_accuracy: bool,
    /// Speed of the GeoAdhoc router in signed units of 0,01 meter per second, 15 bits on the wire
    pub speed: i16,
    /// Heading of the GeoAdhoc router in unsigned units of 0,1 degree from North
    pub heading: u16,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct CommonHeader {
    /// Identifies the type of header immediately following the GeoNetworking headers
    pub next_header: NextAfterCommon,
    /// Reserved, 4 bits wide. Set to 0
    pub reserved_1: u8,
    /// Identifies the type and sub-type of the GeoNetworking header
    pub header_type_and_subtype: HeaderType,
    /// Traffic class that represents Facility-layer requirements on packet transport
    pub traffic_class: TrafficClass,
    /// Bit 0: Indicates whether the ITS-S is mobile or stationary
    /// Bit 1 to Bit 7: Reserved, set to 0
    pub flags: u8,
    /// Length of the GeoNetworking payload in octets
    pub payload_length: u16,
    /// The Maximum hop limit is not decremented by a GeoAdhoc router that forwards the packet
    pub maximum_hop_limit: u8,
    /// Reserved. Set to 0
    pub reserved_2: u8,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct TrafficClass {
    pub store_carry_forward: bool,
    pub channel_offload: bool,
    /// 6 bits wide
    pub traffic_class_id: u8,
}

/// Identifies the type of header immediately following the GeoNetworking Common Header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum NextAfterCommon {
    Any = 0,
    BTPA = 1,
    BTPB = 2,
    IPv6 = 3,
}

impl TryFrom<u8> for NextAfterCommon {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Any),
            1 => Ok(Self::BTPA),
            2 => Ok(Self::BTPB),
            3 => Ok(Self::IPv6),
            _ => Err(()),
        }
    }
}

/// Identifies the type of the GeoNetworking header
///
/// On the wire the header type (HT) occupies the upper and the sub-type (HST)
/// the lower nibble of a single octet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum HeaderType {
    Any,
    Beacon,
    GeoUnicast,
    /// Geographically-Scoped Anycast (GAC)
    GeoAnycast(AreaType),
    /// Geographically-Scoped broadcast (GBC)
    GeoBroadcast(AreaType),
    TopologicallyScopedBroadcast(BroadcastType),
    LocationService(LocationServiceType),
}

impl TryFrom<u8> for HeaderType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let area = |subtype: u8| match subtype {
            0 => Ok(AreaType::Circular),
            1 => Ok(AreaType::Rectangular),
            2 => Ok(AreaType::Ellipsoidal),
            _ => Err(value),
        };
        match (value >> 4, value & 0x0f) {
            (0, _) => Ok(Self::Any),
            (1, _) => Ok(Self::Beacon),
            (2, _) => Ok(Self::GeoUnicast),
            (3, subtype) => area(subtype).map(Self::GeoAnycast),
            (4, subtype) => area(subtype).map(Self::GeoBroadcast),
            (5, 0) => Ok(Self::TopologicallyScopedBroadcast(BroadcastType::SingleHop)),
            (5, 1) => Ok(Self::TopologicallyScopedBroadcast(BroadcastType::MultiHop)),
            (6, 0) => Ok(Self::LocationService(LocationServiceType::Request)),
            (6, 1) => Ok(Self::LocationService(LocationServiceType::Reply)),
            _ => Err(value),
        }
    }
}

impl From<HeaderType> for u8 {
    fn from(value: HeaderType) -> Self {
        let (ty, subtype) = match value {
            HeaderType::Any => (0, 0),
            HeaderType::Beacon => (1, 0),
            HeaderType::GeoUnicast => (2, 0),
            HeaderType::GeoAnycast(area) => (3, area as u8),
            HeaderType::GeoBroadcast(area) => (4, area as u8),
            HeaderType::TopologicallyScopedBroadcast(BroadcastType::SingleHop) => (5, 0),
            HeaderType::TopologicallyScopedBroadcast(BroadcastType::MultiHop) => (5, 1),
            HeaderType::LocationService(LocationServiceType::Request) => (6, 0),
            HeaderType::LocationService(LocationServiceType::Reply) => (6, 1),
        };
        ty << 4 | subtype
    }
}

/// Area type used in header subtypes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum AreaType {
    Circular = 0,
    Rectangular = 1,
    Ellipsoidal = 2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum BroadcastType {
    SingleHop,
    MultiHop,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum LocationServiceType {
    Request,
    Reply,
}

pub type GeoBroadcast = GeoAreaHeader;
pub type GeoAnycast = GeoAreaHeader;

/// Extended header shared by GeoBroadcast (GBC) and GeoAnycast (GAC) packets.
///
/// The destination area is stored shape-agnostic. Which shape the fields
/// describe is given by the header sub-type in the Common Header, see
/// [`GeoAreaHeader::destination`]. In case of a circular area the fields are set as follows:
/// 1) Distance a is set to the radius r.
/// 2) Distance b is set to 0.
/// 3) Angle is set to 0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct GeoAreaHeader {
    /// Index of the sent GBC/GAC packet, used to detect duplicate packets
    pub sequence_number: u16,
    /// Reserved. Set to 0
    pub reserved_1: u16,
    /// Long Position Vector containing the reference position of the source
    pub source_position_vector: LongPositionVector,
    /// WGS 84 latitude for the centre position of the geometric shape in 1/10 micro degree
    pub geo_area_position_latitude: i32,
    /// WGS 84 longitude for the centre position of the geometric shape in 1/10 micro degree
    pub geo_area_position_longitude: i32,
    /// Distance a of the geometric shape in meters
    pub distance_a: u16,
    /// Distance b of the geometric shape in meters
    pub distance_b: u16,
    /// Angle of the geometric shape in degrees from North
    pub angle: u16,
    /// Reserved. Set to 0
    pub reserved_2: u16,
}

/// Returned when a header type does not denote a geographical area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidHeaderType(pub HeaderType);

impl Display for InvalidHeaderType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid GBC header type {:?}", self.0)
    }
}

impl core::error::Error for InvalidHeaderType {}

impl GeoAreaHeader {
    /// Interprets the stored area fields as the shape selected by a GeoBroadcast header type.
    ///
    /// Fails for every header type other than `HeaderType::GeoBroadcast(_)`.
    /// ### Usage
    /// ```ignore
    /// let area = gbc.destination(common.header_type_and_subtype)?;
    /// ```
    pub fn destination(&self, header_type: HeaderType) -> Result<Area, InvalidHeaderType> {
        match header_type {
            HeaderType::GeoBroadcast(area_type) => Ok(self.area_as(area_type)),
            other => {
                log::debug!("Refusing GBC destination for header type {other:?}");
                Err(InvalidHeaderType(other))
            }
        }
    }

    /// Same as [`GeoAreaHeader::destination`] for GeoAnycast header types
    pub fn anycast_destination(&self, header_type: HeaderType) -> Result<Area, InvalidHeaderType> {
        match header_type {
            HeaderType::GeoAnycast(area_type) => Ok(self.area_as(area_type)),
            other => {
                log::debug!("Refusing GAC destination for header type {other:?}");
                Err(InvalidHeaderType(other))
            }
        }
    }

    /// Writes `area` into the shape-agnostic fields and returns the area type
    /// that has to be carried in the header sub-type.
    pub fn set_destination(&mut self, area: &Area) -> AreaType {
        let center = area.center();
        self.geo_area_position_latitude = center.latitude;
        self.geo_area_position_longitude = center.longitude;
        let (distance_a, distance_b, angle) = match area {
            Area::Circle(circle) => (circle.radius, 0, 0),
            Area::Rectangle(Rectangle {
                distance_a,
                distance_b,
                angle,
                ..
            })
            | Area::Ellipse(Ellipse {
                distance_a,
                distance_b,
                angle,
                ..
            }) => (*distance_a, *distance_b, *angle),
        };
        self.distance_a = distance_a;
        self.distance_b = distance_b;
        self.angle = angle;
        area.area_type()
    }

    fn area_as(&self, area_type: AreaType) -> Area {
        let center = GeoPosition {
            latitude: self.geo_area_position_latitude,
            longitude: self.geo_area_position_longitude,
        };
        match area_type {
            AreaType::Circular => Area::Circle(Circle {
                center,
                radius: self.distance_a,
            }),
            AreaType::Rectangular => Area::Rectangle(Rectangle {
                center,
                distance_a: self.distance_a,
                distance_b: self.distance_b,
                angle: self.angle,
            }),
            AreaType::Ellipsoidal => Area::Ellipse(Ellipse {
                center,
                distance_a: self.distance_a,
                distance_b: self.distance_b,
                angle: self.angle,
            }),
        }
    }
}

/// WGS 84 position in 1/10 micro degree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct GeoPosition {
    pub latitude: i32,
    pub longitude: i32,
}

/// Geographical destination area of a GBC/GAC packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Area {
    Circle(Circle),
    Rectangle(Rectangle),
    Ellipse(Ellipse),
}

impl Area {
    #[must_use]
    pub fn center(&self) -> GeoPosition {
        match self {
            Area::Circle(Circle { center, .. })
            | Area::Rectangle(Rectangle { center, .. })
            | Area::Ellipse(Ellipse { center, .. }) => *center,
        }
    }

    #[must_use]
    pub fn area_type(&self) -> AreaType {
        match self {
            Area::Circle(_) => AreaType::Circular,
            Area::Rectangle(_) => AreaType::Rectangular,
            Area::Ellipse(_) => AreaType::Ellipsoidal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Circle {
    pub center: GeoPosition,
    /// Radius in meters
    pub radius: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Rectangle {
    pub center: GeoPosition,
    /// Distance from the center to the short side in meters
    pub distance_a: u16,
    /// Distance from the center to the long side in meters
    pub distance_b: u16,
    /// Azimuth angle of the long side in degrees from North
    pub angle: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Ellipse {
    pub center: GeoPosition,
    /// Length of the semi-major axis in meters
    pub distance_a: u16,
    /// Length of the semi-minor axis in meters
    pub distance_b: u16,
    /// Azimuth angle of the semi-major axis in degrees from North
    pub angle: u16,
}

//**************************************************************************
//                 Security header fields (ETSI TS 103 097 v1.2.1)
//**************************************************************************

/// Low-order eight bytes of a certificate's SHA-256 digest
pub type HashedId8 = [u8; 8];

/// Length of the ECIES authentication tag
pub const AUTH_TAG_LENGTH: usize = 16;

/// Length of the CCM nonce in the encryption parameters
pub const NONCE_LENGTH: usize = 12;

/// Public key algorithm identifier, one octet on the wire.
///
/// Values other than the named constants are kept as they are, so records
/// using algorithms unknown to this crate can still be decoded and re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct PublicKeyAlgorithm(pub u8);

impl PublicKeyAlgorithm {
    pub const ECDSA_NISTP256_WITH_SHA256: Self = Self(0);
    pub const ECIES_NISTP256: Self = Self(1);

    /// Byte length of a single curve coordinate, `None` for unknown algorithms
    #[must_use]
    pub fn field_size(self) -> Option<usize> {
        match self {
            Self::ECDSA_NISTP256_WITH_SHA256 | Self::ECIES_NISTP256 => Some(32),
            _ => None,
        }
    }
}

/// Symmetric algorithm used to encrypt the payload of a message.
///
/// There is one symmetric algorithm per encrypted message; it is not repeated in
/// the individual [`RecipientInfo`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum SymmetricAlgorithm {
    Aes128Ccm = 0,
}

impl SymmetricAlgorithm {
    /// Key size, which is also the length of an encrypted key, in bytes
    #[must_use]
    pub fn field_size(self) -> usize {
        match self {
            SymmetricAlgorithm::Aes128Ccm => 16,
        }
    }
}

impl TryFrom<u8> for SymmetricAlgorithm {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SymmetricAlgorithm::Aes128Ccm),
            _ => Err(()),
        }
    }
}

/// Elliptic curve point, coordinates are as long as the field size of the
/// public key algorithm the point is used with.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum EccPoint<'input> {
    XCoordinateOnly(&'input [u8]),
    CompressedLsbY0(&'input [u8]),
    CompressedLsbY1(&'input [u8]),
    Uncompressed { x: &'input [u8], y: &'input [u8] },
}

impl EccPoint<'_> {
    /// Value of the point type octet
    #[must_use]
    pub fn point_type(&self) -> u8 {
        match self {
            EccPoint::XCoordinateOnly(_) => 0,
            EccPoint::CompressedLsbY0(_) => 2,
            EccPoint::CompressedLsbY1(_) => 3,
            EccPoint::Uncompressed { .. } => 4,
        }
    }

    #[must_use]
    pub fn x(&self) -> &[u8] {
        match self {
            EccPoint::XCoordinateOnly(x)
            | EccPoint::CompressedLsbY0(x)
            | EccPoint::CompressedLsbY1(x)
            | EccPoint::Uncompressed { x, .. } => x,
        }
    }

    #[must_use]
    pub fn encoded_size(&self) -> usize {
        match self {
            EccPoint::Uncompressed { x, y } => 1 + x.len() + y.len(),
            _ => 1 + self.x().len(),
        }
    }
}

/// Symmetric key encrypted with ECIES over NIST P-256
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct EciesNistP256EncryptedKey<'input> {
    /// Sender's ephemeral public key
    pub v: EccPoint<'input>,
    /// Encrypted symmetric key. Its length is the field size of the message's
    /// symmetric algorithm and is not transmitted.
    pub c: &'input [u8],
    /// Authentication tag
    pub t: [u8; AUTH_TAG_LENGTH],
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum EncryptedKey<'input> {
    EciesNistP256(EciesNistP256EncryptedKey<'input>),
    /// Key material for any other public key algorithm, carried with a length prefix.
    /// `algorithm` is the identifier found on the wire and must not be `ECIES_NISTP256`.
    Opaque {
        algorithm: PublicKeyAlgorithm,
        key: &'input [u8],
    },
}

impl<'input> EncryptedKey<'input> {
    /// Opaque key tagged as `ECDSA_NISTP256_WITH_SHA256`
    #[must_use]
    pub fn opaque(key: &'input [u8]) -> Self {
        EncryptedKey::Opaque {
            algorithm: PublicKeyAlgorithm::ECDSA_NISTP256_WITH_SHA256,
            key,
        }
    }
}

/// Per-recipient entry of an encrypted message
///
/// Carries the recipient's certificate identifier and the symmetric message key
/// encrypted for that recipient.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RecipientInfo<'input> {
    pub cert_id: HashedId8,
    pub enc_key: EncryptedKey<'input>,
}

impl<'input> RecipientInfo<'input> {
    #[must_use]
    pub fn new(cert_id: HashedId8, enc_key: EncryptedKey<'input>) -> Self {
        Self { cert_id, enc_key }
    }

    /// Public key algorithm announced on the wire for this record
    #[must_use]
    pub fn pk_encryption(&self) -> PublicKeyAlgorithm {
        match &self.enc_key {
            EncryptedKey::EciesNistP256(_) => PublicKeyAlgorithm::ECIES_NISTP256,
            EncryptedKey::Opaque { algorithm, .. } => *algorithm,
        }
    }

    /// Number of bytes this record occupies when encoded
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        let key_size = match &self.enc_key {
            EncryptedKey::EciesNistP256(key) => key.c.len() + key.t.len() + key.v.encoded_size(),
            EncryptedKey::Opaque { key, .. } => length_coding_size(key.len()) + key.len(),
        };
        self.cert_id.len() + 1 + key_size
    }
}

/// Recipient records of an encrypted message, prefixed on the wire by their
/// total length in bytes
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RecipientInfoList<'input>(pub Vec<RecipientInfo<'input>>);

impl RecipientInfoList<'_> {
    /// Sum of the encoded record sizes, without the length prefix
    #[must_use]
    pub fn content_size(&self) -> usize {
        self.0.iter().map(RecipientInfo::encoded_size).sum()
    }

    #[must_use]
    pub fn encoded_size(&self) -> usize {
        let content = self.content_size();
        length_coding_size(content) + content
    }
}

/// Symmetric algorithm and nonce shared by all recipients of an encrypted message
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct EncryptionParameters {
    pub symmetric_algorithm: SymmetricAlgorithm,
    pub nonce: [u8; NONCE_LENGTH],
}
