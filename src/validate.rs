use alloc::{format, string::String};

use p256::{elliptic_curve::sec1::FromEncodedPoint, AffinePoint, EncodedPoint};

use crate::{
    EccPoint, EciesNistP256EncryptedKey, EncodeError, EncryptedKey, PublicKeyAlgorithm,
    RecipientInfo, RecipientInfoList,
};

pub trait Validate {
    ///  The `Validate` trait exposes a `validate` method that checks whether the implementing type is valid.
    /// `validate` runs the following checks:
    /// - Ephemeral ECIES keys have coordinates of the NIST P-256 field size
    /// - Ephemeral ECIES keys are points on the NIST P-256 curve
    /// #### Returns
    /// - `Ok(ValidationResult::Success)` if all checks passed successful
    /// - `Ok(ValidationResult::Failure { reason: String })` if a check failed
    /// - `Ok(ValidationResult::NotApplicable { info: &'static str })` if no validation checks were run
    /// - `Err(ValidationError)` if an internal error occured during validation
    fn validate(&self) -> Result<ValidationResult, ValidationError>;
}

#[derive(Debug, PartialEq)]
pub enum ValidationResult {
    Success,
    Failure { reason: String },
    NotApplicable { info: &'static str },
}

#[derive(Debug, PartialEq)]
pub enum ValidationError {
    InvalidInput(String),
    Unsupported(String),
    ReencodingError(String),
}

impl From<EncodeError> for ValidationError {
    fn from(value: EncodeError) -> Self {
        ValidationError::ReencodingError(value.message().into())
    }
}

fn sec1_bytes(point: &EccPoint<'_>) -> Option<alloc::vec::Vec<u8>> {
    let (tag, y) = match point {
        EccPoint::XCoordinateOnly(_) => return None,
        EccPoint::CompressedLsbY0(_) => (0x02, None),
        EccPoint::CompressedLsbY1(_) => (0x03, None),
        EccPoint::Uncompressed { y, .. } => (0x04, Some(y)),
    };
    let mut bytes = alloc::vec![tag];
    bytes.extend_from_slice(point.x());
    if let Some(y) = y {
        bytes.extend_from_slice(y);
    }
    Some(bytes)
}

impl Validate for EccPoint<'_> {
    fn validate(&self) -> Result<ValidationResult, ValidationError> {
        let field_size = PublicKeyAlgorithm::ECIES_NISTP256
            .field_size()
            .ok_or_else(|| ValidationError::Unsupported("NIST P-256 field size".into()))?;
        let coordinates_fit = match self {
            EccPoint::Uncompressed { x, y } => x.len() == field_size && y.len() == field_size,
            _ => self.x().len() == field_size,
        };
        if !coordinates_fit {
            return Ok(ValidationResult::Failure {
                reason: format!("ECC point coordinates must be {field_size} bytes long"),
            });
        }
        let Some(bytes) = sec1_bytes(self) else {
            return Ok(ValidationResult::NotApplicable {
                info: "The y coordinate of an x-only point cannot be recovered",
            });
        };
        let encoded = EncodedPoint::from_bytes(&bytes)
            .map_err(|e| ValidationError::InvalidInput(format!("Invalid SEC1 point: {e}")))?;
        if Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded)).is_some() {
            Ok(ValidationResult::Success)
        } else {
            log::warn!("Rejecting ECC point of type {} off the P-256 curve", self.point_type());
            Ok(ValidationResult::Failure {
                reason: "ECC point is not on the NIST P-256 curve".into(),
            })
        }
    }
}

impl Validate for EciesNistP256EncryptedKey<'_> {
    fn validate(&self) -> Result<ValidationResult, ValidationError> {
        self.v.validate()
    }
}

impl Validate for RecipientInfo<'_> {
    fn validate(&self) -> Result<ValidationResult, ValidationError> {
        match &self.enc_key {
            EncryptedKey::EciesNistP256(key) => key.validate(),
            EncryptedKey::Opaque { .. } => Ok(ValidationResult::NotApplicable {
                info: "Opaque keys are not validated",
            }),
        }
    }
}

impl Validate for RecipientInfoList<'_> {
    fn validate(&self) -> Result<ValidationResult, ValidationError> {
        let mut checked = false;
        for (index, recipient) in self.0.iter().enumerate() {
            match recipient.validate()? {
                ValidationResult::Success => checked = true,
                ValidationResult::Failure { reason } => {
                    return Ok(ValidationResult::Failure {
                        reason: format!("Recipient {index}: {reason}"),
                    })
                }
                ValidationResult::NotApplicable { .. } => (),
            }
        }
        if checked {
            Ok(ValidationResult::Success)
        } else {
            Ok(ValidationResult::NotApplicable {
                info: "No recipient carries a verifiable key",
            })
        }
    }
}
