use image::Rgb;

use crate::error::ValidationError;

/// The swatch color an uploaded image is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceColor {
    rgb: Rgb<u8>,
}

impl ReferenceColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { rgb: Rgb([r, g, b]) }
    }

    /// Builds a reference color from untrusted integer channels.
    pub fn from_channels(r: i64, g: i64, b: i64) -> Result<Self, ValidationError> {
        Ok(Self::new(
            Self::channel('r', r)?,
            Self::channel('g', g)?,
            Self::channel('b', b)?,
        ))
    }

    /// Parses `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, ValidationError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidHex(hex.to_string()));
        }
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| ValidationError::InvalidHex(hex.to_string()))?;
        Ok(Self::new(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        ))
    }

    pub fn rgb(&self) -> Rgb<u8> {
        self.rgb
    }

    fn channel(name: char, value: i64) -> Result<u8, ValidationError> {
        u8::try_from(value).map_err(|_| ValidationError::ChannelOutOfRange {
            channel: name,
            value,
        })
    }
}

impl From<Rgb<u8>> for ReferenceColor {
    fn from(rgb: Rgb<u8>) -> Self {
        Self { rgb }
    }
}
