use derive_more::Deref;
use std::fmt;
use thiserror::Error;

/// Four-character atom identifier.
#[derive(Clone, Copy, Deref, PartialEq, Eq, Hash)]
pub struct FourCC(pub(crate) [u8; 4]);

impl FourCC {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        FourCC(*bytes)
    }

    pub fn into_bytes(self) -> [u8; 4] {
        self.0
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(value: [u8; 4]) -> Self {
        FourCC(value)
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

#[derive(Debug, Error)]
#[error("atom identifier must be exactly 4 ASCII characters, got {0:?}")]
pub struct MalformedIdentifier(pub String);

impl TryFrom<&str> for FourCC {
    type Error = MalformedIdentifier;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let bytes: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| MalformedIdentifier(value.to_owned()))?;
        if !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(MalformedIdentifier(value.to_owned()));
        }
        Ok(FourCC(bytes))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            std::str::from_utf8(&self.0)
                .map(|s| s.to_owned())
                .unwrap_or_else(|_| convert_mac_roman_to_utf8(&self.0))
        )
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

fn convert_mac_roman_to_utf8(bytes: &[u8]) -> String {
    let mut result = String::new();
    for &byte in bytes {
        match byte {
            0xA9 => result.push('©'), // Copyright symbol
            0xAE => result.push('®'), // Registered trademark symbol
            0x99 => result.push('™'), // Trademark symbol
            // For other bytes, treat as ASCII if valid, otherwise use replacement char
            b if b.is_ascii() => result.push(b as char),
            _ => result.push('�'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_str() {
        let fourcc = FourCC::try_from("mvhd").unwrap();
        assert_eq!(fourcc, b"mvhd");
    }

    #[test]
    fn test_try_from_str_rejects_wrong_length() {
        assert!(FourCC::try_from("mvh").is_err());
        assert!(FourCC::try_from("mvhd2").is_err());
    }

    #[test]
    fn test_try_from_str_rejects_non_ascii() {
        assert!(FourCC::try_from("mv\u{1}d").is_err());
    }

    #[test]
    fn test_display_mac_roman() {
        let fourcc = FourCC([0xA9, b'n', b'a', b'm']);
        assert_eq!(fourcc.to_string(), "©nam");
    }
}
