//! SSTable magic word detection.

use nom::{number::complete::be_u32, IResult};
use serde::Serialize;

use crate::error::{Error, Result};

/// Known format generations, high 16 bits of the magic word.
const GENERATIONS: [(u16, &str); 4] = [
    (0x6F61, "oa"),
    (0x6E62, "nb"),
    (0x6D63, "mc"),
    (0x6C64, "ld"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    pub format_name: String,
    pub version: u16,
    pub recognized: bool,
}

/// Inspect the leading magic word. An unknown generation tag is not an
/// error, the caller decides whether to proceed. Fewer than 4 bytes is
/// a structurally broken file and fails with `Corrupt`.
pub fn detect_format(input: &[u8]) -> Result<FormatInfo> {
    if input.len() < 4 {
        return Err(Error::corrupt(format!(
            "file too short for a magic word: {} bytes",
            input.len()
        )));
    }
    let magic = u32::from_be_bytes([input[0], input[1], input[2], input[3]]);
    let generation = (magic >> 16) as u16;
    let version = (magic & 0xFFFF) as u16;

    let info = match GENERATIONS.iter().find(|(tag, _)| *tag == generation) {
        Some((_, name)) => FormatInfo {
            format_name: format!("Cassandra '{name}' format"),
            version,
            recognized: true,
        },
        None => {
            tracing::warn!(magic, "unrecognized sstable magic");
            FormatInfo {
                format_name: "unknown".to_string(),
                version,
                recognized: false,
            }
        }
    };
    Ok(info)
}

/// nom-level magic consumption used by the Data.db parser.
pub fn magic(input: &[u8]) -> IResult<&[u8], u32> {
    be_u32(input)
}

/// The magic word fixtures are written with.
pub fn compose_magic(generation: &str, version: u16) -> Option<u32> {
    let tag = GENERATIONS
        .iter()
        .find(|(_, name)| *name == generation)
        .map(|(tag, _)| *tag)?;
    Some(((tag as u32) << 16) | version as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn recognizes_oa_generation() {
        let info = detect_format(&[0x6F, 0x61, 0x00, 0x01]).unwrap();
        assert!(info.recognized);
        assert_eq!(info.format_name, "Cassandra 'oa' format");
        assert_eq!(info.version, 1);
    }

    #[test]
    fn recognizes_every_known_generation() {
        for (tag, name) in GENERATIONS {
            let bytes = ((tag as u32) << 16 | 0x0002).to_be_bytes();
            let info = detect_format(&bytes).unwrap();
            assert!(info.recognized, "generation {name} not recognized");
            assert_eq!(info.version, 2);
        }
    }

    #[test]
    fn unknown_magic_is_not_an_error() {
        let info = detect_format(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert!(!info.recognized);
        assert_eq!(info.format_name, "unknown");
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let err = detect_format(&[0x6F, 0x61]).unwrap_err();
        assert_eq!(err.code, ErrorCode::Corrupt);
    }

    #[test]
    fn compose_round_trips() {
        let magic = compose_magic("nb", 7).unwrap();
        let info = detect_format(&magic.to_be_bytes()).unwrap();
        assert!(info.recognized);
        assert_eq!(info.version, 7);
        assert!(compose_magic("zz", 0).is_none());
    }
}
