//! Program and data memory images.
//!
//! Two formats are accepted:
//!
//! - **Hex text**: whitespace separated 16-bit words in hexadecimal (an
//!   optional `0x` prefix is allowed). `#` and `//` start comments. A token
//!   `@addr` moves the load origin for the following words.
//! - **Binary**: raw little-endian 16-bit words loaded at address 0.
//!
//! ```text
//! # matadd inputs
//! @0  2000 2000 2000 2000 2000 2000 2000 2000
//! @8  4000 4000 4000 4000 4000 4000 4000 4000
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

/// Errors loading a memory image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid token '{token}'")]
    Parse { line: usize, token: String },

    #[error("binary image has odd length {0} (expected 16-bit words)")]
    OddLength(usize),

    #[error("{words} words at 0x{base:04X} exceed memory of {capacity} words")]
    TooLarge {
        base: u16,
        words: usize,
        capacity: usize,
    },
}

/// Contiguous run of words at a base address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub base: u16,
    pub words: Vec<u16>,
}

/// A memory image made of one or more segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryImage {
    pub segments: Vec<Segment>,
}

impl MemoryImage {
    /// Image holding `words` at address 0.
    pub fn from_words(words: impl Into<Vec<u16>>) -> Self {
        Self {
            segments: vec![Segment {
                base: 0,
                words: words.into(),
            }],
        }
    }

    /// Total number of words across segments.
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }

    /// Words of the image flattened from address 0, gaps zero-filled.
    pub fn flatten(&self) -> Vec<u16> {
        let end = self
            .segments
            .iter()
            .map(|s| s.base as usize + s.words.len())
            .max()
            .unwrap_or(0);
        let mut out = vec![0; end];
        for s in &self.segments {
            out[s.base as usize..s.base as usize + s.words.len()].copy_from_slice(&s.words);
        }
        out
    }

    /// Load an image file, choosing the format by extension (`.bin` is binary).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let io_err = |source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        };
        let is_binary = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("bin"))
            .unwrap_or(false);

        let image = if is_binary {
            read_binary_image(&std::fs::read(path).map_err(io_err)?)?
        } else {
            parse_hex_image(&std::fs::read_to_string(path).map_err(io_err)?)?
        };
        log::info!(
            "Loaded {} words in {} segment(s) from {}",
            image.word_count(),
            image.segments.len(),
            path.display()
        );
        Ok(image)
    }
}

fn parse_hex_word(token: &str) -> Option<u16> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u16::from_str_radix(digits, 16).ok()
}

/// Parse a hex text image.
pub fn parse_hex_image(text: &str) -> Result<MemoryImage, ImageError> {
    let mut image = MemoryImage::default();
    let mut current = Segment::default();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line
            .split('#')
            .next()
            .and_then(|l| l.split("//").next())
            .unwrap_or("");

        for token in line.split_whitespace() {
            let parse_err = || ImageError::Parse {
                line: idx + 1,
                token: token.to_string(),
            };
            if let Some(origin) = token.strip_prefix('@') {
                let base = parse_hex_word(origin).ok_or_else(parse_err)?;
                if !current.words.is_empty() {
                    image.segments.push(std::mem::take(&mut current));
                }
                current.base = base;
            } else {
                current.words.push(parse_hex_word(token).ok_or_else(parse_err)?);
            }
        }
    }

    if !current.words.is_empty() {
        image.segments.push(current);
    }
    Ok(image)
}

/// Decode a raw little-endian binary image.
pub fn read_binary_image(bytes: &[u8]) -> Result<MemoryImage, ImageError> {
    if bytes.len() % 2 != 0 {
        return Err(ImageError::OddLength(bytes.len()));
    }
    let mut cursor = Cursor::new(bytes);
    let mut words = Vec::with_capacity(bytes.len() / 2);
    while let Ok(word) = cursor.read_u16::<LittleEndian>() {
        words.push(word);
    }
    Ok(MemoryImage::from_words(words))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_words() {
        let image = parse_hex_image("50DE 300F\n0x9100 # comment\n// whole line\nF000").unwrap();
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].base, 0);
        assert_eq!(image.segments[0].words, vec![0x50DE, 0x300F, 0x9100, 0xF000]);
    }

    #[test]
    fn test_parse_origins() {
        let image = parse_hex_image("@0 2000 2000\n@8 4000\n").unwrap();
        assert_eq!(image.segments.len(), 2);
        assert_eq!(image.segments[1].base, 8);
        assert_eq!(image.flatten(), vec![0x2000, 0x2000, 0, 0, 0, 0, 0, 0, 0x4000]);
        assert_eq!(image.word_count(), 3);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_hex_image("0000\n12G4\n").unwrap_err();
        match err {
            ImageError::Parse { line, token } => {
                assert_eq!(line, 2);
                assert_eq!(token, "12G4");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_binary_little_endian() {
        let image = read_binary_image(&[0xDE, 0x50, 0x00, 0xF0]).unwrap();
        assert_eq!(image.segments[0].words, vec![0x50DE, 0xF000]);
        assert!(matches!(read_binary_image(&[1, 2, 3]), Err(ImageError::OddLength(3))));
    }

    #[test]
    fn test_from_file_hex() {
        let path = std::env::temp_dir().join(format!("atreides-image-{}.hex", std::process::id()));
        std::fs::write(&path, "@4 ABCD\n").unwrap();
        let image = MemoryImage::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(image.segments, vec![Segment { base: 4, words: vec![0xABCD] }]);
    }

    #[test]
    fn test_from_file_missing() {
        let err = MemoryImage::from_file("/nonexistent/atreides.hex").unwrap_err();
        assert!(matches!(err, ImageError::Io { .. }));
    }
}
