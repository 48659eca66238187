//! Byte-encoding detection for delimited text.
//!
//! Detection order:
//! 1. BOM
//! 2. UTF-8 validation over the sniff window
//! 3. chardetng statistical detection, accepted only when confident
//! 4. trial-decoding a short leading window with each fallback encoding

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::Serialize;
use std::fmt;

/// Probed in order when statistical detection is not confident. WHATWG maps the
/// latin-1, cp1252 and iso-8859-1 labels onto windows-1252.
const FALLBACK_ENCODINGS: &[&Encoding] = &[UTF_8, WINDOWS_1252];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Bom,
    Utf8,
    Statistical,
    Probe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedEncoding {
    pub encoding: &'static Encoding,
    pub method: DetectionMethod,
}

impl fmt::Display for DetectedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoding.name())
    }
}

/// Detect the encoding of `bytes`, looking at most at `sniff_bytes` for detection
/// and `probe_bytes` for fallback probing.
pub fn detect_encoding(bytes: &[u8], sniff_bytes: usize, probe_bytes: usize) -> DetectedEncoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return DetectedEncoding {
            encoding,
            method: DetectionMethod::Bom,
        };
    }

    let sample = &bytes[..bytes.len().min(sniff_bytes)];
    if is_utf8_prefix(sample) {
        return DetectedEncoding {
            encoding: UTF_8,
            method: DetectionMethod::Utf8,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, sample.len() == bytes.len());
    let (guess, confident) = detector.guess_assess(None, true);
    if confident {
        tracing::debug!(encoding = guess.name(), "statistical encoding detection");
        return DetectedEncoding {
            encoding: guess,
            method: DetectionMethod::Statistical,
        };
    }

    let window = &bytes[..bytes.len().min(probe_bytes)];
    for &candidate in FALLBACK_ENCODINGS {
        tracing::debug!(encoding = candidate.name(), "probing fallback encoding");
        if trial_decode(candidate, window) {
            return DetectedEncoding {
                encoding: candidate,
                method: DetectionMethod::Probe,
            };
        }
    }

    DetectedEncoding {
        encoding: guess,
        method: DetectionMethod::Statistical,
    }
}

/// Decode the whole buffer. A BOM overrides `encoding`. The flag reports
/// whether malformed sequences were replaced.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> (String, bool) {
    let (text, _, had_errors) = encoding.decode(bytes);
    (text.into_owned(), had_errors)
}

/// True if `bytes` is UTF-8, tolerating a sequence cut off at the end of the window.
fn is_utf8_prefix(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

fn trial_decode(encoding: &'static Encoding, window: &[u8]) -> bool {
    if encoding == UTF_8 {
        return is_utf8_prefix(window);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(window)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_bom() {
        let detected = detect_encoding(b"\xEF\xBB\xBFItem,2023\n", 10_000, 1_000);
        assert_eq!(detected.encoding, UTF_8);
        assert_eq!(detected.method, DetectionMethod::Bom);
        let (text, had_errors) = decode(b"\xEF\xBB\xBFItem,2023\n", detected.encoding);
        assert_eq!(text, "Item,2023\n");
        assert!(!had_errors);
    }

    #[test]
    fn test_plain_utf8() {
        let detected = detect_encoding("Kassa,€100\n".as_bytes(), 10_000, 1_000);
        assert_eq!(detected.encoding, UTF_8);
        assert_eq!(detected.method, DetectionMethod::Utf8);
    }

    #[test]
    fn test_truncated_utf8_at_window_edge() {
        let bytes = "ab€".as_bytes();
        // Cut inside the three-byte euro sign.
        assert!(is_utf8_prefix(&bytes[..3]));
        assert!(!is_utf8_prefix(b"ab\xFFcd"));
    }

    #[test]
    fn test_legacy_bytes_decode_as_single_byte_encoding() {
        // "Försäljning,Å" in windows-1252.
        let bytes = b"F\xF6rs\xE4ljning,\xC5\nKassa,100\n";
        let detected = detect_encoding(bytes, 10_000, 1_000);
        assert_ne!(detected.encoding, UTF_8);
        let (text, _) = decode(bytes, detected.encoding);
        assert!(text.starts_with("F"));
        assert!(text.contains("Kassa,100"));
    }

    #[test]
    fn test_windows_1252_probe_accepts_any_bytes() {
        assert!(trial_decode(WINDOWS_1252, b"\xF6\xE4\xC5"));
        assert!(!trial_decode(UTF_8, b"\xF6\xE4\xC5x"));
    }
}
