//! Encoding prober.
//!
//! Picks the first candidate encoding under which the leading bytes of a file
//! decode without error, and decodes whole files into line sequences. When no
//! candidate fits, UTF-8 with replacement characters is used and the fallback
//! is reported to the caller.

use crate::error::{ParserError, Result};
use crate::models::TextEncoding;
use encoding_rs::{DecoderResult, UTF_8, WINDOWS_1252};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Bytes that have no mapping in Windows-1252
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// Outcome of probing a byte sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingProbe {
    pub encoding: TextEncoding,
    /// No candidate decoded cleanly; decoding will substitute bad bytes
    pub fallback: bool,
}

/// Decoded file content split into lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Lines with their terminators stripped, otherwise unmodified
    pub lines: Vec<String>,
    /// Some bytes were replaced with U+FFFD during decoding
    pub replaced: bool,
}

/// Read up to `limit` leading bytes of a file
pub fn read_sample(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| ParserError::from_io(path, e))?;
    let mut sample = Vec::with_capacity(limit);
    file.take(limit as u64)
        .read_to_end(&mut sample)
        .map_err(|e| ParserError::from_io(path, e))?;
    Ok(sample)
}

/// Probe the leading `probe_bytes` of a file against `candidates`, in order
pub fn detect_encoding(
    path: &Path,
    candidates: &[TextEncoding],
    probe_bytes: usize,
) -> Result<EncodingProbe> {
    // One extra byte tells us whether the sample was cut short.
    let mut sample = read_sample(path, probe_bytes.saturating_add(1))?;
    let truncated = sample.len() > probe_bytes;
    sample.truncate(probe_bytes);

    let probe = probe_encoding(&sample, candidates, truncated);
    if probe.fallback {
        warn!(
            "No candidate encoding decoded {}; falling back to utf-8 with replacement",
            path.display()
        );
    } else {
        debug!("Detected encoding {} for {}", probe.encoding, path.display());
    }
    Ok(probe)
}

/// Pick the first candidate that decodes `sample`
///
/// `truncated` marks a sample cut from a longer file, so a multi-byte
/// sequence split at the sample boundary is not held against UTF-8.
pub fn probe_encoding(sample: &[u8], candidates: &[TextEncoding], truncated: bool) -> EncodingProbe {
    candidates
        .iter()
        .copied()
        .find(|&encoding| decodes_cleanly(sample, encoding, truncated))
        .map(|encoding| EncodingProbe {
            encoding,
            fallback: false,
        })
        .unwrap_or(EncodingProbe {
            encoding: TextEncoding::Utf8,
            fallback: true,
        })
}

/// True when `bytes` decode under `encoding` without substitution
pub fn decodes_cleanly(bytes: &[u8], encoding: TextEncoding, truncated: bool) -> bool {
    match encoding {
        TextEncoding::Utf8 => {
            let mut decoder = UTF_8.new_decoder_with_bom_removal();
            let capacity = decoder
                .max_utf8_buffer_length_without_replacement(bytes.len())
                .unwrap_or(bytes.len() * 3 + 16);
            let mut decoded = String::with_capacity(capacity);
            let (result, _) =
                decoder.decode_to_string_without_replacement(bytes, &mut decoded, !truncated);
            matches!(result, DecoderResult::InputEmpty)
        }
        TextEncoding::Cp1252 => !bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)),
        // Every byte maps onto U+0000..=U+00FF.
        TextEncoding::Latin1 | TextEncoding::Iso8859_1 => true,
    }
}

/// Decode a whole buffer, substituting bytes that do not decode
pub fn decode_bytes(bytes: &[u8], encoding: TextEncoding) -> (String, bool) {
    match encoding {
        TextEncoding::Utf8 => {
            let (text, replaced) = UTF_8.decode_with_bom_removal(bytes);
            (text.into_owned(), replaced)
        }
        TextEncoding::Cp1252 => {
            let (text, replaced) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text.into_owned(), replaced)
        }
        TextEncoding::Latin1 | TextEncoding::Iso8859_1 => {
            (encoding_rs::mem::decode_latin1(bytes).into_owned(), false)
        }
    }
}

/// Split decoded text into lines, stripping `\n` and `\r\n` terminators
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// Read and decode an entire file
pub fn read_lines(path: &Path, encoding: TextEncoding) -> Result<DecodedText> {
    let bytes = std::fs::read(path).map_err(|e| ParserError::from_io(path, e))?;
    let (text, replaced) = decode_bytes(&bytes, encoding);
    if replaced {
        warn!(
            "Undecodable bytes in {} were replaced while decoding as {}",
            path.display(),
            encoding
        );
    }
    Ok(DecodedText {
        lines: split_lines(&text),
        replaced,
    })
}
