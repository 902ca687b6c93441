//! Metadata extraction from release titles.
//!
//! Pure, case-insensitive regex extraction. These functions are referentially
//! transparent and used by every adapter, so they are tested exhaustively.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(FLAC|MP3|AAC|ALAC|OGG|Opus)\b").unwrap());
static BITRATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(320|256|192|V0|V2)(?:kbps)?\b").unwrap());
static SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(WEB|CD|Vinyl|DVD|BD)\b").unwrap());
static SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d,\.]+)\s*(GB|MB|KB)").unwrap());

/// Extracts music metadata from release titles.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract the audio format (FLAC, MP3, ...) from a title, uppercased.
    pub fn format(title: &str) -> Option<String> {
        FORMAT_RE
            .captures(title)
            .map(|c| c[1].to_ascii_uppercase())
    }

    /// Extract the bitrate marker (320, V0, ...) from a title, uppercased.
    pub fn bitrate(title: &str) -> Option<String> {
        BITRATE_RE
            .captures(title)
            .map(|c| c[1].to_ascii_uppercase())
    }

    /// Extract the source medium (WEB, CD, Vinyl, ...) from a title.
    /// "Vinyl" keeps its capitalization, everything else is uppercased.
    pub fn source_medium(title: &str) -> Option<String> {
        SOURCE_RE.captures(title).map(|c| {
            let medium = &c[1];
            if medium.eq_ignore_ascii_case("vinyl") {
                "Vinyl".to_string()
            } else {
                medium.to_ascii_uppercase()
            }
        })
    }

    /// Parse a human size string ("1.5 GB", "750 MB", "1,5 GB") into bytes.
    /// Comma is accepted as a decimal separator. Returns 0 on failure.
    pub fn parse_size(size_str: &str) -> u64 {
        let captures = match SIZE_RE.captures(size_str) {
            Some(c) => c,
            None => return 0,
        };

        let value: f64 = match captures[1].replace(',', ".").parse() {
            Ok(v) => v,
            Err(_) => return 0,
        };

        let multiplier = match captures[2].to_ascii_uppercase().as_str() {
            "GB" => 1024u64.pow(3),
            "MB" => 1024u64.pow(2),
            "KB" => 1024,
            _ => return 0,
        };

        (value * multiplier as f64) as u64
    }
}
