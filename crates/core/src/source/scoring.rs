//! Unified quality scoring for music sources.
//!
//! The score is a pure function of the source's fields, bounded to
//! [0, 1000]. Torrents are scored on format + seeders + size; streams on
//! codec + bitrate + a flat source bonus. Recomputing the score for the
//! same source always yields the same value.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{MusicSource, SourceKind};

/// Upper bound of the quality scale.
pub const MAX_QUALITY_SCORE: f64 = 1000.0;

const HI_RES_24BIT_MARKERS: [&str; 7] = [
    "24/192", "24/176", "24/96", "24/88", "24BIT", "24-BIT", "24 BIT",
];
const HI_RES_16BIT_MARKERS: [&str; 3] = ["16/192", "16/96", "16/88"];

static VINYL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(vinyl|lp)\b").unwrap());

/// Compute the quality score for a source.
pub fn quality_score(source: &MusicSource) -> f64 {
    let score = if source.kind == SourceKind::Torrent {
        torrent_score(source)
    } else {
        stream_score(source)
    };
    score.min(MAX_QUALITY_SCORE)
}

fn torrent_score(source: &MusicSource) -> f64 {
    let format_bonus = torrent_format_bonus(source);

    let seeder_bonus = source
        .seeders
        .map(|s| (f64::from(s) * 2.0).min(100.0))
        .unwrap_or(0.0);

    let size_mb = source.size_bytes.unwrap_or(0) as f64 / (1024.0 * 1024.0);
    let size_bonus = (size_mb / 10.0).min(50.0);

    format_bonus + seeder_bonus + size_bonus
}

fn torrent_format_bonus(source: &MusicSource) -> f64 {
    let format = match &source.format {
        Some(f) => f.to_ascii_uppercase(),
        None => return 80.0,
    };

    let title_upper = source.title.to_ascii_uppercase();
    let bitrate_upper = source
        .bitrate
        .as_deref()
        .unwrap_or("")
        .to_ascii_uppercase();
    let contains_marker = |marker: &str| {
        title_upper.contains(marker) || bitrate_upper.contains(marker)
    };

    match format.as_str() {
        "FLAC" => {
            let mut bonus = 200.0;
            if contains_marker("DSD") {
                bonus += 100.0;
            } else if HI_RES_24BIT_MARKERS.iter().any(|m| contains_marker(m)) {
                bonus += 60.0;
            } else if HI_RES_16BIT_MARKERS.iter().any(|m| contains_marker(m)) {
                bonus += 30.0;
            }
            if VINYL_RE.is_match(&source.title) {
                bonus += 15.0;
            }
            bonus
        }
        "ALAC" => 190.0,
        _ => match &source.bitrate {
            Some(b) if b.contains("320") => 150.0,
            Some(b) if b.to_ascii_uppercase().contains("V0") => 140.0,
            Some(b) if b.contains("256") => 120.0,
            _ => 80.0,
        },
    }
}

fn stream_score(source: &MusicSource) -> f64 {
    stream_codec_bonus(source) + stream_bitrate_bonus(source) + 50.0
}

fn stream_codec_bonus(source: &MusicSource) -> f64 {
    if let Some(format) = &source.format {
        match format.to_ascii_uppercase().as_str() {
            "FLAC" => return 200.0,
            "OPUS" => return 160.0,
            "AAC" | "M4A" => return 140.0,
            "VORBIS" => return 120.0,
            "MP3" => return 100.0,
            _ => {}
        }
    }

    if let Some(codec) = &source.codec {
        let codec = codec.to_ascii_lowercase();
        if codec.contains("opus") {
            return 160.0;
        }
        if codec.contains("aac") {
            return 140.0;
        }
        if codec.contains("vorbis") {
            return 120.0;
        }
        if codec.contains("mp3") {
            return 100.0;
        }
    }

    80.0
}

fn stream_bitrate_bonus(source: &MusicSource) -> f64 {
    let bitrate = match &source.bitrate {
        Some(b) => b,
        None => return 50.0,
    };

    let digits = bitrate
        .to_ascii_lowercase()
        .replace("kbps", "")
        .replace('k', "");
    match digits.trim().parse::<f64>() {
        Ok(kbps) => (kbps / 320.0 * 100.0).min(100.0),
        Err(_) => 50.0,
    }
}
