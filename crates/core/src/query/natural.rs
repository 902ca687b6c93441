//! Deterministic natural-language heuristics.
//!
//! `heuristic_parse` is the fallback tier of the query parser: no model, no
//! I/O, always produces a usable [`ParsedQuery`]. `convert_to_sql` rewrites
//! free text into the SQL-ish syntax for the ranked search service.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{ParsedQuery, SearchType};

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());
static YEAR_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(from\s+)?(19|20)\d{2}\b").unwrap());

const KNOWN_FORMATS: [&str; 4] = ["flac", "mp3", "aac", "alac"];

/// Parse free text into a [`ParsedQuery`] without any model assistance.
///
/// Separator splits are tried first; otherwise word-count heuristics apply.
/// Confidence reflects the branch taken, between 0.5 and 0.9.
pub fn heuristic_parse(query: &str) -> ParsedQuery {
    let year = YEAR_RE
        .captures(query)
        .and_then(|c| c[1].parse::<i32>().ok());
    let cleaned = YEAR_STRIP_RE.replace_all(query, "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    // Separator form: "artist - album", "artist / album", "artist | album"
    for separator in [" - ", " / ", " | "] {
        if let Some((left, right)) = cleaned.split_once(separator) {
            let artist = left.trim();
            let album = right.trim();
            if !artist.is_empty() && !album.is_empty() {
                return ParsedQuery {
                    artist: Some(artist.to_string()),
                    song: None,
                    album: Some(album.to_string()),
                    year,
                    search_type: SearchType::Album,
                    confidence: 0.8,
                    ambiguous: false,
                };
            }
        }
    }

    let words: Vec<&str> = cleaned.split_whitespace().collect();

    match words.len() {
        0 => ParsedQuery {
            year,
            ambiguous: true,
            confidence: 0.5,
            ..Default::default()
        },
        1 | 2 => ParsedQuery {
            artist: Some(words.join(" ")),
            song: None,
            album: None,
            year,
            search_type: SearchType::Artist,
            confidence: 0.6,
            ambiguous: words.len() == 1,
        },
        3 | 4 => ParsedQuery {
            artist: Some(words[0].to_string()),
            song: None,
            album: Some(words[1..].join(" ")),
            year,
            search_type: SearchType::Album,
            confidence: 0.7,
            ambiguous: false,
        },
        _ => {
            // Long query: two-word artist only when the second word looks
            // like part of a proper name.
            let second_capitalized = words[1]
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false);
            let (artist_words, confidence) = if second_capitalized {
                (2, 0.6)
            } else {
                (1, 0.5)
            };
            ParsedQuery {
                artist: Some(words[..artist_words].join(" ")),
                song: None,
                album: Some(words[artist_words..].join(" ")),
                year,
                search_type: SearchType::Album,
                confidence,
                ambiguous: true,
            }
        }
    }
}

/// Rewrite free text into the SQL-ish syntax.
///
/// Format keywords and years are lifted into WHERE clauses; the remaining
/// words are split into artist and album halves.
pub fn convert_to_sql(natural: &str) -> String {
    let mut text = natural.trim().to_lowercase();

    let mut format_filter = None;
    for format in KNOWN_FORMATS {
        if text.contains(format) {
            format_filter = Some(format.to_ascii_uppercase());
            text = text.replace(format, "").trim().to_string();
        }
    }

    let year = YEAR_RE
        .captures(&text)
        .and_then(|c| c[1].parse::<i32>().ok());
    if year.is_some() {
        text = YEAR_STRIP_RE.replace_all(&text, "").trim().to_string();
    }

    let words: Vec<&str> = text.split_whitespace().collect();

    let (query_type, artist, album) = if words.len() <= 2 {
        ("artist", title_case(&words.join(" ")), None)
    } else {
        let mid = words.len() / 2;
        (
            "album",
            title_case(&words[..mid].join(" ")),
            Some(title_case(&words[mid..].join(" "))),
        )
    };

    let mut clauses = Vec::new();
    if !artist.is_empty() {
        clauses.push(format!("artist=\"{}\"", artist));
    }
    if let Some(album) = album {
        clauses.push(format!("album=\"{}\"", album));
    }
    if let Some(year) = year {
        clauses.push(format!("year={}", year));
    }
    if let Some(format) = format_filter {
        clauses.push(format!("format=\"{}\"", format));
    }

    let mut sql = format!("SELECT {}", query_type);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY quality DESC LIMIT 50");
    sql
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
