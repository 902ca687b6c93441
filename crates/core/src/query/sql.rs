//! SQL-ish query syntax.
//!
//! ```text
//! SELECT album WHERE artist="Radiohead" AND year=1997 AND format="FLAC"
//! SELECT track WHERE title="Karma Police" ORDER BY seeders DESC LIMIT 10
//! SELECT album WHERE year BETWEEN 1990 AND 2000 AND seeders>=5
//! ```

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{MusicQuery, OrderBy, QueryType};

static SELECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SELECT\s+(album|track|artist|compilation)").unwrap());
static WHERE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)WHERE\s+(.+?)(?:\s+ORDER\s+BY|\s+LIMIT|$)").unwrap()
});
static ORDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ORDER\s+BY\s+(\w+)(?:\s+(ASC|DESC))?").unwrap());
static LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)LIMIT\s+(\d+)(?:\s+OFFSET\s+(\d+))?").unwrap());

static EQUALS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(\w+)\s*=\s*["']([^"']+)["']"#).unwrap());
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\w+)\s*=\s*(\d+)").unwrap());
static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\w+)\s+BETWEEN\s+(\d+)\s+AND\s+(\d+)").unwrap());
static COMPARISON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\w+)\s*([><=]+)\s*(\d+)").unwrap());

/// Parser for the SQL-ish music query syntax.
pub struct SqlParser;

impl SqlParser {
    /// Parse a SQL-ish query string. Returns `None` when the input has no
    /// recognizable `SELECT` clause. Unknown WHERE keys are ignored.
    pub fn parse(input: &str) -> Option<MusicQuery> {
        let select = SELECT_RE.captures(input)?;
        let query_type = match select[1].to_ascii_lowercase().as_str() {
            "album" => QueryType::Album,
            "track" => QueryType::Track,
            "artist" => QueryType::Artist,
            "compilation" => QueryType::Compilation,
            _ => return None,
        };

        let mut query = MusicQuery::new(query_type);

        if let Some(where_match) = WHERE_RE.captures(input) {
            Self::parse_where_clause(&where_match[1], &mut query);
        }

        if let Some(order) = ORDER_RE.captures(input) {
            query.order_by = match order[1].to_ascii_lowercase().as_str() {
                "quality" | "score" => OrderBy::Quality,
                "seeders" => OrderBy::Seeders,
                "size" => OrderBy::Size,
                "date" | "uploaded" => OrderBy::Date,
                "relevance" => OrderBy::Relevance,
                _ => OrderBy::Quality,
            };
            query.order_desc = order
                .get(2)
                .map(|d| d.as_str().eq_ignore_ascii_case("DESC"))
                .unwrap_or(true);
        }

        if let Some(limit) = LIMIT_RE.captures(input) {
            if let Ok(n) = limit[1].parse() {
                query.limit = n;
            }
            if let Some(offset) = limit.get(2) {
                query.offset = offset.as_str().parse().unwrap_or(0);
            }
        }

        Some(query)
    }

    fn parse_where_clause(clause: &str, query: &mut MusicQuery) {
        for captures in EQUALS_RE.captures_iter(clause) {
            let value = captures[2].to_string();
            match captures[1].to_ascii_lowercase().as_str() {
                "artist" | "name" => query.artist = Some(value),
                "album" | "release" => query.album = Some(value),
                "track" | "title" | "song" => query.track = Some(value),
                "format" => query.format = Some(value.to_ascii_uppercase()),
                "bitrate" => query.bitrate = Some(value),
                "source" => query.source = Some(value.to_ascii_uppercase()),
                "country" => query.country = Some(value),
                "label" => query.label = Some(value),
                _ => {}
            }
        }

        for captures in NUMBER_RE.captures_iter(clause) {
            let value: i64 = match captures[2].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            match captures[1].to_ascii_lowercase().as_str() {
                "year" => query.year = Some(value as i32),
                "limit" => query.limit = value.max(0) as usize,
                _ => {}
            }
        }

        for captures in RANGE_RE.captures_iter(clause) {
            if captures[1].eq_ignore_ascii_case("year") {
                if let (Ok(lo), Ok(hi)) = (captures[2].parse(), captures[3].parse()) {
                    query.year_range = Some((lo, hi));
                }
            }
        }

        for captures in COMPARISON_RE.captures_iter(clause) {
            let value: u64 = match captures[3].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let key = captures[1].to_ascii_lowercase();
            let op = &captures[2];
            match (key.as_str(), op) {
                ("seeders" | "seeds", ">=") => query.min_seeders = value as u32,
                ("size", ">=") => query.min_size_mb = Some(value),
                ("size", "<=") => query.max_size_mb = Some(value),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_album_query() {
        let query = SqlParser::parse(
            r#"SELECT album WHERE artist="Radiohead" AND album="OK Computer" AND format="FLAC""#,
        )
        .unwrap();

        assert_eq!(query.query_type, QueryType::Album);
        assert_eq!(query.artist.as_deref(), Some("Radiohead"));
        assert_eq!(query.album.as_deref(), Some("OK Computer"));
        assert_eq!(query.format.as_deref(), Some("FLAC"));
        assert_eq!(query.limit, 50);
        assert!(query.order_desc);
    }

    #[test]
    fn test_parse_track_with_order_and_limit() {
        let query = SqlParser::parse(
            r#"SELECT track WHERE title="Karma Police" ORDER BY seeders DESC LIMIT 10"#,
        )
        .unwrap();

        assert_eq!(query.query_type, QueryType::Track);
        assert_eq!(query.track.as_deref(), Some("Karma Police"));
        assert_eq!(query.order_by, OrderBy::Seeders);
        assert!(query.order_desc);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_parse_order_asc() {
        let query = SqlParser::parse(r#"SELECT album WHERE artist="x" ORDER BY size ASC"#).unwrap();
        assert_eq!(query.order_by, OrderBy::Size);
        assert!(!query.order_desc);
    }

    #[test]
    fn test_parse_year_and_range() {
        let query = SqlParser::parse(r#"SELECT album WHERE artist="Miles Davis" AND year=1959"#)
            .unwrap();
        assert_eq!(query.year, Some(1959));

        let query =
            SqlParser::parse("SELECT album WHERE year BETWEEN 1990 AND 2000").unwrap();
        assert_eq!(query.year_range, Some((1990, 2000)));
    }

    #[test]
    fn test_parse_comparisons() {
        let query = SqlParser::parse("SELECT album WHERE seeders>=10 AND size>=500 AND size<=2000")
            .unwrap();
        assert_eq!(query.min_seeders, 10);
        assert_eq!(query.min_size_mb, Some(500));
        assert_eq!(query.max_size_mb, Some(2000));
    }

    #[test]
    fn test_parse_limit_offset() {
        let query = SqlParser::parse("SELECT artist WHERE name=\"Bj\" LIMIT 25 OFFSET 50").unwrap();
        assert_eq!(query.limit, 25);
        assert_eq!(query.offset, 50);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let query = SqlParser::parse(r#"SELECT album WHERE artist="x" AND mood="happy""#).unwrap();
        assert_eq!(query.artist.as_deref(), Some("x"));
        assert!(query.label.is_none());
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let query = SqlParser::parse(r#"select Track where Song='Yesterday' order by quality"#)
            .unwrap();
        assert_eq!(query.query_type, QueryType::Track);
        assert_eq!(query.track.as_deref(), Some("Yesterday"));
        assert_eq!(query.order_by, OrderBy::Quality);
    }

    #[test]
    fn test_seeders_only_accepts_gte() {
        let query = SqlParser::parse("SELECT album WHERE seeders<=10").unwrap();
        assert_eq!(query.min_seeders, 0);
    }

    #[test]
    fn test_non_select_input_is_none() {
        assert!(SqlParser::parse("radiohead ok computer").is_none());
        assert!(SqlParser::parse("").is_none());
        assert!(SqlParser::parse("SELECT nonsense WHERE x=1").is_none());
    }
}
