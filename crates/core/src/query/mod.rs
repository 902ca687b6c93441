//! Query parsing.
//!
//! Two structured query shapes: [`ParsedQuery`] is the intent record driving
//! the interactive discovery workflow; [`MusicQuery`] is the SQL-ish filter
//! set driving the ranked search service. Both have fully deterministic
//! parsers; the LLM tier in [`crate::advisor`] layers on top of these.

mod natural;
mod sql;
mod types;

pub use natural::{convert_to_sql, heuristic_parse};
pub use sql::SqlParser;
pub use types::{MusicQuery, OrderBy, ParsedQuery, QueryType, SearchType};
