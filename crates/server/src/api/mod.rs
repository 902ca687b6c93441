mod handlers;
mod routes;
mod search;
mod ws;

pub use routes::create_router;
pub use search::{RankedSourceWire, SearchResponseWire, SourceWire};
