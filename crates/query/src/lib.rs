//! Query/cache layer over the remote book API.
//!
//! Reads are cached per [`QueryKey`] and fetched at most once at a time per
//! key; writes invalidate the keys they affect on success.

pub mod books;
pub mod client;
pub mod key;
pub mod state;

pub use books::BookQueries;
pub use client::{QueryClient, QueryError, QueryOptions};
pub use key::QueryKey;
pub use state::QueryState;
