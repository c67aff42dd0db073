//! steemx - Steem blockchain explorer core
//!
//! Turns raw blockchain data into what an explorer shows:
//! - **Operations**: [`operation`] decodes `[type, payload]` pairs into typed
//!   records and [`interpret`] writes one English sentence per operation,
//!   converting VESTS to Steem Power along the way
//! - **Live feed**: [`feed`] normalizes WebSocket block frames into a short,
//!   deduplicated, newest-first list and [`source_ws`] keeps the socket alive
//!
//! Around those sit the REST client ([`api`]), the exchange ticker
//! ([`ticker`]), the ecosystem listing ([`ecosystem`]) and a small polling
//! helper ([`poll`]).
//!
//! ## Usage
//!
//! ```bash
//! cargo run -- watch
//! cargo run -- history steemit --limit 20
//! ```

// Core modules (no I/O)
pub mod amount;
pub mod feed;
pub mod interpret;
pub mod operation;
pub mod types;
pub mod util_text;

// HTTP
pub mod api;
pub mod ecosystem;
pub mod net;
pub mod poll;
pub mod ticker;

pub mod config;

// WebSocket session (native-only)
#[cfg(feature = "native")]
pub mod source_ws;

pub use amount::Amount;
pub use feed::{BlockFeed, BlockSummary, FeedNormalizer};
pub use interpret::{describe, FixedRate, Interpreter, Markup, VestsConverter};
pub use operation::{Operation, OperationError, RawOperation};
