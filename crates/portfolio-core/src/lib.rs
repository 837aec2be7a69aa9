//! Portfolio Core
//!
//! Validated input records for the direct-indexing engine: holdings, tax lots,
//! trades and realized gain/loss rows, plus the small parsing helpers the
//! loaders share (amounts, dates, money-market detection).

pub mod dates;
pub mod error;
pub mod money;
pub mod securities;
pub mod types;

pub use error::*;
pub use types::*;
