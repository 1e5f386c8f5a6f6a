//! Key/value entries and the requests that read and write them.

pub mod pair;
pub mod pairs;
pub mod query;

pub use pair::{armor, decode_value, encode_value, KvPair, MissingFieldPolicy};
pub use pairs::KvPairs;
pub use query::KvQuery;
