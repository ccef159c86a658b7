//! Metadata store (§4.E): media records, the negative-match blacklist, the
//! weed map, and the multi-writer lock — all treated by the engine as one
//! opaque key-value interface keyed by `mediaid`.

mod error;
mod lock;
mod media_store;
mod negative_match;
mod weed;

pub use error::{Result, StoreError};
pub use lock::WriterLock;
pub use media_store::Store;
pub use negative_match::NegativeMatchMap;
pub use weed::WeedMap;
