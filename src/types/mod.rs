//! Public types for the Huginn API.

mod key;
mod metadata;
mod options;

pub use key::{CacheKey, MAX_IDENTIFIER_LEN, validate_item_id};
pub use metadata::{Format, Metadata, Thumbnail, estimate_download_time};
pub use options::FetchOptions;
