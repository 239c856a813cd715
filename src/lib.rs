pub mod cache;
pub mod client;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod prefs;
pub mod query;

pub use cache::QueryCache;
pub use client::{ApiClient, ChartRequest};
pub use debounce::Debouncer;
pub use dispatch::{Dispatcher, Fetch};
pub use error::{ApiError, Result};
pub use prefs::{PreferenceStore, Schema};
pub use query::Query;
