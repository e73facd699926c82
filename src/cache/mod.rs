mod feed_cache;
mod images;
mod view;

pub use feed_cache::{CacheSettings, FeedCache};
pub use images::ImageCache;
pub use view::{Snapshot, ViewKey, ViewState, VisibleView};
