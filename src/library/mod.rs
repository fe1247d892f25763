//! Media library access: asset resolution and directory listing.

pub mod asset;
pub mod listing;

pub use asset::{AssetLocator, MediaAsset, MediaKind};
pub use listing::{ListingCache, ListingFilter};
