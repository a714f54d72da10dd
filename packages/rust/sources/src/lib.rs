//! Business-data source adapters for LeadScout.
//!
//! A [`SourceAdapter`] turns one upstream site into the pipeline's common
//! shape: paginated raw search results plus a detail fetch that resolves a
//! listing into a full entity. Adapters own their site-specific parsing;
//! everything downstream is source-agnostic, and all network traffic goes
//! through the shared rate governor.

mod adapter;
mod directory;

pub use adapter::SourceAdapter;
pub use directory::{DirectoryAdapter, DirectoryConfig};
