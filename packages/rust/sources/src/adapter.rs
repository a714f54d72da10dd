//! The adapter seam between upstream sites and the pipeline.

use async_trait::async_trait;

use leadscout_governor::RateGovernor;
use leadscout_shared::{Entity, RawListing, Result, Source};

/// One upstream business-data source.
///
/// Implementations must route every request through the governor they are
/// handed and fail per-item: a broken detail page is that record's problem,
/// not the page's.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter speaks for.
    fn source(&self) -> Source;

    /// Short human-readable name for logs.
    fn name(&self) -> &'static str;

    /// Fetch one page of search results for an industry in a city.
    ///
    /// Returns `Ok(None)` once pagination is exhausted; an empty page and a
    /// missing page both mean "no more results".
    async fn search_page(
        &self,
        governor: &RateGovernor,
        industry: &str,
        city: &str,
        page: u32,
    ) -> Result<Option<Vec<RawListing>>>;

    /// Resolve a search listing into a full entity via its detail page.
    async fn detail(
        &self,
        governor: &RateGovernor,
        listing: &RawListing,
        city: &str,
    ) -> Result<Entity>;
}
