//! Generic adapter for paginated business directories.
//!
//! Directory sites share one shape: a search URL with industry, city, and
//! page slots; result pages listing businesses with a detail link; and
//! detail pages carrying contact data. The site-specific part is just the
//! URL template and CSS selectors, so those are configuration.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use leadscout_governor::{
    AcquireError, Lane, Outcome, RateGovernor, is_retryable_status, random_user_agent,
};
use leadscout_shared::{
    Address, Entity, LeadscoutError, RawListing, Result, Source, SourceId, WebsiteCheck,
    extract_postal_code,
};

use crate::adapter::SourceAdapter;

/// URL template and selector set for one directory site.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Site root, e.g. `https://directory.example`.
    pub base_url: String,
    /// Search path template with `{industry}`, `{city}`, `{page}` slots.
    pub search_path: String,
    /// One search result entry.
    pub result_item: String,
    /// Business name within a result entry.
    pub result_name: String,
    /// Detail link within a result entry.
    pub result_link: String,
    /// Phone within a result entry (optional field).
    pub result_phone: String,
    /// Address line within a result entry (optional field).
    pub result_address: String,
    /// Website link on the detail page.
    pub detail_website: String,
    /// Free-text description on the detail page.
    pub detail_description: String,
    /// A row of the opening-hours table on the detail page.
    pub detail_hours_row: String,
}

impl DirectoryConfig {
    /// Preset for the German yellow-pages directory layout.
    pub fn german_yellow_pages() -> Self {
        Self {
            base_url: "https://www.gelbeseiten.de".into(),
            search_path: "/suche/{industry}/{city}/seite-{page}".into(),
            result_item: "article[data-realid]".into(),
            result_name: "h2".into(),
            result_link: "h2 a, a[href*='/gsbiz/']".into(),
            result_phone: "a[href^='tel:'], span.mod-Treffer__phoneNumber".into(),
            result_address: "address, .mod-Treffer__address".into(),
            detail_website: "a[data-wipe-name='Website']".into(),
            detail_description: "[itemprop='description'], .mod-Beschreibung".into(),
            detail_hours_row: ".mod-Oeffnungszeiten tr, .oeffnungszeiten tr".into(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            search_path: "/suche/{industry}/{city}?seite={page}".into(),
            result_item: "article.result".into(),
            result_name: "h2".into(),
            result_link: "a.details".into(),
            result_phone: ".phone".into(),
            result_address: ".address".into(),
            detail_website: "a.website".into(),
            detail_description: ".description".into(),
            detail_hours_row: ".hours tr".into(),
        }
    }
}

/// A CSS-selector-driven directory source.
pub struct DirectoryAdapter {
    config: DirectoryConfig,
    client: Client,
    base: Url,
    host: String,
}

impl DirectoryAdapter {
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            LeadscoutError::config(format!("invalid directory base url {}: {e}", config.base_url))
        })?;
        let host = base
            .host_str()
            .ok_or_else(|| LeadscoutError::config("directory base url has no host"))?
            .to_string();

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LeadscoutError::Network(format!("failed to build HTTP client: {e}")))?;

        // Selectors are config; fail at construction, not mid-run.
        for css in [
            &config.result_item,
            &config.result_name,
            &config.result_link,
            &config.result_phone,
            &config.result_address,
            &config.detail_website,
            &config.detail_description,
            &config.detail_hours_row,
        ] {
            Selector::parse(css)
                .map_err(|e| LeadscoutError::config(format!("invalid selector {css}: {e:?}")))?;
        }

        Ok(Self {
            config,
            client,
            base,
            host,
        })
    }

    fn search_url(&self, industry: &str, city: &str, page: u32) -> Result<Url> {
        let path = self
            .config
            .search_path
            .replace("{industry}", &slugify(industry))
            .replace("{city}", &slugify(city))
            .replace("{page}", &page.to_string());
        self.base
            .join(&path)
            .map_err(|e| LeadscoutError::config(format!("bad search path {path}: {e}")))
    }

    async fn fetch(&self, governor: &RateGovernor, url: &Url) -> Result<String> {
        governor
            .acquire(&self.host, Lane::Primary)
            .await
            .map_err(|e| match e {
                AcquireError::Cancelled => LeadscoutError::Cancelled,
                AcquireError::SessionExpired => LeadscoutError::SessionExpired,
                AcquireError::DomainDegraded => {
                    LeadscoutError::Network(format!("no permit for {}: {e}", self.host))
                }
            })?;

        let request = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, random_user_agent());
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                governor.report(&self.host, Outcome::Error);
                return Err(LeadscoutError::Network(format!("GET {url}: {e}")));
            }
        };

        let status = response.status().as_u16();
        if is_retryable_status(status) {
            governor.report(&self.host, Outcome::Throttled(status));
            return Err(LeadscoutError::Network(format!("GET {url}: status {status}")));
        }
        governor.report(&self.host, Outcome::Ok);

        if !response.status().is_success() {
            return Err(LeadscoutError::Network(format!("GET {url}: status {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| LeadscoutError::Network(format!("read body of {url}: {e}")))
    }

    fn parse_search_page(&self, html: &str, industry: &str) -> Vec<RawListing> {
        let doc = Html::parse_document(html);
        let item_sel = parse_selector(&self.config.result_item);
        let name_sel = parse_selector(&self.config.result_name);
        let link_sel = parse_selector(&self.config.result_link);
        let phone_sel = parse_selector(&self.config.result_phone);
        let address_sel = parse_selector(&self.config.result_address);

        let mut listings = Vec::new();
        for item in doc.select(&item_sel) {
            let Some(name) = item
                .select(&name_sel)
                .next()
                .map(|n| collapse_whitespace(&n.text().collect::<String>()))
                .filter(|n| !n.is_empty())
            else {
                continue;
            };
            let Some(detail_url) = item
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| self.base.join(href).ok())
                .map(|u| u.to_string())
            else {
                warn!(name, "result entry without detail link, skipping");
                continue;
            };

            listings.push(RawListing {
                name,
                detail_url,
                phone: item
                    .select(&phone_sel)
                    .next()
                    .map(|p| collapse_whitespace(&p.text().collect::<String>()))
                    .filter(|p| !p.is_empty()),
                raw_address: item
                    .select(&address_sel)
                    .next()
                    .map(|a| collapse_whitespace(&a.text().collect::<String>()))
                    .filter(|a| !a.is_empty()),
                industry: Some(industry.to_string()),
                website_url: None,
                rating: None,
                rating_count: None,
            });
        }
        listings
    }

    fn parse_detail_page(&self, html: &str, listing: &RawListing, city: &str) -> Entity {
        let doc = Html::parse_document(html);

        let website_url = doc
            .select(&parse_selector(&self.config.detail_website))
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
            .or_else(|| listing.website_url.clone());

        let description = doc
            .select(&parse_selector(&self.config.detail_description))
            .next()
            .map(|d| collapse_whitespace(&d.text().collect::<String>()))
            .filter(|d| !d.is_empty());

        // Email is reliably a mailto link regardless of site layout.
        let email = doc
            .select(&parse_selector("a[href^=mailto]"))
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim_start_matches("mailto:").to_string())
            .filter(|e| e.contains('@'));

        let mut opening_hours = std::collections::BTreeMap::new();
        for row in doc.select(&parse_selector(&self.config.detail_hours_row)) {
            let cells: Vec<String> = row
                .select(&parse_selector("td"))
                .map(|c| collapse_whitespace(&c.text().collect::<String>()))
                .collect();
            if let [day, times] = cells.as_slice() {
                if !day.is_empty() && !times.is_empty() {
                    opening_hours.insert(day.clone(), times.clone());
                }
            }
        }

        let address = parse_address(listing.raw_address.as_deref().unwrap_or_default(), city);

        Entity {
            name: listing.name.clone(),
            industry: listing.industry.clone().unwrap_or_default(),
            description,
            address,
            phone: listing.phone.clone(),
            fax: None,
            email,
            website_url,
            website_check: WebsiteCheck::default(),
            rating: listing.rating,
            rating_count: listing.rating_count,
            opening_hours,
            sources: vec![SourceId::new(Source::Directory, listing.detail_url.clone())],
            fetched_at: Utc::now(),
        }
    }
}

#[async_trait]
impl SourceAdapter for DirectoryAdapter {
    fn source(&self) -> Source {
        Source::Directory
    }

    fn name(&self) -> &'static str {
        "directory"
    }

    #[instrument(skip_all, fields(industry, city, page))]
    async fn search_page(
        &self,
        governor: &RateGovernor,
        industry: &str,
        city: &str,
        page: u32,
    ) -> Result<Option<Vec<RawListing>>> {
        let url = self.search_url(industry, city, page)?;
        let html = self.fetch(governor, &url).await?;
        let listings = self.parse_search_page(&html, industry);
        debug!(page, count = listings.len(), "parsed search page");

        if listings.is_empty() {
            return Ok(None);
        }
        Ok(Some(listings))
    }

    async fn detail(
        &self,
        governor: &RateGovernor,
        listing: &RawListing,
        city: &str,
    ) -> Result<Entity> {
        let url = Url::parse(&listing.detail_url).map_err(|e| {
            LeadscoutError::parse(format!("bad detail url {}: {e}", listing.detail_url))
        })?;
        let html = self.fetch(governor, &url).await?;
        Ok(self.parse_detail_page(&html, listing, city))
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Selectors are validated at construction; re-parsing cannot fail.
fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match ch {
            'ä' => slug.push_str("ae"),
            'ö' => slug.push_str("oe"),
            'ü' => slug.push_str("ue"),
            'ß' => slug.push_str("ss"),
            c if c.is_alphanumeric() => slug.push(c),
            ' ' | '-' | '_' => slug.push('-'),
            _ => {}
        }
    }
    slug
}

/// Split a one-line address ("Hauptstraße 12, 44135 Dortmund") into parts.
/// Whatever doesn't parse stays empty; the search city is the fallback.
fn parse_address(raw: &str, fallback_city: &str) -> Address {
    let mut address = Address {
        city: fallback_city.to_string(),
        ..Address::default()
    };
    if raw.is_empty() {
        return address;
    }

    address.postal_code = extract_postal_code(raw);

    let segments: Vec<&str> = raw.split(',').map(str::trim).collect();
    if let Some(street_part) = segments.first().filter(|s| !s.is_empty()) {
        // Trailing token starting with a digit is the house number.
        match street_part.rsplit_once(' ') {
            Some((street, number)) if number.starts_with(|c: char| c.is_ascii_digit()) => {
                address.street = Some(street.to_string());
                address.house_number = Some(number.to_string());
            }
            _ => address.street = Some((*street_part).to_string()),
        }
    }

    // City is whatever follows the postal code.
    if let Some(postal) = &address.postal_code {
        if let Some(pos) = raw.find(postal.as_str()) {
            let after = raw[pos + postal.len()..].trim_matches([' ', ',']);
            if !after.is_empty() {
                address.city = after.to_string();
            }
        }
    }

    address
}

#[cfg(test)]
mod tests {
    use super::*;

    use leadscout_shared::config::{RateLimitsConfig, StealthConfig};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PAGE: &str = r#"<html><body>
      <article class="result">
        <h2>Salon Schmidt</h2>
        <a class="details" href="/eintrag/salon-schmidt">Details</a>
        <span class="phone">0231 123456</span>
        <span class="address">Hauptstraße 12, 44135 Dortmund</span>
      </article>
      <article class="result">
        <h2>Haarstudio Krause</h2>
        <a class="details" href="/eintrag/haarstudio-krause">Details</a>
        <span class="address">Marktplatz 3, 44137 Dortmund</span>
      </article>
    </body></html>"#;

    const DETAIL_PAGE: &str = r#"<html><body>
      <h1>Salon Schmidt</h1>
      <a class="website" href="https://salon-schmidt.de">Zur Website</a>
      <a href="mailto:info@salon-schmidt.de">E-Mail</a>
      <p class="description">Friseursalon im Zentrum von Dortmund.</p>
      <table class="hours">
        <tr><td>Mo-Fr</td><td>09:00-18:00</td></tr>
        <tr><td>Sa</td><td>09:00-13:00</td></tr>
      </table>
    </body></html>"#;

    fn governor() -> RateGovernor {
        let mut limits = RateLimitsConfig::default();
        limits.primary.delay_min_ms = 0;
        limits.primary.delay_max_ms = 0;
        limits.primary.pause_every = 0;
        RateGovernor::new(limits, StealthConfig::default(), CancellationToken::new())
    }

    fn adapter(base_url: &str) -> DirectoryAdapter {
        DirectoryAdapter::new(DirectoryConfig {
            base_url: base_url.to_string(),
            ..DirectoryConfig::default()
        })
        .expect("build adapter")
    }

    #[tokio::test]
    async fn search_page_parses_listings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/suche/friseur/dortmund"))
            .and(query_param("seite", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;

        let adapter = adapter(&server.uri());
        let gov = governor();
        let listings = adapter
            .search_page(&gov, "Friseur", "Dortmund", 1)
            .await
            .expect("search")
            .expect("page exists");

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].name, "Salon Schmidt");
        assert_eq!(listings[0].phone.as_deref(), Some("0231 123456"));
        assert!(listings[0].detail_url.ends_with("/eintrag/salon-schmidt"));
        assert_eq!(listings[0].industry.as_deref(), Some("Friseur"));
        assert!(listings[1].phone.is_none());
    }

    #[tokio::test]
    async fn empty_page_ends_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let adapter = adapter(&server.uri());
        let gov = governor();
        let page = adapter
            .search_page(&gov, "Friseur", "Dortmund", 99)
            .await
            .expect("search");
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn detail_resolves_full_entity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eintrag/salon-schmidt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let adapter = adapter(&server.uri());
        let gov = governor();
        let listing = RawListing {
            name: "Salon Schmidt".into(),
            detail_url: format!("{}/eintrag/salon-schmidt", server.uri()),
            phone: Some("0231 123456".into()),
            raw_address: Some("Hauptstraße 12, 44135 Dortmund".into()),
            industry: Some("Friseur".into()),
            website_url: None,
            rating: None,
            rating_count: None,
        };

        let entity = adapter
            .detail(&gov, &listing, "Dortmund")
            .await
            .expect("detail");

        assert_eq!(entity.name, "Salon Schmidt");
        assert_eq!(entity.email.as_deref(), Some("info@salon-schmidt.de"));
        assert_eq!(entity.website_url.as_deref(), Some("https://salon-schmidt.de"));
        assert_eq!(entity.address.street.as_deref(), Some("Hauptstraße"));
        assert_eq!(entity.address.house_number.as_deref(), Some("12"));
        assert_eq!(entity.address.postal_code.as_deref(), Some("44135"));
        assert_eq!(entity.address.city, "Dortmund");
        assert_eq!(entity.opening_hours.len(), 2);
        assert_eq!(
            entity.opening_hours.get("Mo-Fr").map(String::as_str),
            Some("09:00-18:00")
        );
    }

    #[tokio::test]
    async fn requests_identify_as_a_browser() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;

        let adapter = adapter(&server.uri());
        let gov = governor();
        adapter
            .search_page(&gov, "Friseur", "Dortmund", 1)
            .await
            .expect("search");

        let requests = server.received_requests().await.expect("requests");
        let ua = requests[0]
            .headers
            .get("user-agent")
            .expect("user-agent header")
            .to_str()
            .expect("ascii");
        assert!(ua.starts_with("Mozilla/5.0"), "got {ua}");
        assert!(leadscout_governor::USER_AGENTS.contains(&ua));
    }

    #[tokio::test]
    async fn server_error_reports_throttle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = adapter(&server.uri());
        let gov = governor();
        let err = adapter
            .search_page(&gov, "Friseur", "Dortmund", 1)
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn address_parsing() {
        let addr = parse_address("Hauptstraße 12a, 44135 Dortmund", "Essen");
        assert_eq!(addr.street.as_deref(), Some("Hauptstraße"));
        assert_eq!(addr.house_number.as_deref(), Some("12a"));
        assert_eq!(addr.postal_code.as_deref(), Some("44135"));
        assert_eq!(addr.city, "Dortmund");

        let addr = parse_address("", "Essen");
        assert_eq!(addr.city, "Essen");
        assert!(addr.street.is_none());
    }

    #[test]
    fn slug_handles_umlauts() {
        assert_eq!(slugify("Bäckerei"), "baeckerei");
        assert_eq!(slugify("Kfz Werkstatt"), "kfz-werkstatt");
    }
}
