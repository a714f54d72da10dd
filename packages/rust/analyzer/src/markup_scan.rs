//! Tier 2: markup analysis of a bounded page prefix.

use scraper::{Html, Selector};

use crate::rules::{MODERN_GENERATORS, OLD_GENERATORS, OLD_JS_LIBS, Verdict};

/// What the page markup tells us.
#[derive(Debug, Clone)]
pub struct MarkupFindings {
    pub verdict: Verdict,
    pub signals: Vec<String>,
    /// Generator meta content, when present.
    pub generator: Option<String>,
}

/// Signals that settle the question on their own.
const DEFINITIVE_OLD_SIGNALS: [&str; 9] = [
    "cms-wordpress-old",
    "cms-joomla-1",
    "cms-drupal-old",
    "editor-frontpage",
    "flash-embed",
    "frameset",
    "doctype-html3",
    "doctype-html4",
    "activex-embed",
];

/// Signals that suggest age but need company.
const PROBABLE_OLD_SIGNALS: [&str; 11] = [
    "no-viewport-meta",
    "table-layout",
    "font-tags",
    "center-tags",
    "marquee-tags",
    "blink-tags",
    "js-jquery-1",
    "js-prototype",
    "js-mootools",
    "doctype-xhtml",
    "excessive-inline-styles",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

/// Analyze a page's markup for age indicators. `html` is expected to be a
/// bounded prefix of the document; everything here tolerates truncation.
pub fn analyze_markup(html: &str) -> MarkupFindings {
    let doc = Html::parse_document(html);
    let mut signals: Vec<String> = Vec::new();
    let mut generator = None;

    // 1. Generator meta tag.
    let meta_sel = selector("meta[name]");
    for meta in doc.select(&meta_sel) {
        let Some(name) = meta.value().attr("name") else {
            continue;
        };
        if !name.eq_ignore_ascii_case("generator") {
            continue;
        }
        let content = meta.value().attr("content").unwrap_or_default();
        generator = Some(content.to_string());
        for (signal, _) in OLD_GENERATORS.matches(content) {
            signals.push(signal.to_string());
        }
        for (signal, _) in MODERN_GENERATORS.matches(content) {
            signals.push(format!("modern-{signal}"));
        }
        break;
    }

    // 2. Responsive viewport.
    let has_viewport = doc.select(&meta_sel).any(|m| {
        m.value()
            .attr("name")
            .is_some_and(|n| n.eq_ignore_ascii_case("viewport"))
    });
    if !has_viewport {
        signals.push("no-viewport-meta".into());
    }

    // 3. Legacy JS libraries, from script srcs and the raw prefix.
    let script_sel = selector("script[src]");
    let mut search_text: String = doc
        .select(&script_sel)
        .filter_map(|s| s.value().attr("src"))
        .collect::<Vec<_>>()
        .join(" ");
    search_text.push(' ');
    let mut end = html.len().min(50_000);
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    search_text.push_str(&html[..end]);
    for (signal, _) in OLD_JS_LIBS.matches(&search_text) {
        signals.push(signal.to_string());
    }

    // 4. Structure: table layouts, inline-style soup, framesets.
    let table_sel = selector("table");
    let nested_tables = doc
        .select(&table_sel)
        .filter(|t| t.select(&table_sel).next().is_some())
        .count();
    if nested_tables >= 2 {
        signals.push("table-layout".into());
    }

    let styled_sel = selector("[style]");
    if doc.select(&styled_sel).count() > 50 {
        signals.push("excessive-inline-styles".into());
    }

    if doc.select(&selector("frameset")).next().is_some()
        || doc.select(&selector("frame")).next().is_some()
    {
        signals.push("frameset".into());
    }

    // 5. Doctype, from the raw prefix.
    if let Some(signal) = doctype_signal(html) {
        signals.push(signal.into());
    }

    // 6. Deprecated presentational tags.
    for (tag, signal) in [
        ("font", "font-tags"),
        ("center", "center-tags"),
        ("marquee", "marquee-tags"),
        ("blink", "blink-tags"),
        ("basefont", "basefont-tags"),
        ("strike", "strike-tags"),
        ("applet", "applet-tags"),
    ] {
        if doc.select(&selector(tag)).next().is_some() {
            signals.push(signal.into());
        }
    }

    // 7. Flash and ActiveX embeds.
    signals.extend(flash_signals(&doc));

    // 8. Indicators of a current site.
    signals.extend(modern_signals(&doc, html));

    let verdict = decide(&signals);
    MarkupFindings {
        verdict,
        signals,
        generator,
    }
}

fn doctype_signal(html: &str) -> Option<&'static str> {
    let header: String = html.chars().take(500).collect::<String>().to_lowercase();
    if header.contains("xhtml 1.0") {
        return Some("doctype-xhtml");
    }
    if header.contains("html 4.01") {
        return Some("doctype-html4");
    }
    if header.contains("html 3.2") {
        return Some("doctype-html3");
    }
    if !header.contains("<!doctype") {
        return Some("no-doctype");
    }
    None
}

fn flash_signals(doc: &Html) -> Vec<String> {
    let mut signals = Vec::new();

    let object_sel = selector("object");
    let mut flash = false;
    let mut activex = false;
    for obj in doc.select(&object_sel) {
        let classid = obj.value().attr("classid").unwrap_or_default().to_lowercase();
        let type_attr = obj.value().attr("type").unwrap_or_default().to_lowercase();
        flash |= classid.contains("flash")
            || type_attr.contains("flash")
            || type_attr.contains("shockwave");
        activex |= classid.contains("clsid:");
    }

    let embed_sel = selector("embed");
    for embed in doc.select(&embed_sel) {
        let type_attr = embed.value().attr("type").unwrap_or_default().to_lowercase();
        let src = embed.value().attr("src").unwrap_or_default().to_lowercase();
        flash |= type_attr.contains("flash") || src.contains(".swf");
    }

    if flash {
        signals.push("flash-embed".into());
    }
    if activex {
        signals.push("activex-embed".into());
    }
    signals
}

fn modern_signals(doc: &Html, html: &str) -> Vec<String> {
    let mut signals = Vec::new();

    if doc
        .select(&selector("[itemtype]"))
        .any(|e| e.value().attr("itemtype").unwrap_or_default().contains("schema.org"))
    {
        signals.push("modern-schema-org".into());
    }

    let meta_prop_sel = selector("meta[property]");
    if doc.select(&meta_prop_sel).any(|m| {
        m.value()
            .attr("property")
            .unwrap_or_default()
            .to_lowercase()
            .starts_with("og:")
    }) {
        signals.push("modern-open-graph".into());
    }

    let meta_name_sel = selector("meta[name]");
    if doc.select(&meta_name_sel).any(|m| {
        m.value()
            .attr("name")
            .unwrap_or_default()
            .to_lowercase()
            .starts_with("twitter:")
    }) {
        signals.push("modern-twitter-cards".into());
    }

    let lower = html.to_lowercase();
    if lower.contains("serviceworker") || lower.contains("service-worker") {
        signals.push("modern-service-worker".into());
    }

    let style_sel = selector("style");
    let style_text: String = doc
        .select(&style_sel)
        .flat_map(|s| s.text())
        .collect::<Vec<_>>()
        .join(" ");
    if style_text.contains("display: flex")
        || style_text.contains("display:flex")
        || style_text.contains("display: grid")
        || style_text.contains("display:grid")
    {
        signals.push("modern-css-layout".into());
    }

    if doc.select(&selector("#__next")).next().is_some()
        || doc.select(&selector("#__nuxt")).next().is_some()
        || doc.select(&selector("[data-reactroot]")).next().is_some()
    {
        signals.push("modern-spa-framework".into());
    }

    signals
}

fn decide(signals: &[String]) -> Verdict {
    let definitive_old = signals
        .iter()
        .any(|s| DEFINITIVE_OLD_SIGNALS.iter().any(|d| s == d));
    if definitive_old {
        return Verdict::DefinitelyStale;
    }

    let probable_old = signals
        .iter()
        .filter(|s| PROBABLE_OLD_SIGNALS.iter().any(|p| s == p))
        .count();
    let modern = signals.iter().filter(|s| s.starts_with("modern-")).count();

    if probable_old >= 2 {
        return Verdict::LikelyStale;
    }
    if probable_old == 1 && modern == 0 {
        return Verdict::LikelyStale;
    }
    if modern >= 1 {
        return Verdict::LikelyModern;
    }
    Verdict::Inconclusive
}
