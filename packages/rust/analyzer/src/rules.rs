//! Static rule tables consulted by the analysis tiers.
//!
//! Each table pairs a pattern with the signal name it emits and (where the
//! pattern alone settles the question) the verdict it implies. The tables
//! are data; the tier functions decide how to combine hits.

use std::sync::OnceLock;

use regex::RegexSet;

/// How strongly a single rule hit speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Conclusive evidence of an outdated or abandoned site.
    DefinitelyStale,
    /// Strong but not conclusive evidence of age.
    LikelyStale,
    /// A hosted site-builder page (counts as stale for lead purposes).
    Builder,
    /// Evidence of an actively maintained, current stack.
    LikelyModern,
    /// No conclusion either way.
    Inconclusive,
}

pub struct RuleTable {
    set: OnceLock<RegexSet>,
    patterns: &'static [(&'static str, &'static str, Verdict)],
}

impl RuleTable {
    const fn new(patterns: &'static [(&'static str, &'static str, Verdict)]) -> Self {
        Self {
            set: OnceLock::new(),
            patterns,
        }
    }

    fn regex_set(&self) -> &RegexSet {
        self.set.get_or_init(|| {
            RegexSet::new(self.patterns.iter().map(|(p, _, _)| format!("(?i){p}")))
                .unwrap_or_else(|e| panic!("invalid rule pattern: {e}"))
        })
    }

    /// All matching (signal, verdict) pairs for the input.
    pub fn matches(&self, input: &str) -> Vec<(&'static str, Verdict)> {
        self.regex_set()
            .matches(input)
            .into_iter()
            .map(|i| (self.patterns[i].1, self.patterns[i].2))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tier 0: URL rules
// ---------------------------------------------------------------------------

/// Dead or long-obsolete free-hosting platforms, matched against host+path.
pub static OBSOLETE_HOSTING: RuleTable = RuleTable::new(&[
    (r"\.geocities\.", "hosting-geocities", Verdict::DefinitelyStale),
    (r"\.tripod\.", "hosting-tripod", Verdict::DefinitelyStale),
    (r"\.angelfire\.", "hosting-angelfire", Verdict::DefinitelyStale),
    (r"\.fortunecity\.", "hosting-fortunecity", Verdict::DefinitelyStale),
    (r"\.homestead\.", "hosting-homestead", Verdict::DefinitelyStale),
    (r"\.bplaced\.", "hosting-bplaced", Verdict::LikelyStale),
    (r"\.beepworld\.", "hosting-beepworld", Verdict::DefinitelyStale),
    (r"\.de\.vu$", "domain-de-vu", Verdict::DefinitelyStale),
    (r"\.de\.to$", "domain-de-to", Verdict::DefinitelyStale),
    (r"\.co\.de$", "domain-co-de", Verdict::LikelyStale),
    (r"\.funpic\.", "hosting-funpic", Verdict::DefinitelyStale),
    (r"\.ohost\.", "hosting-ohost", Verdict::LikelyStale),
    (r"\.cwsurf\.", "hosting-cwsurf", Verdict::DefinitelyStale),
    (r"\.t-online\.de/home/", "hosting-t-online-home", Verdict::DefinitelyStale),
    (r"home\.t-online\.de", "hosting-t-online-home", Verdict::DefinitelyStale),
    (r"\.arcor\.de/", "hosting-arcor-home", Verdict::LikelyStale),
    (
        r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
        "ip-host",
        Verdict::LikelyStale,
    ),
]);

/// Hosted site builders. Not necessarily old, but never a bespoke site.
pub static SITE_BUILDERS: RuleTable = RuleTable::new(&[
    (r"\.jimdo\.com", "builder-jimdo", Verdict::Builder),
    (r"\.jimdofree\.com", "builder-jimdo-free", Verdict::Builder),
    (r"\.jimdosite\.com", "builder-jimdo-site", Verdict::Builder),
    (r"\.wixsite\.com", "builder-wix", Verdict::Builder),
    (r"\.wix\.com", "builder-wix", Verdict::Builder),
    (r"\.weebly\.com", "builder-weebly", Verdict::Builder),
    (r"\.squarespace\.com", "builder-squarespace", Verdict::Builder),
    (r"\.webnode\.", "builder-webnode", Verdict::Builder),
    (r"\.site123\.", "builder-site123", Verdict::Builder),
    (r"\.strikingly\.com", "builder-strikingly", Verdict::Builder),
    (r"\.wordpress\.com", "builder-wordpress-free", Verdict::Builder),
    (r"\.blogspot\.", "builder-blogspot", Verdict::Builder),
    (r"\.blogger\.com", "builder-blogger", Verdict::Builder),
    (r"\.tumblr\.com", "builder-tumblr", Verdict::Builder),
    (r"\.my-free-website\.", "builder-free-website", Verdict::Builder),
]);

/// Modern deployment platforms, matched against the host.
pub static MODERN_HOSTS: RuleTable = RuleTable::new(&[
    (r"\.vercel\.app", "host-vercel", Verdict::LikelyModern),
    (r"\.netlify\.app", "host-netlify", Verdict::LikelyModern),
    (r"\.github\.io", "host-github-pages", Verdict::LikelyModern),
    (r"\.pages\.dev", "host-cloudflare-pages", Verdict::LikelyModern),
    (r"\.herokuapp\.com", "host-heroku", Verdict::LikelyModern),
    (r"\.azurewebsites\.net", "host-azure", Verdict::LikelyModern),
    (r"\.web\.app", "host-firebase", Verdict::LikelyModern),
    (r"\.firebaseapp\.com", "host-firebase", Verdict::LikelyModern),
]);

/// URL path shapes typical of 90s/2000s provider webspace.
pub static SUSPICIOUS_PATHS: RuleTable = RuleTable::new(&[
    (r"/~\w+", "tilde-user-path", Verdict::Inconclusive),
    (r"/home/\w+", "home-user-path", Verdict::Inconclusive),
    (r"/users?/\w+", "users-path", Verdict::Inconclusive),
    (r"/members?/\w+", "members-path", Verdict::Inconclusive),
    (r"\.htm$", "htm-extension", Verdict::Inconclusive),
    (r"/cgi-bin/", "cgi-bin-path", Verdict::Inconclusive),
    (r"\.php3$", "php3-extension", Verdict::Inconclusive),
    (r"\.asp$", "classic-asp", Verdict::Inconclusive),
    (r"/default\.aspx?$", "default-aspx", Verdict::Inconclusive),
]);

// ---------------------------------------------------------------------------
// Tier 1: header rules
// ---------------------------------------------------------------------------

/// Old server banners in the `Server` header.
pub static OLD_SERVERS: RuleTable = RuleTable::new(&[
    (r"Apache/1\.", "server-apache-1", Verdict::DefinitelyStale),
    (r"Apache/2\.0", "server-apache-2-0", Verdict::LikelyStale),
    (r"Apache/2\.2", "server-apache-2-2", Verdict::LikelyStale),
    (r"Microsoft-IIS/[1-5]\.", "server-iis-old", Verdict::DefinitelyStale),
    (r"Microsoft-IIS/6\.", "server-iis-6", Verdict::DefinitelyStale),
    (r"Microsoft-IIS/7\.", "server-iis-7", Verdict::LikelyStale),
    (r"nginx/0\.", "server-nginx-0", Verdict::DefinitelyStale),
    (r"nginx/1\.[0-9]\.[0-9]+$", "server-nginx-early", Verdict::LikelyStale),
    (r"lighttpd/1\.[0-3]", "server-lighttpd-old", Verdict::LikelyStale),
    (r"Zeus", "server-zeus", Verdict::DefinitelyStale),
    (r"Netscape", "server-netscape", Verdict::DefinitelyStale),
    (r"Oracle-HTTP-Server", "server-oracle-http", Verdict::LikelyStale),
]);

/// Old platform fingerprints in `X-Powered-By`.
pub static OLD_PLATFORMS: RuleTable = RuleTable::new(&[
    (r"PHP/[1-4]\.", "platform-php-4", Verdict::DefinitelyStale),
    (r"PHP/5\.[0-3]", "platform-php-5-early", Verdict::DefinitelyStale),
    (r"PHP/5\.[4-6]", "platform-php-5-late", Verdict::LikelyStale),
    (r"ASP\.NET/[1-3]\.", "platform-aspnet-old", Verdict::LikelyStale),
    (r"Perl", "platform-perl-cgi", Verdict::LikelyStale),
    (r"mod_perl", "platform-mod-perl", Verdict::LikelyStale),
    (r"ColdFusion", "platform-coldfusion", Verdict::LikelyStale),
]);

/// Current server and framework fingerprints, matched against
/// `Server` and `X-Powered-By`.
pub static MODERN_STACKS: RuleTable = RuleTable::new(&[
    (r"nginx/1\.(1[89]|2[0-9])", "modern-nginx", Verdict::LikelyModern),
    (r"Apache/2\.4", "modern-apache-2-4", Verdict::LikelyModern),
    (r"cloudflare", "modern-cloudflare", Verdict::LikelyModern),
    (r"Vercel", "modern-vercel", Verdict::LikelyModern),
    (r"Netlify", "modern-netlify", Verdict::LikelyModern),
    (r"PHP/(7|8)\.", "modern-php", Verdict::LikelyModern),
    (r"Express", "modern-express", Verdict::LikelyModern),
    (r"Next\.js", "modern-nextjs", Verdict::LikelyModern),
    (r"gunicorn", "modern-gunicorn", Verdict::LikelyModern),
    (r"uvicorn", "modern-uvicorn", Verdict::LikelyModern),
]);

/// Security headers that current deployments typically send.
pub const SECURITY_HEADERS: [&str; 7] = [
    "strict-transport-security",
    "content-security-policy",
    "x-content-type-options",
    "x-frame-options",
    "x-xss-protection",
    "referrer-policy",
    "permissions-policy",
];

// ---------------------------------------------------------------------------
// Tier 2: markup rules
// ---------------------------------------------------------------------------

/// Old CMS versions and ancient editors in the generator meta tag.
pub static OLD_GENERATORS: RuleTable = RuleTable::new(&[
    (r"WordPress\s+[1-3]\.", "cms-wordpress-old", Verdict::DefinitelyStale),
    (r"WordPress\s+4\.", "cms-wordpress-4", Verdict::LikelyStale),
    (r"Joomla!\s+1\.", "cms-joomla-1", Verdict::DefinitelyStale),
    (r"Joomla!\s+2\.", "cms-joomla-2", Verdict::LikelyStale),
    (r"Joomla!\s+3\.[0-5]", "cms-joomla-3-early", Verdict::LikelyStale),
    (r"Drupal\s+[1-6]\b", "cms-drupal-old", Verdict::DefinitelyStale),
    (r"Drupal\s+7\b", "cms-drupal-7", Verdict::LikelyStale),
    (r"TYPO3\s+[1-6]\.", "cms-typo3-old", Verdict::LikelyStale),
    (r"Contao\s+[1-3]\.", "cms-contao-old", Verdict::LikelyStale),
    (r"REDAXO\s+[1-4]\.", "cms-redaxo-old", Verdict::LikelyStale),
    (r"WebsiteBaker", "cms-websitebaker", Verdict::LikelyStale),
    (r"CMSimple", "cms-cmsimple", Verdict::LikelyStale),
    (r"phpwcms", "cms-phpwcms", Verdict::LikelyStale),
    (r"Microsoft FrontPage", "editor-frontpage", Verdict::DefinitelyStale),
    (r"Dreamweaver", "editor-dreamweaver", Verdict::LikelyStale),
    (r"GoLive", "editor-golive", Verdict::DefinitelyStale),
    (r"Nvu", "editor-nvu", Verdict::DefinitelyStale),
    (r"KompoZer", "editor-kompozer", Verdict::DefinitelyStale),
    (r"Microsoft Word", "editor-ms-word", Verdict::DefinitelyStale),
]);

/// Current CMS versions and frameworks in the generator meta tag.
pub static MODERN_GENERATORS: RuleTable = RuleTable::new(&[
    (r"WordPress\s+[56]\.", "cms-wordpress-modern", Verdict::LikelyModern),
    (r"Joomla!\s+[45]\.", "cms-joomla-modern", Verdict::LikelyModern),
    (r"Drupal\s+([89]|10)", "cms-drupal-modern", Verdict::LikelyModern),
    (r"TYPO3\s+(1[0-3]|[89])\.", "cms-typo3-modern", Verdict::LikelyModern),
    (r"Shopify", "cms-shopify", Verdict::LikelyModern),
    (r"Webflow", "cms-webflow", Verdict::LikelyModern),
    (r"Next\.js", "framework-nextjs", Verdict::LikelyModern),
    (r"Gatsby", "framework-gatsby", Verdict::LikelyModern),
]);

/// Legacy JavaScript libraries referenced from the page.
pub static OLD_JS_LIBS: RuleTable = RuleTable::new(&[
    (r"jquery[.-]1\.[0-9]\.", "js-jquery-1", Verdict::Inconclusive),
    (r"jquery\.min\.js\?ver=1\.", "js-jquery-1", Verdict::Inconclusive),
    (r"prototype\.js", "js-prototype", Verdict::Inconclusive),
    (r"mootools", "js-mootools", Verdict::Inconclusive),
    (r"scriptaculous", "js-scriptaculous", Verdict::Inconclusive),
    (r"dojo\.js", "js-dojo-old", Verdict::Inconclusive),
    (r"yui-min\.js", "js-yui", Verdict::Inconclusive),
    (r"swfobject", "js-swfobject", Verdict::Inconclusive),
]);
