//! Blocked-domain filter for search hits.
//!
//! Search engines surface social platforms, forums, and article mills that
//! scrape poorly and extract worse. Hits on these domains are skipped before
//! any fetch happens.

use tracing::debug;
use url::Url;

/// Domains skipped during scraping. Subdomains are blocked too.
const BLOCKED_DOMAINS: &[&str] = &[
    // Social media
    "quora.com",
    "reddit.com",
    "tumblr.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "tiktok.com",
    "snapchat.com",
    "pinterest.com",
    "discord.com",
    // Forums
    "4chan.org",
    "stackexchange.com",
    "stackoverflow.com",
    // Generic blog platforms
    "medium.com",
    "wordpress.com",
    "blogger.com",
    "blogspot.com",
    // Low-quality wikis
    "fandom.com",
    "tvtropes.org",
    "wikia.com",
    // Aggregators and clickbait
    "buzzfeed.com",
    "ranker.com",
    "upworthy.com",
    "boredpanda.com",
    // Article mills
    "ezinearticles.com",
    "hubpages.com",
    "ehow.com",
    "thoughtco.com",
];

/// True if the URL's host is a blocked domain or a subdomain of one.
/// Unparseable URLs are treated as blocked.
pub fn is_blocked(raw_url: &str) -> bool {
    let host = match Url::parse(raw_url).ok().and_then(|u| {
        u.host_str().map(str::to_lowercase)
    }) {
        Some(host) => host,
        None => {
            debug!(url = raw_url, "Unparseable URL treated as blocked");
            return true;
        }
    };

    BLOCKED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}
