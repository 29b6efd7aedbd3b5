//! Run configuration for the link monitor
//!
//! `WatchConfig` collects every tunable the engine needs: the partner domain
//! to match links against, the search-API endpoint, per-client timeouts, the
//! page-fetch retry policy, and the politeness delay applied before each
//! outbound page request. Defaults match the production monitoring schedule;
//! tests override the delays down to zero.

use std::time::Duration;

/// Partner domain that identifies widget/deep-link targets.
pub const DEFAULT_PARTNER_DOMAIN: &str = "tripster.ru";

/// Public listing-search API endpoint.
pub const DEFAULT_API_URL: &str =
    "https://experience.tripster.ru/api/partners/travelpayouts/search/experiences/";

/// Chrome user agent sent with page fetches
///
/// Scraped pages serve a stripped-down shell to unknown agents, so fetches
/// masquerade as a current desktop Chrome.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Configuration for a monitoring run.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Domain substring that marks an anchor/widget as partner content.
    pub partner_domain: String,
    /// Base URL of the listing-search API.
    pub api_base_url: String,
    /// Timeout for each listing-search API call.
    pub api_timeout: Duration,
    /// Timeout for each direct page fetch.
    pub fetch_timeout: Duration,
    /// Maximum page-fetch attempts (DNS failures only are retried).
    pub max_fetch_attempts: u32,
    /// Fixed delay between DNS-failure retries.
    pub dns_retry_delay: Duration,
    /// Lower bound of the randomized politeness pause before each page fetch.
    pub politeness_min: Duration,
    /// Upper bound of the randomized politeness pause.
    pub politeness_max: Duration,
    /// Bound on concurrently processed articles.
    pub max_concurrency: usize,
    /// User agent sent with page fetches.
    pub user_agent: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            partner_domain: DEFAULT_PARTNER_DOMAIN.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            api_timeout: Duration::from_secs(15),
            fetch_timeout: Duration::from_secs(30),
            max_fetch_attempts: 3,
            dns_retry_delay: Duration::from_secs(2),
            politeness_min: Duration::from_secs(1),
            politeness_max: Duration::from_secs(3),
            max_concurrency: 4,
            user_agent: CHROME_USER_AGENT.to_string(),
        }
    }
}

impl WatchConfig {
    /// Defaults overridden from the environment where set:
    /// `TRIPSTER_DOMAIN`, `TRIPSTER_API_URL`, `WATCH_MAX_CONCURRENCY`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(domain) = std::env::var("TRIPSTER_DOMAIN") {
            config.partner_domain = domain;
        }
        if let Ok(api_url) = std::env::var("TRIPSTER_API_URL") {
            config.api_base_url = api_url;
        }
        if let Ok(concurrency) = std::env::var("WATCH_MAX_CONCURRENCY")
            && let Ok(n) = concurrency.parse::<usize>()
            && n > 0
        {
            config.max_concurrency = n;
        }
        config
    }

    #[must_use]
    pub fn with_partner_domain(mut self, domain: impl Into<String>) -> Self {
        self.partner_domain = domain.into();
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_dns_retry_delay(mut self, delay: Duration) -> Self {
        self.dns_retry_delay = delay;
        self
    }

    /// Set both politeness bounds at once. `Duration::ZERO` twice disables
    /// the pause entirely (tests).
    #[must_use]
    pub fn with_politeness(mut self, min: Duration, max: Duration) -> Self {
        self.politeness_min = min;
        self.politeness_max = max.max(min);
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = WatchConfig::default();
        assert_eq!(config.partner_domain, "tripster.ru");
        assert!(config.politeness_min <= config.politeness_max);
        assert!(config.max_fetch_attempts >= 1);
    }

    #[test]
    fn politeness_max_never_below_min() {
        let config =
            WatchConfig::default().with_politeness(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(config.politeness_min, Duration::from_secs(5));
        assert_eq!(config.politeness_max, Duration::from_secs(5));
    }
}
