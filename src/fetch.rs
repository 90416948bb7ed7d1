//! Page fetching for the CLI and rating probes
//!
//! The extraction core never fetches anything itself; this is the
//! collaborator that turns a URL into HTML.

use std::time::Duration;

use once_cell::sync::Lazy;
use ureq::ResponseExt;
use url::Url;

use crate::error::{ProdlensError, Result};

/// Default HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36 prodlens/0.1";

/// Shared HTTP agent for connection pooling
static HTTP_AGENT: Lazy<ureq::Agent> = Lazy::new(|| build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// A fetched page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Final URL after redirects
    pub url: String,
    /// Raw HTML content
    pub html: String,
}

impl PageContent {
    /// Bot walls and CAPTCHA interstitials rather than the real page
    pub fn looks_blocked(&self) -> bool {
        let lower_html = self.html.to_lowercase();
        lower_html.contains("captcha")
            || lower_html.contains("checking your browser")
            || lower_html.contains("please enable javascript")
            || lower_html.contains("ddos-guard")
            || lower_html.contains("robot check")
            || lower_html.contains("access denied")
    }
}

/// HTTP fetcher with its own timeout and User-Agent
#[derive(Debug, Clone)]
pub struct Fetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self {
            agent: HTTP_AGENT.clone(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            agent: build_agent(timeout),
            user_agent: user_agent.into(),
        }
    }

    /// Fetch a page over HTTP(S)
    pub fn fetch(&self, url: &str) -> Result<PageContent> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProdlensError::FetchError(format!(
                "Unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let response = self
            .agent
            .get(parsed.as_str())
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .call()?;

        let final_url = response.get_uri().to_string();
        let html = response.into_body().read_to_string()?;

        tracing::debug!(url = %final_url, bytes = html.len(), "fetched page");

        Ok(PageContent { url: final_url, html })
    }
}
