//! Allowlist-capped HTTP client.
//!
//! Every outbound request must target a host on the allowlist, checked
//! before any network I/O happens. The default list covers the NCBI
//! E-utilities endpoints plus local model servers.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use url::Url;

use crate::error::{ClaimscopeError, Result};

const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "eutils.ncbi.nlm.nih.gov", // E-utilities (esearch/efetch)
    "pubmed.ncbi.nlm.nih.gov", // PubMed landing pages
    "localhost",               // Local model server
    "127.0.0.1",               // Localhost alt
];

#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Create a client with the default allowlist and the given request
    /// timeout. The timeout bounds every request issued through this client,
    /// including generation calls.
    pub fn new(timeout: Duration) -> Result<Self> {
        let allowlist = DEFAULT_ALLOWED_HOSTS
            .iter()
            .map(|host| host.to_string())
            .collect();
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| ClaimscopeError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_host(&mut self, host: &str) {
        self.allowlist.insert(host.to_string());
    }

    /// Whether a URL is permitted under the current sandbox policy.
    /// Subdomains of allowed hosts are permitted.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    fn check(&self, url: &str) -> Result<()> {
        if !self.is_allowed(url) {
            return Err(ClaimscopeError::Security(format!(
                "host not in allowlist for URL {url}"
            )));
        }
        Ok(())
    }
}
