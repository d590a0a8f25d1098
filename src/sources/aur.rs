// src/sources/aur.rs

//! AUR RPC v5 client
//!
//! Exact names are fetched with `/rpc/v5/info`. When nothing carries the
//! requested name, `/rpc/v5/search/<name>?by=provides` finds providers; search
//! results lack dependency arrays, so they are fetched again through `info`.

use super::{PackageRecord, RepoSource};
use crate::catalog::SourceKind;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default AUR endpoint
pub const DEFAULT_AUR_URL: &str = "https://aur.archlinux.org";

/// Timeout for RPC requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for one RPC request
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 500;

/// Envelope of every RPC answer
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<AurPackage>,
}

/// One package entry of an RPC answer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AurPackage {
    pub name: String,
    #[serde(default)]
    pub package_base: Option<String>,
    pub version: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub make_depends: Vec<String>,
    #[serde(default)]
    pub check_depends: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

impl From<AurPackage> for PackageRecord {
    fn from(pkg: AurPackage) -> Self {
        PackageRecord {
            name: pkg.name,
            base: pkg.package_base,
            version: pkg.version,
            depends: pkg.depends,
            make_depends: pkg.make_depends,
            check_depends: pkg.check_depends,
            provides: pkg.provides,
            conflicts: pkg.conflicts,
        }
    }
}

/// Parse an RPC response body, turning `type: "error"` documents into errors
fn parse_response(body: &str) -> Result<Vec<AurPackage>> {
    let response: RpcResponse = serde_json::from_str(body)?;
    if response.kind == "error" {
        return Err(Error::Rpc(
            response.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    Ok(response.results)
}

/// Blocking client for the AUR RPC interface
pub struct AurClient {
    client: Client,
    base: Url,
}

impl AurClient {
    /// Create a client for the AUR at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid AUR URL '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("invalid AUR URL '{base_url}'")));
        }

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("blinky/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("invalid AUR URL '{}'", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of an `info` request for the given names
    pub fn info_url(&self, names: &[&str]) -> Result<Url> {
        let mut url = self.endpoint(&["rpc", "v5", "info"])?;
        {
            let mut query = url.query_pairs_mut();
            for name in names {
                query.append_pair("arg[]", name);
            }
        }
        Ok(url)
    }

    /// URL of a provides search for `name`
    pub fn provides_url(&self, name: &str) -> Result<Url> {
        let mut url = self.endpoint(&["rpc", "v5", "search", name])?;
        url.query_pairs_mut().append_pair("by", "provides");
        Ok(url)
    }

    fn get(&self, url: &Url) -> Result<Vec<AurPackage>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("AUR request {}", url);
            match self.client.get(url.clone()).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Rpc(format!("HTTP {} from {}", response.status(), url)));
                    }
                    return parse_response(&response.text()?);
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!("AUR request attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Full metadata for the given exact names
    pub fn info(&self, names: &[&str]) -> Result<Vec<AurPackage>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.get(&self.info_url(names)?)
    }

    /// Names of packages that provide `name`
    pub fn search_provides(&self, name: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .get(&self.provides_url(name)?)?
            .into_iter()
            .map(|p| p.name)
            .collect();
        names.sort();
        Ok(names)
    }
}

impl RepoSource for AurClient {
    fn kind(&self) -> SourceKind {
        SourceKind::SourceRepo
    }

    fn query(&self, name: &str) -> Result<Vec<PackageRecord>> {
        let mut found = self.info(&[name])?;
        if found.is_empty() {
            let providers = self.search_provides(name)?;
            let providers: Vec<&str> = providers.iter().map(String::as_str).collect();
            found = self.info(&providers)?;
        }
        debug!("AUR has {} packages for '{}'", found.len(), name);
        Ok(found.into_iter().map(PackageRecord::from).collect())
    }
}
