//! Graph API client configuration

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// API root used when none is configured
pub const DEFAULT_API_ROOT: &str = "https://graph.facebook.com/v2.11";

const API_ROOT_ENV_VAR: &str = "MESSENGER_API_ROOT";
const READ_TIMEOUT_ENV_VAR: &str = "MESSENGER_READ_TIMEOUT_SECS";
const SEND_TIMEOUT_ENV_VAR: &str = "MESSENGER_SEND_TIMEOUT_SECS";
const MAX_PAGES_ENV_VAR: &str = "MESSENGER_MAX_PAGES";

/// Timeout class of an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Reads and list pages
    Read,
    /// Message delivery, which the platform may take much longer to accept
    Send,
}

/// Configuration for [`GraphClient`](crate::graph::GraphClient)
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Root every request path is resolved against, e.g. `https://graph.facebook.com/v2.11`
    pub api_root: Url,
    /// Timeout for `OperationClass::Read`
    pub read_timeout: Duration,
    /// Timeout for `OperationClass::Send`
    pub send_timeout: Duration,
    /// Upper bound on pages fetched by one pagination walk
    pub max_pages: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_root: Url::parse(DEFAULT_API_ROOT).expect("default API root is a valid URL"),
            read_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(300),
            max_pages: 1000,
        }
    }
}

impl GraphConfig {
    /// Default configuration against a different API root
    pub fn with_api_root(api_root: &str) -> Result<Self> {
        Ok(Self {
            api_root: parse_api_root(api_root)?,
            ..Self::default()
        })
    }

    /// Load from the environment, falling back to defaults for unset variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(root) = std::env::var(API_ROOT_ENV_VAR) {
            config.api_root = parse_api_root(&root)?;
        }
        if let Some(secs) = env_number(READ_TIMEOUT_ENV_VAR)? {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_number(SEND_TIMEOUT_ENV_VAR)? {
            config.send_timeout = Duration::from_secs(secs);
        }
        if let Some(pages) = env_number(MAX_PAGES_ENV_VAR)? {
            config.max_pages = pages as usize;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(Error::config("max_pages must be at least 1"));
        }
        if self.read_timeout.is_zero() || self.send_timeout.is_zero() {
            return Err(Error::config("timeouts must be non-zero"));
        }
        Ok(())
    }

    /// Timeout for a class of operation
    pub fn timeout_for(&self, class: OperationClass) -> Duration {
        match class {
            OperationClass::Read => self.read_timeout,
            OperationClass::Send => self.send_timeout,
        }
    }

    pub(crate) fn root_path(&self) -> &str {
        self.api_root.path().trim_end_matches('/')
    }
}

fn parse_api_root(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::config(format!("invalid API root {raw}: {e}")))?;
    if url.cannot_be_a_base() || url.query().is_some() {
        return Err(Error::config(format!("API root {raw} must be a plain base URL")));
    }
    Ok(url)
}

fn env_number(var: &str) -> Result<Option<u64>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{var} must be a positive integer, got {raw}"))),
        Err(_) => Ok(None),
    }
}
