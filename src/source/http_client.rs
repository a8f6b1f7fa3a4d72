//! Shared HTTP client construction policy for bibliographic sources.
//!
//! Timeouts are passed in explicitly rather than read from process-wide
//! state, so two engines with different settings can coexist.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::SourceError;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;

/// Connect/read timeouts for source HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpTimeouts {
    pub connect_secs: u64,
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

/// Builds a source HTTP client.
///
/// Some sandboxed environments panic when reqwest queries system proxy
/// settings; in that case the client is rebuilt with env-proxy lookup only.
///
/// # Errors
///
/// Returns [`SourceError::ClientBuild`] when construction fails.
pub fn build_source_http_client(
    source_name: &str,
    user_agent: &str,
    timeouts: HttpTimeouts,
) -> Result<Client, SourceError> {
    match try_build_client(user_agent, timeouts, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            warn!(
                source = source_name,
                "Source client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(user_agent, timeouts, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(SourceError::client_build(
                    source_name,
                    "client construction panicked while reading proxy settings",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(SourceError::client_build(source_name, &error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => {
            Err(SourceError::client_build(source_name, &error.to_string()))
        }
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    user_agent: &str,
    timeouts: HttpTimeouts,
    env_proxy_only: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.read_secs))
            .user_agent(user_agent)
            .gzip(true);
        if env_proxy_only {
            builder = apply_env_proxy(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn apply_env_proxy(mut builder: ClientBuilder) -> ClientBuilder {
    let https = first_env_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = https
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    let http = first_env_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = http
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn first_env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
