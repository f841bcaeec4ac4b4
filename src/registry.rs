//! Latest published provider versions: the lookup seam, its cache, and the registry client.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Error;
use crate::lockfile::ProviderSource;

/// Something that can report the newest published version of a provider.
///
/// Implementations must not fail loudly: any error is `None`.
pub trait LatestVersionSource: Send + Sync {
    /// Newest published version, or `None` if it couldn't be determined.
    fn latest_version(&self, provider: &ProviderSource) -> Option<String>;
}

/// Process-lifetime cache of successful latest-version lookups.
///
/// Failed and empty lookups are never stored, so the next query retries them.
/// The lock is not held while a lookup runs; two threads racing on the same
/// provider may both fetch, and the last write wins.
#[derive(Debug, Default)]
pub struct LatestVersionCache {
    /// Provider identity to its newest known version.
    entries: Mutex<HashMap<ProviderSource, String>>,
}

impl LatestVersionCache {
    /// Empty cache.
    pub fn new() -> Self {
        return Self::default();
    }

    /// Newest version for `provider`, from the cache or via `lookup`.
    pub fn latest(&self, provider: &ProviderSource, lookup: &dyn LatestVersionSource) -> Option<String> {
        let cached = self.entries.lock().get(provider).cloned();
        if let Some(version) = cached {
            tracing::trace!(%provider, %version, "latest version cache hit");
            return Some(version);
        }

        let Some(version) = lookup.latest_version(provider).filter(|v| return !v.trim().is_empty()) else {
            tracing::debug!(%provider, "latest version unknown, not caching");
            return None;
        };
        self.entries.lock().insert(provider.clone(), version.clone());
        return Some(version);
    }

    /// Whether `version` is the newest published version of `provider`.
    /// An unknown latest version is `false`.
    pub fn is_latest_known(&self, provider: &ProviderSource, version: &str, lookup: &dyn LatestVersionSource) -> bool {
        return self
            .latest(provider, lookup)
            .is_some_and(|latest| return latest == version);
    }

    /// Number of cached providers.
    #[allow(clippy::len_without_is_empty, reason = "only used for reporting")]
    pub fn len(&self) -> usize {
        return self.entries.lock().len();
    }
}

/// Subset of the registry's provider response that we read.
#[derive(serde::Deserialize)]
struct ProviderResponse {
    /// Newest published version.
    version: String,
}

/// Blocking client for `{registry}/v1/providers/{namespace}/{name}`.
#[derive(Debug)]
pub struct RegistryClient {
    /// Registry base URL without a trailing slash.
    base_url: String,
    /// HTTP client with the configured timeout.
    client: reqwest::blocking::Client,
}

impl RegistryClient {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::HttpClient` if the TLS backend cannot be initialized.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tfdoc/", env!("CARGO_PKG_VERSION")))
            .build()?;
        return Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        });
    }

    /// Endpoint describing one provider.
    fn provider_url(&self, provider: &ProviderSource) -> String {
        return format!("{}/v1/providers/{}/{}", self.base_url, provider.namespace, provider.name);
    }
}

impl LatestVersionSource for RegistryClient {
    fn latest_version(&self, provider: &ProviderSource) -> Option<String> {
        let url = self.provider_url(provider);
        let response = match self.client.get(&url).send() {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%provider, error = %e, "latest version lookup failed");
                return None;
            },
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%provider, %status, "latest version lookup rejected");
            return None;
        }

        return match response.json::<ProviderResponse>() {
            Ok(body) => Some(body.version),
            Err(e) => {
                tracing::warn!(%provider, error = %e, "latest version response unreadable");
                None
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Replays scripted answers and counts calls.
    struct Scripted {
        answers: Mutex<VecDeque<Option<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(answers: &[Option<&str>]) -> Self {
            return Self {
                answers: Mutex::new(answers.iter().map(|a| return a.map(String::from)).collect()),
                calls: AtomicUsize::new(0),
            };
        }

        fn calls(&self) -> usize {
            return self.calls.load(Ordering::SeqCst);
        }
    }

    impl LatestVersionSource for Scripted {
        fn latest_version(&self, _provider: &ProviderSource) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            return self.answers.lock().pop_front().flatten();
        }
    }

    /// Never knows anything.
    struct Offline;

    impl LatestVersionSource for Offline {
        fn latest_version(&self, _provider: &ProviderSource) -> Option<String> {
            return None;
        }
    }

    fn aws() -> ProviderSource {
        return ProviderSource::parse("hashicorp/aws").unwrap();
    }

    #[test]
    fn success_is_cached() {
        let cache = LatestVersionCache::new();
        let source = Scripted::new(&[Some("5.31.0")]);

        assert!(cache.is_latest_known(&aws(), "5.31.0", &source));
        assert!(!cache.is_latest_known(&aws(), "5.30.0", &source));
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failure_is_retried() {
        let cache = LatestVersionCache::new();
        let source = Scripted::new(&[None, Some("5.31.0")]);

        assert!(!cache.is_latest_known(&aws(), "5.31.0", &source));
        assert_eq!(cache.len(), 0);
        assert!(cache.is_latest_known(&aws(), "5.31.0", &source));
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn empty_answer_is_not_cached() {
        let cache = LatestVersionCache::new();
        let source = Scripted::new(&[Some(""), Some("1.0.0")]);

        assert_eq!(cache.latest(&aws(), &source), None);
        assert_eq!(cache.latest(&aws(), &source).as_deref(), Some("1.0.0"));
    }

    #[test]
    fn identities_are_cached_separately() {
        let cache = LatestVersionCache::new();
        let google = ProviderSource::parse("hashicorp/google").unwrap();
        let source = Scripted::new(&[Some("5.31.0"), Some("6.0.0")]);

        assert_eq!(cache.latest(&aws(), &source).as_deref(), Some("5.31.0"));
        assert_eq!(cache.latest(&google, &source).as_deref(), Some("6.0.0"));
        assert_eq!(cache.latest(&aws(), &source).as_deref(), Some("5.31.0"));
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn concurrent_lookups_for_distinct_providers() {
        /// Answers with the provider name so results are checkable.
        struct ByName;
        impl LatestVersionSource for ByName {
            fn latest_version(&self, provider: &ProviderSource) -> Option<String> {
                return Some(format!("{}-latest", provider.name));
            }
        }

        let cache = LatestVersionCache::new();
        let names = ["aws", "google", "azurerm", "random"];
        std::thread::scope(|scope| {
            for name in names {
                let cache = &cache;
                scope.spawn(move || {
                    let provider = ProviderSource::parse(name).unwrap();
                    assert_eq!(cache.latest(&provider, &ByName), Some(format!("{name}-latest")));
                });
            }
        });
        assert_eq!(cache.len(), names.len());
    }

    #[test]
    fn offline_never_knows() {
        let cache = LatestVersionCache::new();
        assert!(!cache.is_latest_known(&aws(), "5.31.0", &Offline));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn provider_url_drops_trailing_slash() {
        let client = RegistryClient::new("https://registry.example.com/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.provider_url(&aws()), "https://registry.example.com/v1/providers/hashicorp/aws");
    }
}
