//! Spectrum catalog: the reference data every round is played on.
//!
//! Spectra are loaded from a JSON file on disk and cached with a TTL so a
//! broken or missing file never takes the service down; the previous cache
//! (or the built-in set) is served instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs};

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use utoipa::ToSchema;

/// Environment variable overriding the configured catalog file location.
const CATALOG_PATH_ENV: &str = "HIVEMIND_BACK_CATALOG_PATH";

/// A labeled continuum guesses are placed on, e.g. "Coffee" to "Tea".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Spectrum {
    /// Stable identifier referenced by drafts and games.
    pub id: String,
    /// Label anchoring the low end of the scale.
    pub left_label: String,
    /// Label anchoring the high end of the scale.
    pub right_label: String,
    /// Free-form difficulty tag (e.g. "easy", "spicy").
    pub difficulty: String,
    /// Free-form grouping tag (e.g. "food", "movies").
    pub context: String,
}

/// Errors raised by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The requested filter excludes every spectrum in the catalog.
    #[error("no spectrum matches context={context:?} difficulty={difficulty:?}")]
    NoMatch {
        context: Option<String>,
        difficulty: Option<String>,
    },
    /// A persisted record references a spectrum the catalog no longer has.
    #[error("spectrum `{id}` is not in the catalog")]
    UnknownSpectrum { id: String },
}

struct CatalogCache {
    spectra: Arc<Vec<Spectrum>>,
    refreshed_at: Option<Instant>,
}

/// TTL-cached spectrum source shared across requests.
pub struct SpectrumCatalog {
    path: PathBuf,
    ttl: Duration,
    cache: RwLock<CatalogCache>,
}

impl SpectrumCatalog {
    /// Build a catalog reading from `path` (overridable via
    /// `HIVEMIND_BACK_CATALOG_PATH`), refreshing at most every `ttl`.
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        let path = env::var_os(CATALOG_PATH_ENV)
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(path);

        Self {
            path,
            ttl,
            cache: RwLock::new(CatalogCache {
                spectra: Arc::new(Vec::new()),
                refreshed_at: None,
            }),
        }
    }

    /// Return the full catalog, refreshing from disk when the cache is stale.
    ///
    /// Never returns an empty list: a failed or empty load falls back to the
    /// last good cache, and ultimately to the built-in set.
    pub async fn ensure_catalog(&self) -> Arc<Vec<Spectrum>> {
        {
            let cache = self.cache.read().await;
            if let Some(refreshed_at) = cache.refreshed_at {
                if refreshed_at.elapsed() < self.ttl && !cache.spectra.is_empty() {
                    return cache.spectra.clone();
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(refreshed_at) = cache.refreshed_at {
            if refreshed_at.elapsed() < self.ttl && !cache.spectra.is_empty() {
                return cache.spectra.clone();
            }
        }

        match self.load_from_disk() {
            Ok(spectra) if !spectra.is_empty() => {
                info!(path = %self.path.display(), count = spectra.len(), "refreshed spectrum catalog");
                cache.spectra = Arc::new(spectra);
                cache.refreshed_at = Some(Instant::now());
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "catalog file is empty; keeping previous catalog");
                self.fall_back(&mut cache);
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "catalog refresh failed; keeping previous catalog");
                self.fall_back(&mut cache);
            }
        }

        cache.spectra.clone()
    }

    /// Pick a uniformly random spectrum matching the optional filters.
    pub async fn pick_filtered(
        &self,
        context: Option<&str>,
        difficulty: Option<&str>,
    ) -> Result<Spectrum, CatalogError> {
        let spectra = self.ensure_catalog().await;
        let candidates: Vec<&Spectrum> = spectra
            .iter()
            .filter(|s| matches_tag(&s.context, context))
            .filter(|s| matches_tag(&s.difficulty, difficulty))
            .collect();

        candidates
            .choose(&mut rand::rng())
            .map(|s| (*s).clone())
            .ok_or_else(|| CatalogError::NoMatch {
                context: context.map(str::to_string),
                difficulty: difficulty.map(str::to_string),
            })
    }

    /// Resolve a spectrum id referenced by a stored record.
    pub async fn resolve(&self, id: &str) -> Result<Spectrum, CatalogError> {
        let spectra = self.ensure_catalog().await;
        spectra
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownSpectrum { id: id.to_string() })
    }

    fn load_from_disk(&self) -> anyhow::Result<Vec<Spectrum>> {
        let contents = fs::read_to_string(&self.path)?;
        let spectra = serde_json::from_str::<Vec<Spectrum>>(&contents)?;
        Ok(spectra)
    }

    fn fall_back(&self, cache: &mut CatalogCache) {
        if cache.spectra.is_empty() {
            info!("using built-in spectrum set");
            cache.spectra = Arc::new(built_in_spectra());
        }
        // Stamp the attempt either way so a broken file is not re-read on
        // every request.
        cache.refreshed_at = Some(Instant::now());
    }
}

fn matches_tag(tag: &str, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(wanted) => tag.eq_ignore_ascii_case(wanted),
    }
}

fn spectrum(
    id: &str,
    left: &str,
    right: &str,
    difficulty: &str,
    context: &str,
) -> Spectrum {
    Spectrum {
        id: id.to_string(),
        left_label: left.to_string(),
        right_label: right.to_string(),
        difficulty: difficulty.to_string(),
        context: context.to_string(),
    }
}

/// Built-in spectrum set shipped with the binary.
fn built_in_spectra() -> Vec<Spectrum> {
    vec![
        spectrum("coffee-tea", "Coffee", "Tea", "easy", "food"),
        spectrum("sweet-savory", "Sweet", "Savory", "easy", "food"),
        spectrum("underrated-overrated", "Underrated", "Overrated", "medium", "opinions"),
        spectrum("guilty-pleasure", "Guilty pleasure", "Genuinely great", "medium", "opinions"),
        spectrum("morning-night", "Morning person", "Night owl", "easy", "lifestyle"),
        spectrum("introvert-extrovert", "Introvert", "Extrovert", "easy", "lifestyle"),
        spectrum("retro-futuristic", "Retro", "Futuristic", "medium", "aesthetics"),
        spectrum("cursed-blessed", "Cursed", "Blessed", "hard", "internet"),
        spectrum("niche-mainstream", "Niche", "Mainstream", "medium", "internet"),
        spectrum("low-effort-high-effort", "Low effort", "High effort", "hard", "internet"),
        spectrum("villain-hero", "Villain", "Hero", "medium", "movies"),
        spectrum("rewatchable-one-and-done", "Endlessly rewatchable", "One and done", "hard", "movies"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_builtins() -> SpectrumCatalog {
        // Nonexistent path forces the built-in fallback.
        SpectrumCatalog::new(
            PathBuf::from("does/not/exist.json"),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn catalog_is_never_empty() {
        let catalog = catalog_with_builtins();
        let spectra = catalog.ensure_catalog().await;
        assert!(!spectra.is_empty());
    }

    #[tokio::test]
    async fn pick_filtered_honors_filters() {
        let catalog = catalog_with_builtins();

        let food = catalog.pick_filtered(Some("food"), None).await.unwrap();
        assert_eq!(food.context, "food");

        let hard = catalog.pick_filtered(None, Some("hard")).await.unwrap();
        assert_eq!(hard.difficulty, "hard");

        let err = catalog
            .pick_filtered(Some("no-such-context"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NoMatch { .. }));
    }

    #[tokio::test]
    async fn resolve_finds_known_ids_and_rejects_unknown_ones() {
        let catalog = catalog_with_builtins();

        let spectrum = catalog.resolve("coffee-tea").await.unwrap();
        assert_eq!(spectrum.left_label, "Coffee");

        let err = catalog.resolve("deleted-spectrum").await.unwrap_err();
        assert!(matches!(err, CatalogError::UnknownSpectrum { .. }));
    }
}
