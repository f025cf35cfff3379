//! Template cache
//!
//! Resolves every template a pipeline needs up front, concurrently, and
//! hands back a complete [`TemplateSet`]. Graph construction never waits on a
//! pending lookup.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};
use trellis_core::domain::template::{Template, TemplateRef, TemplateSet};

use crate::error::{CatalogError, Result};
use crate::resolver::TemplateResolver;

/// Caching front for a [`TemplateResolver`]
pub struct TemplateCache {
    resolver: Arc<dyn TemplateResolver>,
    cache: Mutex<HashMap<TemplateRef, Arc<Template>>>,
}

impl TemplateCache {
    pub fn new(resolver: Arc<dyn TemplateResolver>) -> Self {
        Self {
            resolver,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves one template, using the cache when possible
    pub async fn get(&self, reference: &TemplateRef) -> Result<Arc<Template>> {
        if let Some(template) = self.cache.lock().await.get(reference) {
            return Ok(template.clone());
        }

        let template = Arc::new(self.resolver.resolve(reference).await?);
        self.cache
            .lock()
            .await
            .insert(reference.clone(), template.clone());
        Ok(template)
    }

    /// Resolves a set of references concurrently
    ///
    /// Uncached references are resolved in parallel tasks. The returned set is
    /// complete: if any resolution fails, the error for the lowest failing
    /// reference is returned instead. Successful lookups are cached either
    /// way.
    pub async fn resolve_all<I>(&self, references: I) -> Result<TemplateSet>
    where
        I: IntoIterator<Item = TemplateRef>,
    {
        let wanted: BTreeSet<TemplateRef> = references.into_iter().collect();

        let missing: Vec<TemplateRef> = {
            let cache = self.cache.lock().await;
            wanted
                .iter()
                .filter(|r| !cache.contains_key(*r))
                .cloned()
                .collect()
        };

        debug!(
            requested = wanted.len(),
            uncached = missing.len(),
            "resolving templates"
        );

        let mut tasks = JoinSet::new();
        for reference in missing {
            let resolver = Arc::clone(&self.resolver);
            tasks.spawn(async move {
                let result = resolver.resolve(&reference).await;
                (reference, result)
            });
        }

        let mut failures: BTreeMap<TemplateRef, CatalogError> = BTreeMap::new();
        let mut join_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((reference, Ok(template))) => {
                    self.cache
                        .lock()
                        .await
                        .insert(reference, Arc::new(template));
                }
                Ok((reference, Err(e))) => {
                    failures.insert(reference, e);
                }
                Err(e) => join_error = Some(CatalogError::Join(e.to_string())),
            }
        }

        if let Some((_, error)) = failures.into_iter().next() {
            return Err(error);
        }
        if let Some(error) = join_error {
            return Err(error);
        }

        let cache = self.cache.lock().await;
        let mut set = TemplateSet::new();
        for reference in &wanted {
            let template = cache
                .get(reference)
                .ok_or_else(|| CatalogError::NotFound(reference.to_string()))?;
            set.insert(template.clone());
        }

        info!(templates = set.len(), "templates resolved");
        Ok(set)
    }

    /// Number of cached templates
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }
}
