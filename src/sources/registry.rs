//! Registry for managing source adapters.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    ArxivSource, GoogleScholarSource, GoogleSource, IeeeXploreSource, PubMedSource, SciHubSource,
    SemanticScholarSource, Source,
};
use crate::config::Config;
use crate::models::SourceType;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        /// Searching issues HTTP requests
        const NETWORK = 1 << 1;
        /// Prone to CAPTCHAs and rate limiting
        const SOFT_BLOCKING = 1 << 2;
        /// Results may carry DOIs usable for mirror resolution
        const DOI = 1 << 3;
        /// Results may carry direct PDF links
        const PDF_LINKS = 1 << 4;
    }
}

/// Registry for all available sources
///
/// Sources are keyed by their [`SourceType`], so lookups accept any spelling
/// understood by [`SourceType::from_name`].
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceType, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every source, configured from `config`
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(ArxivSource::with_base_url(
            &config.sources.arxiv_url,
        )));
        registry.register(Arc::new(SciHubSource::new(config.mirrors.search.clone())));
        registry.register(Arc::new(GoogleScholarSource::with_base_url(
            &config.sources.scholar_url,
        )));
        registry.register(Arc::new(IeeeXploreSource::new()));
        registry.register(Arc::new(PubMedSource::new()));
        registry.register(Arc::new(SemanticScholarSource::with_base_url(
            &config.sources.semantic_url,
            config.sources.semantic_timeout(),
        )));
        registry.register(Arc::new(GoogleSource::new()));

        registry
    }

    /// Register a source, replacing any source of the same type
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.source_type(), source);
    }

    /// Get a source by type
    pub fn get(&self, source: SourceType) -> Option<&Arc<dyn Source>> {
        self.sources.get(&source)
    }

    /// Get a source by id or display name
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Source>> {
        SourceType::from_name(name).and_then(|source| self.get(source))
    }

    /// Get all registered sources in display order
    pub fn all(&self) -> Vec<&Arc<dyn Source>> {
        SourceType::ALL
            .iter()
            .filter_map(|source| self.sources.get(source))
            .collect()
    }

    /// Get all source IDs in display order
    pub fn ids(&self) -> Vec<&str> {
        self.all().into_iter().map(|s| s.id()).collect()
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .into_iter()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a source exists
    pub fn has(&self, source: SourceType) -> bool {
        self.sources.contains_key(&source)
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
