//! Interface between the aggregation host and individual source adapters

use crate::error::Result;
use crate::models::{
    FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter, MangaPage,
    MangaSource, SortOrder,
};
use async_trait::async_trait;
use std::collections::HashSet;

/// A setting a source lets the user change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKey {
    Domain { default: &'static str },
    UserAgent,
}

#[async_trait]
pub trait MangaParser: Send + Sync {
    fn source(&self) -> MangaSource;

    /// Name shown to the user
    fn title(&self) -> &'static str {
        self.source().title()
    }

    fn locale(&self) -> &'static str {
        self.source().locale()
    }

    /// Number of entries the site shows per listing page
    fn page_size(&self) -> usize;

    fn config_keys(&self) -> Vec<ConfigKey>;

    fn available_sort_orders(&self) -> HashSet<SortOrder>;

    fn filter_capabilities(&self) -> FilterCapabilities;

    async fn filter_options(&self) -> Result<FilterOptions>;

    /// One page of the catalog; `page` starts at 1
    async fn list_page(
        &self,
        page: u32,
        order: SortOrder,
        filter: &MangaListFilter,
    ) -> Result<Vec<Manga>>;

    /// `manga` with description, cover, tags and chapters filled in
    async fn details(&self, manga: &Manga) -> Result<Manga>;

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>>;

    /// Absolute URL of a page image
    fn page_url(&self, page: &MangaPage) -> String;
}
