pub mod merlintoon;

use crate::config::Config;
use crate::models::MangaSource;
use crate::parser::MangaParser;
use crate::source_utils::WebClient;
use std::sync::Arc;

/// Build the adapter for `source`, applying its overrides from `config`
pub fn parser_for(
    source: MangaSource,
    client: Arc<dyn WebClient>,
    config: &Config,
) -> Box<dyn MangaParser> {
    let source_config = config.source(source.name());
    match source {
        MangaSource::MerlinToon => Box::new(merlintoon::MerlinToon::new(client, &source_config)),
    }
}
