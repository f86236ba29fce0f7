// Library interface for merlintoon_parser
// The host loads sources through `sources::parser_for` and talks to them via `parser::MangaParser`

pub mod config;
pub mod error;
pub mod helpers;
pub mod http_client;
pub mod models;
pub mod parser;
pub mod source_utils;
pub mod sources;

pub use error::{Result, SourceError};
