pub mod sources;

pub use sources::{create_source, NewsApiSource, SourceConfig, SourceProvider, StaticSource};

pub mod prelude {
    pub use super::sources::{create_source, SourceConfig};
    pub use nd_core::{Article, ArticleSource, CategorySet, Error, Result};
}
