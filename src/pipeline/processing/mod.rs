// Pipeline processing: querying, quality analysis and portfolio aggregates

pub mod quality;
pub mod query;
pub mod summary;

pub use quality::{CheckStatus, QualityAnalyzer, QualityReport};
pub use query::{query, FilterSpec, QueryPage};
pub use summary::{summarize, PortfolioSummary};
