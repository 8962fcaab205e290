pub mod aggregate;
pub mod decoder;
pub mod profiler;
pub mod types;

pub use aggregate::{top_categories, DEFAULT_TOP_N};
pub use decoder::{decode, FormatHint};
pub use profiler::profile;
pub use types::{CategoryFilter, CellValue, DecodedSheet, SchemaPolicy};
