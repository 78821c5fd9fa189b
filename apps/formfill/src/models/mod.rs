pub mod fill;
pub mod placeholder;

pub use fill::{FillMap, FillResult, FillSource};
pub use placeholder::{CellLocation, Placeholder, PlaceholderKind, Tag};
