//! Domain Models
//!
//! Plain data records passed between the upstream sources, the cache
//! managers and the response shaper. Wire-format types for specific
//! upstream APIs live next to their clients in `upstream/`.

mod metrics;
mod names;
mod recipes;

pub use metrics::IncineratorSnapshot;
pub use names::NameEntry;
pub use recipes::{FormattedRecipe, Ingredient, Recipe};
