pub mod aggregate;
pub mod error;
pub mod normalize;
pub mod traits;
pub mod types;

pub use aggregate::{aggregate, aggregate_with_unresolved, top_movers};
pub use error::*;
pub use normalize::{normalize, plan, resolve_entry};
pub use traits::*;
pub use types::*;
