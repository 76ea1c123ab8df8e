pub mod behavior_store;
pub mod registry;
pub mod sources;
pub mod traits;

pub use behavior_store::*;
pub use registry::*;
pub use sources::*;
pub use traits::*;
