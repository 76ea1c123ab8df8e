pub mod behavior;
pub mod instance;
pub mod value;

pub use behavior::*;
pub use instance::*;
pub use value::*;
