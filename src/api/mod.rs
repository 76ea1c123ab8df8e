pub mod accepts_incomplete;
pub mod diagnostics;
pub mod handlers;
pub mod routes;

pub use accepts_incomplete::*;
pub use diagnostics::*;
pub use handlers::*;
pub use routes::*;
