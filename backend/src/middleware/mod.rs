pub mod auth;
pub mod entitlement;
pub mod logging;
pub mod request_id;

pub use auth::*;
pub use entitlement::*;
pub use logging::*;
pub use request_id::*;
