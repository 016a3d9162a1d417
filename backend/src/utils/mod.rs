pub mod jwt;
pub mod license;
pub mod password;

pub use jwt::*;
pub use password::*;
