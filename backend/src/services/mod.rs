pub mod access;
pub mod entitlements;
pub mod expiry;
pub mod grants;
pub mod pricing;
pub mod seats;
