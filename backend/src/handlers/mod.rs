pub mod admin;
pub mod auth;
pub mod entitlements;
pub mod products;
pub mod purchases;
pub mod trainings;
