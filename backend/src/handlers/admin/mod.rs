pub mod catalog;
pub mod purchases;
pub mod trainings;
pub mod users;
