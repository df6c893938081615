pub mod driver;
pub mod rating;
pub mod trip;
pub mod user;
