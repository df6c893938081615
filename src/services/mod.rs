pub mod geo;
pub mod lifecycle;
pub mod pricing;
pub mod promo;
pub mod sanitize;
pub mod trips;
