pub mod cache;
pub mod middleware;
pub mod validation;
