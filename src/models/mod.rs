pub mod response;
pub mod stats;
