pub mod aggregation;
pub mod auth;
pub mod database;
pub mod stats;

// 重新导出常用类型
pub use auth::AuthService;
pub use database::Database;
pub use stats::{StatsService, StatsStore};
