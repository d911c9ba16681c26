pub mod analytics;
pub mod charts;
pub mod manager;
pub mod models;
pub mod uploads;
pub mod users;

pub use analytics::AnalyticsRepository;
pub use charts::ChartRepository;
pub use manager::{DatabaseError, DatabaseManager};
pub use uploads::PgUploadStore;
pub use users::UserRepository;
