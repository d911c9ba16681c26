pub mod chart;
pub mod page;
pub mod user;

pub use chart::{Chart, ChartSort, ChartType, ChartUpdate, NewChart};
pub use page::{Page, PageParams};
pub use user::{Preferences, ProfileUpdate, User, UserFilter, UserRole, UserStatus};
