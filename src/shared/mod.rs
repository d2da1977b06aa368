pub mod errors;
pub mod fs_atomic;
pub mod ids;
pub mod time;

pub use errors::{ErrorCode, RuntimeError, ServiceError, ALL_ERROR_CODES};
pub use ids::{EntryId, TaskId};
