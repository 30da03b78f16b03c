pub mod anchor;
pub mod pagination;
pub mod retry;
pub mod target;
pub mod window;

pub use anchor::ScrollAnchor;
pub use pagination::Pagination;
pub use retry::{AckThrottle, RetryPolicy, RetryQueue, RetryTask};
pub use target::{Phase, TargetResolver};
pub use window::Window;
