//! Rate limiting logic and state management.

mod clock;
mod counter;
mod limiter;
mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{WindowCounter, WindowSnapshot};
pub use limiter::{LimiterSettings, RateLimiter};
pub use registry::KeyRegistry;
