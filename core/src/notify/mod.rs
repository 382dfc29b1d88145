//! Live updates: hub connections, throttled toasts and the averages board.

mod board;
mod event;
mod rate_limit;
mod relay;
mod toast;
mod transport;


pub use board::{element_id, format_average, AverageBoard, MemoryBoard};
pub use event::{HubEvent, HubKind, PushMessage};
pub use rate_limit::RateLimiter;
pub use relay::{ConnectionState, NotificationRelay};
pub use toast::{Notifier, RecordingNotifier, Toast, ToastLevel};
pub use transport::{
    spawn_hub, FrameStream, HubHandle, HubOptions, PushFrame, PushTransport, SseParser,
    SseTransport,
};
