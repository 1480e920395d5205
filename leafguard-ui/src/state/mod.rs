//! State Management
//!
//! Page state and the live channel connection.

pub mod channel;
pub mod page;

pub use channel::{init_channel, ChannelClient};
pub use page::{provide_page_state, PageState, Preview, ANALYZE_FAILED_MESSAGE};
