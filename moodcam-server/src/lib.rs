//! moodcam-server: HTTP read side of moodcam

pub mod http;

pub use http::{create_router, AppState, ApiError};
