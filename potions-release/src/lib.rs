mod client;
mod error;
mod format;
mod model;
mod retry;

pub use client::ReleaseClient;
pub use error::{Error, Result};
pub use format::{format_tag, generate_release_body};
pub use model::{Asset, CreateReleaseParams, RateLimit, Release};
pub use retry::{delay_for_attempt, is_retryable_status, MAX_ATTEMPTS};
