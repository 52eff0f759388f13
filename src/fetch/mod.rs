use crate::error::Result;

pub mod client;
pub mod decode;
pub mod request;
pub mod shutdown;

pub use client::{FetchOutcome, HttpTransport, RemoteFetcher, Transport};
pub use decode::{decode_history, decode_marketstat, decode_orders, PayloadFormat};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};

pub type FetchResult<T> = Result<T>;

#[inline]
pub fn ensure_concurrency_limit(limit: usize) -> usize {
    limit.max(1)
}
