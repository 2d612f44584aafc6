//! Queue module: backoff math, the retry heap and the FIFO submission queue.

mod backoff;
mod fifo;
mod retry;

pub use backoff::BackoffPolicy;
pub use fifo::SubmitQueue;
pub use retry::RetryQueue;
