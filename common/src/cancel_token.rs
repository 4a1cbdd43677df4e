use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a worker and its controller.
///
/// The worker polls [`CancelToken::is_cancelled`] between units of work and
/// stops on its own; nothing is ever interrupted from the outside.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Re-arms the token so it can govern the next unit of work.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
