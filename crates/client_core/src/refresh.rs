use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tracing::info;

/// Monotonic token that is part of every read-query key.
///
/// Bumping it after a confirmed write (or on a manual refresh) makes every
/// cached read stale so the next access fetches from the registry again.
pub struct RefreshController {
    token: watch::Sender<u64>,
}

static GLOBAL: OnceLock<Arc<RefreshController>> = OnceLock::new();

impl RefreshController {
    pub fn new() -> Self {
        let (token, _) = watch::channel(0);
        Self { token }
    }

    /// Process-wide controller, created on first use.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    pub fn current(&self) -> u64 {
        *self.token.borrow()
    }

    pub fn bump(&self) -> u64 {
        let mut next = 0;
        self.token.send_modify(|token| {
            *token += 1;
            next = *token;
        });
        info!("refresh: token bumped to {next}");
        next
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.token.subscribe()
    }
}

impl Default for RefreshController {
    fn default() -> Self {
        Self::new()
    }
}
