use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Context, Result};
use tracing::{debug, warn};

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cooperative cancellation flag shared with the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Observed at the next chunk boundary.
    Pending,
    /// Held until the enclosing critical section closes.
    Deferred,
    /// A repeated interrupt outside any critical section; the process exits.
    Forced,
}

#[derive(Debug, Default)]
struct TokenState {
    requested: AtomicBool,
    critical_depth: AtomicUsize,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if token.cancel() == Delivery::Forced {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
        .context("failed to install Ctrl-C handler")
    }

    pub fn cancel(&self) -> Delivery {
        let repeated = self.state.requested.swap(true, Ordering::SeqCst);
        if self.state.critical_depth.load(Ordering::SeqCst) > 0 {
            debug!("interrupt received inside critical section, delaying");
            Delivery::Deferred
        } else if repeated {
            warn!("second interrupt received, exiting without waiting for the chunk");
            Delivery::Forced
        } else {
            warn!("interrupt received, stopping at the next chunk boundary");
            Delivery::Pending
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.critical_depth.load(Ordering::SeqCst) == 0
            && self.state.requested.load(Ordering::SeqCst)
    }

    pub fn critical_section(&self) -> CriticalSection<'_> {
        self.state.critical_depth.fetch_add(1, Ordering::SeqCst);
        CriticalSection { token: self }
    }
}

#[must_use = "the section closes when the guard is dropped"]
pub struct CriticalSection<'a> {
    token: &'a CancellationToken,
}

impl CriticalSection<'_> {
    pub fn finish(self) -> bool {
        let token = self.token;
        drop(self);
        token.is_cancelled()
    }
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        self.token
            .state
            .critical_depth
            .fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct Interrupted {
    pub checkpoint_path: PathBuf,
    pub cursor: usize,
    pub total: usize,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "interrupted after {}/{} identifiers, progress saved to {}",
            self.cursor,
            self.total,
            self.checkpoint_path.display()
        )
    }
}

impl std::error::Error for Interrupted {}
