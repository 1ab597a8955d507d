use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::error::{Result, TallyError};

/// Cooperative cancellation flag shared by every blocking call in a session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Non-blocking pre-check; `Err(Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TallyError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Observes interrupt signals for one session. The first signal cancels the
/// token and renders a single notice; later signals only re-cancel.
pub struct InterruptSupervisor {
    token: CancelToken,
    notified: AtomicBool,
    progress_saved: AtomicBool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl InterruptSupervisor {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            token: CancelToken::new(),
            notified: AtomicBool::new(false),
            progress_saved: AtomicBool::new(false),
            out: Mutex::new(out),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn mark_progress_saved(&self) {
        self.progress_saved.store(true, Ordering::SeqCst);
    }

    /// Returns true only for the signal that rendered the notice.
    pub fn signal(&self) -> bool {
        self.token.cancel();
        if self.notified.swap(true, Ordering::SeqCst) {
            debug!("repeated interrupt ignored");
            return false;
        }
        let notice = interrupt_notice(self.progress_saved.load(Ordering::SeqCst));
        info!("session interrupted");
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{notice}");
            let _ = out.flush();
        }
        true
    }
}

pub fn interrupt_notice(progress_saved: bool) -> String {
    if progress_saved {
        "\nInterrupted. Progress so far has been saved; run `tally classify` again to resume."
            .to_string()
    } else {
        "\nInterrupted. Nothing was saved in this session.".to_string()
    }
}

/// Forwards every Ctrl+C delivery to the supervisor from a dedicated thread.
pub fn spawn_ctrl_c_watcher(supervisor: Arc<InterruptSupervisor>) -> Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let handle = std::thread::Builder::new()
        .name("interrupt-watcher".into())
        .spawn(move || {
            runtime.block_on(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    supervisor.signal();
                }
            })
        })?;
    Ok(handle)
}
