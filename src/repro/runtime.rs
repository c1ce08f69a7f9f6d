//! Process-wide interception state.
//!
//! The layer is installed once (usually by the first session) and stays in
//! place; each test activates its own interceptor and must deactivate it
//! when it ends. [`crate::process::run`] consults this state on every call.

use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard};

use crate::process::runner::{ProcessRunner, RealProcessRunner};

fn installed_cell() -> &'static Mutex<bool> {
    static CELL: OnceLock<Mutex<bool>> = OnceLock::new();
    CELL.get_or_init(|| Mutex::new(false))
}

fn active_cell() -> &'static Mutex<Option<Arc<dyn ProcessRunner>>> {
    static CELL: OnceLock<Mutex<Option<Arc<dyn ProcessRunner>>>> = OnceLock::new();
    CELL.get_or_init(|| Mutex::new(None))
}

fn session_cell() -> &'static Mutex<()> {
    static CELL: OnceLock<Mutex<()>> = OnceLock::new();
    CELL.get_or_init(|| Mutex::new(()))
}

/// Route [`crate::process::run`] through the active session. Idempotent.
pub fn install() {
    let mut installed = installed_cell().lock();
    if !*installed {
        tracing::debug!("Installed process interception layer");
        *installed = true;
    }
}

/// Restore real execution for [`crate::process::run`]. Idempotent.
pub fn uninstall() {
    let mut installed = installed_cell().lock();
    if *installed {
        tracing::debug!("Uninstalled process interception layer");
        *installed = false;
    }
}

pub fn is_installed() -> bool {
    *installed_cell().lock()
}

/// Make `runner` the interceptor for the current test.
pub fn activate(runner: Arc<dyn ProcessRunner>) {
    *active_cell().lock() = Some(runner);
}

/// Drop the current test's interceptor. Must run between tests.
pub fn deactivate() {
    active_cell().lock().take();
}

pub fn is_active() -> bool {
    active_cell().lock().is_some()
}

/// The runner [`crate::process::run`] should use right now.
pub fn current_runner() -> Arc<dyn ProcessRunner> {
    if is_installed() {
        if let Some(runner) = active_cell().lock().as_ref() {
            return runner.clone();
        }
    }
    Arc::new(RealProcessRunner)
}

/// Serializes sessions that use the process-wide entry point. Held for the
/// lifetime of a session guard.
pub(crate) fn lock_sessions() -> MutexGuard<'static, ()> {
    session_cell().lock()
}
