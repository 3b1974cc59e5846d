//! Database mirror selection.
//!
//! The reference databases are replicated across regional mirrors. Rather
//! than guessing from geography, every mirror is probed concurrently and the
//! first to answer wins; the rest are cancelled.

use super::config::NetworkConfig;
use super::error::EngineError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{debug, warn};

/// Regional suffixes of the database host, probed in parallel. The empty
/// suffix is the primary host.
pub const MIRROR_SUFFIXES: [&str; 3] = ["", "-europe", "-asia"];

/// Run every task on its own thread and return the first success. The winner
/// flips the shared cancellation flag; well-behaved tasks poll it between
/// steps and bail early. Fails only when every task failed.
pub fn race_first_success<T, F>(tasks: Vec<F>) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> Result<T, EngineError> + Send + 'static,
{
    let attempted = tasks.len();
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    for task in tasks {
        let cancel = Arc::clone(&cancel);
        let tx = tx.clone();
        thread::spawn(move || {
            let _ = tx.send(task(&cancel));
        });
    }
    drop(tx);

    for result in rx {
        match result {
            Ok(value) => {
                cancel.store(true, Ordering::Relaxed);
                return Ok(value);
            }
            Err(e) => warn!("Mirror candidate failed: {e}"),
        }
    }
    Err(EngineError::AllMirrorsFailed { attempted })
}

/// Pick the reachable mirror with the lowest observed latency by racing one
/// ranged probe request per suffix. `url_for` maps a suffix to the URL of a
/// small representative object on that mirror.
pub fn select_mirror(
    network: &NetworkConfig,
    url_for: impl Fn(&str) -> String,
) -> Result<&'static str, EngineError> {
    let probe_timeout = network.probe_timeout();
    let tasks: Vec<_> = MIRROR_SUFFIXES
        .iter()
        .map(|&suffix| {
            let url = url_for(suffix);
            move |cancel: &AtomicBool| -> Result<&'static str, EngineError> {
                let client = reqwest::blocking::Client::builder()
                    .timeout(probe_timeout)
                    .build()?;
                let response = client
                    .get(&url)
                    .header(reqwest::header::RANGE, "bytes=0-0")
                    .send()?;
                if cancel.load(Ordering::Relaxed) {
                    return Err(EngineError::Internal("probe cancelled".into()));
                }
                response.error_for_status()?;
                Ok(suffix)
            }
        })
        .collect();
    let suffix = race_first_success(tasks)?;
    debug!(mirror = %if suffix.is_empty() { "primary" } else { suffix }, "Selected database mirror");
    Ok(suffix)
}
