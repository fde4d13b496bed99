use std::sync::{Mutex, OnceLock};

type DownloadCallback = Box<dyn Fn(u64, u64) + Send + 'static>;
type BatchCallback = Box<dyn Fn(BatchProgress) + Send + 'static>;

static DOWNLOAD_PROGRESS_CB: OnceLock<Mutex<Option<DownloadCallback>>> = OnceLock::new();
static BATCH_PROGRESS_CB: OnceLock<Mutex<Option<BatchCallback>>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchProgress {
    Stage(&'static str),
    Songs { done: usize, total: usize },
    Finished { succeeded: usize, failed: usize },
}

pub fn set_download_progress_callback(cb: impl Fn(u64, u64) + Send + 'static) {
    let slot = DOWNLOAD_PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn emit_download_progress(done: u64, total: u64) {
    if let Some(m) = DOWNLOAD_PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(done, total);
            }
        }
    }
}

pub fn set_batch_progress_callback(cb: impl Fn(BatchProgress) + Send + 'static) {
    let slot = BATCH_PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn emit_batch_progress(progress: BatchProgress) {
    if let Some(m) = BATCH_PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(progress);
            }
        }
    }
}
