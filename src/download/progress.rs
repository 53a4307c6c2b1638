//! Download progress reporting.

/// Receives progress updates while a document is streamed to disk
pub trait ProgressSink: Send + Sync {
    /// Called after every chunk with the bytes written so far and the
    /// advertised length, when the server sent one
    fn on_progress(&self, downloaded: u64, total: Option<u64>);

    /// Called when the engine starts on a candidate URL
    fn on_attempt(&self, _url: &str) {}
}

/// Discards all progress updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _downloaded: u64, _total: Option<u64>) {}
}

impl<F> ProgressSink for F
where
    F: Fn(u64, Option<u64>) + Send + Sync,
{
    fn on_progress(&self, downloaded: u64, total: Option<u64>) {
        self(downloaded, total)
    }
}

/// Percentage complete, when the total is known and non-zero
pub fn percent(downloaded: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some((downloaded as f64 / total as f64 * 100.0).min(100.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_percent() {
        assert_eq!(percent(50, Some(200)), Some(25.0));
        assert_eq!(percent(10, None), None);
        assert_eq!(percent(10, Some(0)), None);
        assert_eq!(percent(300, Some(200)), Some(100.0));
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |downloaded: u64, total: Option<u64>| {
            seen.lock().unwrap().push((downloaded, total));
        };
        sink.on_progress(10, Some(20));
        sink.on_progress(20, Some(20));
        NoProgress.on_progress(1, None);

        assert_eq!(*seen.lock().unwrap(), vec![(10, Some(20)), (20, Some(20))]);
    }
}
