use crate::backend::BackendId;
use crate::report::savings_pct;

/// Something observable that happened during one race.
#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    /// Candidates narrowed to metadata-capable backends
    CandidatesFiltered { kept: Vec<BackendId> },
    /// One backend settled
    AttemptFinished {
        backend: BackendId,
        size: usize,
        duration_ms: u64,
        error: Option<String>,
    },
    /// No backend succeeded; the input is returned as is
    AllFailed { original_size: usize },
    /// The best result saved too little at high quality; the input is returned as is
    NotWorthIt {
        best: BackendId,
        best_size: usize,
        original_size: usize,
    },
    /// Final pick
    Selected {
        backend: BackendId,
        size: usize,
        original_size: usize,
        total_duration_ms: u64,
    },
}

/// Receives [`RaceEvent`]s. Implemented for closures.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RaceEvent);
}

impl<F> EventSink for F
where
    F: Fn(&RaceEvent) + Send + Sync,
{
    fn emit(&self, event: &RaceEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &RaceEvent) {}
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &RaceEvent) {
        match event {
            RaceEvent::CandidatesFiltered { kept } => {
                log::debug!("Metadata-capable backends: {:?}", kept);
            }
            RaceEvent::AttemptFinished {
                backend,
                size,
                duration_ms,
                error: None,
            } => {
                log::debug!("{} finished: {} bytes in {}ms", backend, size, duration_ms);
            }
            RaceEvent::AttemptFinished {
                backend,
                duration_ms,
                error: Some(err),
                ..
            } => {
                log::warn!("{} failed after {}ms: {}", backend, duration_ms, err);
            }
            RaceEvent::AllFailed { original_size } => {
                log::warn!("All compression attempts failed, returning original ({} bytes)", original_size);
            }
            RaceEvent::NotWorthIt {
                best,
                best_size,
                original_size,
            } => {
                log::info!(
                    "Best compression ({}) size: {}, original: {}, using original",
                    best,
                    best_size,
                    original_size
                );
            }
            RaceEvent::Selected {
                backend,
                size,
                original_size,
                total_duration_ms,
            } => {
                log::info!(
                    "Best compression result: {} ({} bytes, {:.1}% reduction) - total time: {}ms",
                    backend,
                    size,
                    savings_pct(*original_size, *size),
                    total_duration_ms
                );
            }
        }
    }
}
