use bytes::Bytes;
use futures::future::join_all;
use tokio::time::Instant;

use crate::attempt::CompressionAttempt;
use crate::backend::BackendId;
use crate::config::CompressOptions;
use crate::error::{BackendError, CompressError};
use crate::events::{EventSink, RaceEvent};
use crate::format::ContainerType;
use crate::registry::Registry;
use crate::selector;

/// Run every backend concurrently on the same input and collect one attempt
/// per backend, in dispatch order.
///
/// A backend that fails, panics, returns nothing or cannot be resolved yields
/// a failed attempt carrying the input; its siblings are not affected. All
/// tasks are awaited, none are cancelled. An empty backend list is an error,
/// never an empty result.
pub async fn race(
    registry: &Registry,
    input: Bytes,
    options: &CompressOptions,
    backends: &[BackendId],
    sink: &dyn EventSink,
) -> Result<Vec<CompressionAttempt>, CompressError> {
    if backends.is_empty() {
        return Err(CompressError::NoCapableBackend {
            container: ContainerType::classify(&input),
        });
    }

    let backends = if options.preserve_metadata {
        let kept = selector::retain_capable(registry, backends);
        if kept.is_empty() {
            return Err(CompressError::NoCapableBackend {
                container: ContainerType::classify(&input),
            });
        }
        sink.emit(&RaceEvent::CandidatesFiltered { kept: kept.clone() });
        kept
    } else {
        backends.to_vec()
    };

    let mut dispatched = Vec::with_capacity(backends.len());
    for id in backends {
        let started = Instant::now();
        let task = registry.resolve(id).map(|backend| {
            let input = input.clone();
            let options = options.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let result = backend.compress(input, &options).await;
                (result, elapsed_ms(started))
            })
        });
        dispatched.push((id, started, task));
    }

    let settled = join_all(dispatched.iter_mut().map(|(_, _, task)| async move {
        match task {
            Ok(handle) => Some(handle.await),
            Err(_) => None,
        }
    }))
    .await;

    let mut attempts = Vec::with_capacity(settled.len());
    for ((id, started, task), outcome) in dispatched.into_iter().zip(settled) {
        let attempt = match outcome {
            Some(Ok((Ok(bytes), duration_ms))) if !bytes.is_empty() => {
                CompressionAttempt::succeeded(id, bytes, duration_ms)
            }
            Some(Ok((Ok(_), duration_ms))) => {
                CompressionAttempt::failed(id, input.clone(), BackendError::EmptyOutput.to_string(), duration_ms)
            }
            Some(Ok((Err(err), duration_ms))) => CompressionAttempt::failed(id, input.clone(), err.to_string(), duration_ms),
            Some(Err(join_err)) => {
                let err = BackendError::TaskFailed(join_err.to_string());
                CompressionAttempt::failed(id, input.clone(), err.to_string(), elapsed_ms(started))
            }
            None => {
                let reason = task.err().map(|e| e.to_string()).unwrap_or_default();
                log::debug!("Skipped {}: {}", id, reason);
                CompressionAttempt::failed(id, input.clone(), reason, 0)
            }
        };
        sink.emit(&RaceEvent::AttemptFinished {
            backend: attempt.backend(),
            size: attempt.size(),
            duration_ms: attempt.duration_ms(),
            error: attempt.error().map(str::to_owned),
        });
        attempts.push(attempt);
    }

    Ok(attempts)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
