use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::time::Instant;

use crate::arbitrate::{arbitrate, not_worth_it};
use crate::attempt::{ArbitrationResult, CompressionAttempt};
use crate::config::{CompressOptions, OutputKind};
use crate::error::CompressError;
use crate::events::{EventSink, LogSink, NoopSink, RaceEvent};
use crate::format::ContainerType;
use crate::input::Input;
use crate::materialize::{materialize, Output};
use crate::race::race;
use crate::registry::Registry;
use crate::report::{AllResults, CompressionStats};
use crate::selector::select_backends;

/// Result of [`Compressor::compress`]: the winner alone, or every attempt when
/// `return_all_attempts` is set.
#[derive(Debug, Clone)]
pub enum Compressed {
    Best(Output),
    All(AllResults),
}

impl Compressed {
    pub fn best(&self) -> &Output {
        match self {
            Compressed::Best(output) => output,
            Compressed::All(all) => &all.best,
        }
    }
}

/// Races the registered backends for each call and returns the smallest
/// worthwhile result.
pub struct Compressor {
    registry: Registry,
    sink: Arc<dyn EventSink>,
}

impl Compressor {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn compress(&self, input: impl Into<Input>, options: &CompressOptions) -> Result<Compressed, CompressError> {
        if options.return_all_attempts {
            self.compress_all(input, options).await.map(Compressed::All)
        } else {
            let (bytes, name) = self.prepare(input.into(), options).await?;
            let result = self.run(bytes, options).await?;
            Ok(Compressed::Best(materialize(
                result.winner.into_bytes(),
                options.output,
                name.as_deref(),
            )))
        }
    }

    /// Every attempt, materialized as `options.output`, plus the winner.
    pub async fn compress_all(&self, input: impl Into<Input>, options: &CompressOptions) -> Result<AllResults, CompressError> {
        let (bytes, name) = self.prepare(input.into(), options).await?;
        let original_size = bytes.len();
        let result = self.run(bytes, options).await?;
        Ok(AllResults::from_race(result, original_size, options.output, name.as_deref()))
    }

    /// Winner as a blob typed after the input container, with per-backend numbers.
    pub async fn compress_with_stats(
        &self,
        input: impl Into<Input>,
        options: &CompressOptions,
    ) -> Result<CompressionStats, CompressError> {
        let (bytes, _) = self.prepare(input.into(), options).await?;
        let original_size = bytes.len();
        let mime = ContainerType::classify(&bytes).mime();
        let result = self.run(bytes, options).await?;
        let stats = CompressionStats::from_race(result, original_size, mime);
        log::debug!("{}", stats.summary());
        Ok(stats)
    }

    /// Positional form: optional quality and output kind, everything else default.
    pub async fn compress_legacy(
        &self,
        input: impl Into<Input>,
        quality: Option<f32>,
        output: Option<OutputKind>,
    ) -> Result<Output, CompressError> {
        let options = CompressOptions::legacy(quality, output);
        Ok(self.compress(input, &options).await?.best().clone())
    }

    async fn prepare(&self, input: Input, options: &CompressOptions) -> Result<(Bytes, Option<String>), CompressError> {
        options.validate()?;
        let name = input.name().map(str::to_owned);
        let bytes = input.into_bytes().await?;
        Ok((bytes, name))
    }

    async fn run(&self, input: Bytes, options: &CompressOptions) -> Result<ArbitrationResult, CompressError> {
        let started = Instant::now();
        let container = ContainerType::classify(&input);
        let backends = select_backends(&self.registry, container, options.preserve_metadata)?;
        log::debug!("Racing {:?} on {} input ({} bytes)", backends, container, input.len());

        let attempts = race(&self.registry, input.clone(), options, &backends, self.sink.as_ref()).await?;
        let winner = arbitrate(&attempts, &input, options.quality);
        let total_duration_ms = started.elapsed().as_millis() as u64;

        self.report(&attempts, &winner, input.len(), options.quality, total_duration_ms);

        Ok(ArbitrationResult {
            winner,
            attempts,
            total_duration_ms,
        })
    }

    fn report(
        &self,
        attempts: &[CompressionAttempt],
        winner: &CompressionAttempt,
        original_size: usize,
        quality: f32,
        total_duration_ms: u64,
    ) {
        let best = attempts
            .iter()
            .filter(|a| a.is_success())
            .min_by_key(|a| a.size());
        match best {
            None => self.sink.emit(&RaceEvent::AllFailed { original_size }),
            Some(best) if not_worth_it(best.size(), original_size, quality) => {
                self.sink.emit(&RaceEvent::NotWorthIt {
                    best: best.backend(),
                    best_size: best.size(),
                    original_size,
                })
            }
            Some(_) => {}
        }
        self.sink.emit(&RaceEvent::Selected {
            backend: winner.backend(),
            size: winner.size(),
            original_size,
            total_duration_ms,
        });
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(Registry::default())
    }
}

fn default_compressor() -> &'static Compressor {
    static DEFAULT: OnceLock<Compressor> = OnceLock::new();
    DEFAULT.get_or_init(|| Compressor::default().with_sink(LogSink))
}

/// Compress with the built-in backends, logging race events.
pub async fn compress(input: impl Into<Input>, options: &CompressOptions) -> Result<Compressed, CompressError> {
    default_compressor().compress(input, options).await
}

/// [`Compressor::compress_with_stats`] with the built-in backends.
pub async fn compress_with_stats(
    input: impl Into<Input>,
    options: &CompressOptions,
) -> Result<CompressionStats, CompressError> {
    default_compressor().compress_with_stats(input, options).await
}
