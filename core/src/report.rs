use serde::Serialize;

use crate::attempt::{ArbitrationResult, CompressionAttempt};
use crate::backend::BackendId;
use crate::config::OutputKind;
use crate::materialize::{materialize, BlobDescriptor, Output};

/// Percentage saved going from `original` to `compressed` bytes. Negative
/// when the result grew.
pub fn savings_pct(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One backend's attempt, materialized.
#[derive(Debug, Clone)]
pub struct ResultItem {
    pub backend: BackendId,
    pub output: Output,
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f64,
    pub duration_ms: u64,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// The winner plus every attempt, in dispatch order.
#[derive(Debug, Clone)]
pub struct AllResults {
    pub best: Output,
    pub best_backend: BackendId,
    pub results: Vec<ResultItem>,
    pub total_duration_ms: u64,
}

impl AllResults {
    pub(crate) fn from_race(
        result: ArbitrationResult,
        original_size: usize,
        kind: OutputKind,
        name_hint: Option<&str>,
    ) -> Self {
        let results = result
            .attempts
            .into_iter()
            .map(|attempt| ResultItem {
                backend: attempt.backend(),
                original_size,
                compressed_size: attempt.size(),
                compression_ratio: savings_pct(original_size, attempt.size()),
                duration_ms: attempt.duration_ms(),
                succeeded: attempt.is_success(),
                error: attempt.error().map(str::to_owned),
                output: materialize(attempt.into_bytes(), kind, name_hint),
            })
            .collect();

        Self {
            best_backend: result.winner.backend(),
            best: materialize(result.winner.into_bytes(), kind, name_hint),
            results,
            total_duration_ms: result.total_duration_ms,
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ResultItem> {
        self.results.iter().filter(|r| r.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ResultItem> {
        self.results.iter().filter(|r| !r.succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStat {
    pub backend: BackendId,
    pub size: usize,
    pub duration_ms: u64,
    pub compression_ratio: f64,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&CompressionAttempt> for BackendStat {
    fn from(attempt: &CompressionAttempt) -> Self {
        Self {
            backend: attempt.backend(),
            size: attempt.size(),
            duration_ms: attempt.duration_ms(),
            compression_ratio: 0.0,
            succeeded: attempt.is_success(),
            error: attempt.error().map(str::to_owned),
        }
    }
}

/// Summary of one race with the winner as a blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionStats {
    pub best_backend: BackendId,
    pub compressed_file: BlobDescriptor,
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f64,
    pub total_duration_ms: u64,
    pub per_backend: Vec<BackendStat>,
}

impl CompressionStats {
    pub(crate) fn from_race(result: ArbitrationResult, original_size: usize, mime: &'static str) -> Self {
        let per_backend = result
            .attempts
            .iter()
            .map(|attempt| BackendStat {
                compression_ratio: savings_pct(original_size, attempt.size()),
                ..BackendStat::from(attempt)
            })
            .collect();
        let compressed_size = result.winner.size();

        Self {
            best_backend: result.winner.backend(),
            compressed_file: BlobDescriptor::new(result.winner.into_bytes(), mime),
            original_size,
            compressed_size,
            compression_ratio: savings_pct(original_size, compressed_size),
            total_duration_ms: result.total_duration_ms,
            per_backend,
        }
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} -> {} ({:.1}% reduction) in {}ms",
            self.best_backend,
            format_size(self.original_size as u64),
            format_size(self.compressed_size as u64),
            self.compression_ratio,
            self.total_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn race_result() -> ArbitrationResult {
        let input = Bytes::from(vec![0u8; 200]);
        let winner = CompressionAttempt::succeeded(BackendId::Optimizer, Bytes::from(vec![1u8; 50]), 12);
        ArbitrationResult {
            winner: winner.clone(),
            attempts: vec![
                CompressionAttempt::succeeded(BackendId::Codec, Bytes::from(vec![1u8; 150]), 8),
                winner,
                CompressionAttempt::failed(BackendId::Tinify, input, "remote service error: 401", 30),
            ],
            total_duration_ms: 31,
        }
    }

    #[test]
    fn savings_handles_edges() {
        assert_eq!(savings_pct(0, 10), 0.0);
        assert_eq!(savings_pct(100, 25), 75.0);
        assert_eq!(savings_pct(100, 150), -50.0);
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn all_results_keep_dispatch_order() {
        let all = AllResults::from_race(race_result(), 200, OutputKind::Bytes, None);
        assert_eq!(all.best_backend, BackendId::Optimizer);
        let order: Vec<_> = all.results.iter().map(|r| r.backend).collect();
        assert_eq!(order, vec![BackendId::Codec, BackendId::Optimizer, BackendId::Tinify]);
        assert_eq!(all.succeeded().count(), 2);

        let failed: Vec<_> = all.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].compressed_size, 200);
        assert_eq!(failed[0].compression_ratio, 0.0);
        assert!(failed[0].error.as_deref().is_some_and(|e| e.contains("401")));
    }

    #[test]
    fn stats_serialize_camel_case() {
        let stats = CompressionStats::from_race(race_result(), 200, "image/png");
        assert_eq!(stats.compressed_size, 50);
        assert_eq!(stats.compression_ratio, 75.0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["bestBackend"], "optimizer");
        assert_eq!(json["compressedFile"]["mime"], "image/png");
        assert_eq!(json["perBackend"].as_array().unwrap().len(), 3);
        assert!(json["perBackend"][0].get("error").is_none());
        assert!(stats.summary().starts_with("optimizer: 200 B -> 50 B"));
    }
}
