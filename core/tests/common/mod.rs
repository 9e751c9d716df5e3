//! Scripted backends for driving the race without real encoders.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};

use image_arbiter::{Backend, BackendError, BackendId, CompressOptions};

/// What a [`ScriptedBackend`] does when invoked.
#[derive(Clone)]
pub enum Script {
    /// Return this many bytes
    Size(usize),
    /// Return the input untouched
    Echo,
    Fail(&'static str),
    Empty,
    Panic,
}

/// Backend with a fixed outcome, an optional delay and an invocation counter.
pub struct ScriptedBackend {
    id: BackendId,
    script: Script,
    delay: Duration,
    preserves_metadata: bool,
    available: bool,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(id: BackendId, script: Script) -> Self {
        Self {
            id,
            script,
            delay: Duration::ZERO,
            preserves_metadata: true,
            available: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.preserves_metadata = false;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Shared counter incremented on every `compress` call.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn preserves_metadata(&self) -> bool {
        self.preserves_metadata
    }

    fn probe(&self) -> Result<(), BackendError> {
        if self.available {
            Ok(())
        } else {
            Err(BackendError::Unavailable {
                backend: self.id,
                reason: "library not installed".into(),
            })
        }
    }

    async fn compress(&self, input: Bytes, _options: &CompressOptions) -> Result<Bytes, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Size(len) => Ok(Bytes::from(vec![0xAB; *len])),
            Script::Echo => Ok(input),
            Script::Fail(msg) => Err(BackendError::Encode((*msg).to_string())),
            Script::Empty => Ok(Bytes::new()),
            Script::Panic => panic!("scripted backend panicked"),
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 67-byte buffer starting with the PNG signature.
pub fn png_magic_input() -> Bytes {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(67, 0);
    Bytes::from(data)
}

/// A noisy RGB image, hard enough to compress that encoders show differences.
pub fn sample_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = (x * 7 + y * 13) as u8;
        Rgb([v, v.wrapping_mul(3), 255 - v])
    })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}
