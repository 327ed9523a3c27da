use super::{Encoder, OutputFormat};
use crate::{Error, Result};
use image::{ColorType, DynamicImage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type SizeFn = Arc<dyn Fn(u8) -> usize + Send + Sync>;

/// Encoder with scripted output sizes, for exercising the compressor without
/// a real codec. Output bytes are `quality` repeated `size` times.
#[derive(Clone)]
pub struct MockEncoder {
    size_fn: SizeFn,
    sizes: Arc<Mutex<HashMap<u8, usize>>>,
    calls: Arc<Mutex<Vec<u8>>>,
    seen_colors: Arc<Mutex<Vec<ColorType>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockEncoder {
    /// By default every quality point costs 1 KB.
    pub fn new() -> Self {
        Self {
            size_fn: Arc::new(|quality| usize::from(quality) * 1024),
            sizes: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            seen_colors: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_size_fn<F>(mut self, size_fn: F) -> Self
    where
        F: Fn(u8) -> usize + Send + Sync + 'static,
    {
        self.size_fn = Arc::new(size_fn);
        self
    }

    /// Pin the encoded size for one quality level.
    pub fn with_size(self, quality: u8, size: usize) -> Self {
        self.sizes.lock().unwrap().insert(quality, size);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Qualities requested so far, in call order.
    pub fn get_calls(&self) -> Vec<u8> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Color type of every image handed to `encode`.
    pub fn get_seen_colors(&self) -> Vec<ColorType> {
        self.seen_colors.lock().unwrap().clone()
    }
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for MockEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Encode("Mock failure".to_string()));
        }

        self.calls.lock().unwrap().push(quality);
        self.seen_colors.lock().unwrap().push(image.color());

        let size = self
            .sizes
            .lock()
            .unwrap()
            .get(&quality)
            .copied()
            .unwrap_or_else(|| (self.size_fn)(quality));
        Ok(vec![quality; size])
    }
}
