//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stream_graph::{AudioGraph, AudioSample, AudioSink, AudioSource, BucketSink, SampleFormat};

/// Deterministic pseudo-random sizes (LCG), so failures reproduce.
pub struct Lcg(u32);

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self(seed)
    }

    /// Next value in `1..=max`.
    pub fn next_size(&mut self, max: usize) -> usize {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12345);
        (self.0 >> 8) as usize % max + 1
    }
}

/// A stereo sine long enough to notice reordering or gaps.
pub fn sine(format: SampleFormat, duration: Duration) -> AudioSample {
    AudioSample::sine(format, 440.0, 0.8, duration)
}

/// Normalized cross-correlation at lag zero; 1.0 for identical signals.
pub fn similarity(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let (mut dot, mut aa, mut bb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a[..len].iter().zip(&b[..len]) {
        dot += f64::from(x) * f64::from(y);
        aa += f64::from(x) * f64::from(x);
        bb += f64::from(y) * f64::from(y);
    }
    let length_penalty = len as f64 / a.len().max(b.len()) as f64;
    dot / (aa.sqrt() * bb.sqrt()).max(f64::EPSILON) * length_penalty
}

/// A bucket and its trait-object view.
pub fn bucket(graph: &Arc<AudioGraph>, format: SampleFormat) -> (Arc<BucketSink>, Arc<dyn AudioSink>) {
    let sink = Arc::new(BucketSink::new(graph.clone(), format, None).unwrap());
    let dyn_sink: Arc<dyn AudioSink> = sink.clone();
    (sink, dyn_sink)
}

pub fn as_source<T: AudioSource + 'static>(node: &Arc<T>) -> Arc<dyn AudioSource> {
    node.clone()
}

pub fn as_sink<T: AudioSink + 'static>(node: &Arc<T>) -> Arc<dyn AudioSink> {
    node.clone()
}
