//! Cross-domain and pump buffer behavior end to end.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{as_sink, as_source, bucket, similarity, sine, Lcg};
use parking_lot::Mutex;
use stream_graph::{
    connect_output, event_callback, same_node, teardown_output, AudioGraph, AudioNode, AudioSample,
    AudioSink, AudioSource, BufferConfig, BufferEvent, ChannelSink, Clock, CrossDomainBuffer,
    FixedSource, GraphError, LockStepClock, OutputPort, ReadAheadBuffer, ReadResult, SampleFormat,
    WallClock, WriteBehindBuffer,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A source whose reads always fail.
struct FailingSource {
    graph: Arc<AudioGraph>,
    format: SampleFormat,
    output: OutputPort,
    reads: AtomicU64,
}

impl FailingSource {
    fn new(graph: Arc<AudioGraph>, format: SampleFormat) -> Self {
        Self {
            graph,
            format,
            output: OutputPort::new(),
            reads: AtomicU64::new(0),
        }
    }
}

impl AudioNode for FailingSource {
    fn node_name(&self) -> &str {
        "failing"
    }

    fn dispose(&self) {
        teardown_output(self);
    }
}

#[async_trait]
impl AudioSource for FailingSource {
    fn output_format(&self) -> SampleFormat {
        self.format
    }

    fn output_graph(&self) -> &Arc<AudioGraph> {
        &self.graph
    }

    fn output_port(&self) -> &OutputPort {
        &self.output
    }

    fn playback_finished(&self) -> bool {
        false
    }

    async fn read(
        &self,
        _buffer: &mut [f32],
        _cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(GraphError::node_failed("failing", "device unplugged"))
    }
}

/// A source whose reads stall for a minute before producing nothing.
struct StalledSource {
    graph: Arc<AudioGraph>,
    format: SampleFormat,
    output: OutputPort,
    reads: AtomicU64,
}

impl StalledSource {
    fn new(graph: Arc<AudioGraph>, format: SampleFormat) -> Self {
        Self {
            graph,
            format,
            output: OutputPort::new(),
            reads: AtomicU64::new(0),
        }
    }

    async fn wait_for_read(&self) {
        while self.reads.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl AudioNode for StalledSource {
    fn node_name(&self) -> &str {
        "stalled"
    }

    fn dispose(&self) {
        teardown_output(self);
    }
}

#[async_trait]
impl AudioSource for StalledSource {
    fn output_format(&self) -> SampleFormat {
        self.format
    }

    fn output_graph(&self) -> &Arc<AudioGraph> {
        &self.graph
    }

    fn output_port(&self) -> &OutputPort {
        &self.output
    }

    fn playback_finished(&self) -> bool {
        false
    }

    async fn read(
        &self,
        _buffer: &mut [f32],
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        clock.wait(Duration::from_secs(60), cancel).await?;
        Ok(ReadResult::Frames(0))
    }
}

fn stalled_read_ahead() -> (Arc<StalledSource>, Arc<ReadAheadBuffer>) {
    let format = SampleFormat::mono(16000);
    let upstream_graph = AudioGraph::concurrent();
    let source = Arc::new(StalledSource::new(upstream_graph.clone(), format));
    let buffer = Arc::new(
        ReadAheadBuffer::new(
            upstream_graph,
            AudioGraph::concurrent(),
            format,
            None,
            &BufferConfig::default(),
        )
        .unwrap(),
    );
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();
    (source, buffer)
}

async fn wait_for_pump_to_stop(buffer: &ReadAheadBuffer) {
    while buffer.is_pumping() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn test_cross_domain_preserves_stream() {
    let format = SampleFormat::stereo(48000);
    let capture = AudioGraph::concurrent();
    let playback = AudioGraph::concurrent();
    let original = sine(format, Duration::from_secs(5));

    let source = Arc::new(FixedSource::new(capture.clone(), original.clone(), None).unwrap());
    let buffer = Arc::new(
        CrossDomainBuffer::new(capture, playback.clone(), format, None, &BufferConfig::default())
            .unwrap(),
    );
    let (sink, sink_dyn) = bucket(&playback, format);
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();
    connect_output(&as_source(&buffer), &sink_dyn).unwrap();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    let mut sizes = Lcg::new(7);
    'stream: loop {
        source
            .write_to_output(sizes.next_size(4800), &cancel, &clock)
            .await
            .unwrap();
        loop {
            match sink
                .read_from_input(sizes.next_size(3000), &cancel, &clock)
                .await
                .unwrap()
            {
                ReadResult::Finished => break 'stream,
                ReadResult::Frames(0) => break,
                ReadResult::Frames(_) => {}
            }
        }
    }

    let received = sink.audio();
    assert_eq!(received.frame_count(), original.frame_count());
    assert!(similarity(&original.samples, &received.samples) >= 0.999);
    assert_eq!(buffer.stats().overflow_events, 0);
}

#[tokio::test]
async fn test_cross_domain_overflow_keeps_newest() {
    let format = SampleFormat::mono(48000);
    let playback = AudioGraph::concurrent();
    let overflows = Arc::new(AtomicU64::new(0));
    let seen = overflows.clone();
    let config = BufferConfig::default().with_events(event_callback(move |event| {
        if matches!(event, BufferEvent::Overflow { .. }) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    }));
    let buffer = Arc::new(
        CrossDomainBuffer::new(AudioGraph::concurrent(), playback.clone(), format, None, &config)
            .unwrap(),
    );
    assert_eq!(buffer.capacity_frames(), 9600);
    let (_sink, sink_dyn) = bucket(&playback, format);
    connect_output(&as_source(&buffer), &sink_dyn).unwrap();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    let mut sizes = Lcg::new(42);
    let mut counter = 0u32;
    for _ in 0..100 {
        let frames = sizes.next_size(40000);
        let chunk: Vec<f32> = (0..frames)
            .map(|_| {
                counter += 1;
                counter as f32
            })
            .collect();
        buffer.write(&chunk, &cancel, &clock).await.unwrap();
        assert!(buffer.buffered_frames() <= 9600);
    }

    let mut out = vec![0.0; 20000];
    let result = buffer.read(&mut out, &cancel, &clock).await.unwrap();
    assert_eq!(result, ReadResult::Frames(9600));
    let expected: Vec<f32> = ((counter - 9599)..=counter).map(|v| v as f32).collect();
    assert_eq!(out[..9600], expected[..]);
    assert!(overflows.load(Ordering::SeqCst) > 0);
    assert_eq!(buffer.stats().overflow_events, overflows.load(Ordering::SeqCst));

    buffer.write(&[1.0; 500], &cancel, &clock).await.unwrap();
    buffer.clear();
    assert_eq!(buffer.buffered_frames(), 0);
    assert_eq!(
        buffer.read(&mut out, &cancel, &clock).await.unwrap(),
        ReadResult::Frames(0)
    );
}

#[tokio::test]
async fn test_cross_domain_end_of_stream_is_terminal() {
    let format = SampleFormat::mono(16000);
    let capture = AudioGraph::concurrent();
    let playback = AudioGraph::concurrent();
    let source = Arc::new(
        FixedSource::new(capture.clone(), AudioSample::new(vec![0.5; 100], format), None).unwrap(),
    );
    let buffer = Arc::new(
        CrossDomainBuffer::new(capture, playback.clone(), format, None, &BufferConfig::default())
            .unwrap(),
    );
    let (sink, sink_dyn) = bucket(&playback, format);
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();
    connect_output(&as_source(&buffer), &sink_dyn).unwrap();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    source.write_to_output(100, &cancel, &clock).await.unwrap();

    let mut results = Vec::new();
    for _ in 0..6 {
        results.push(sink.read_from_input(40, &cancel, &clock).await.unwrap());
    }
    assert_eq!(
        results,
        vec![
            ReadResult::Frames(40),
            ReadResult::Frames(40),
            ReadResult::Frames(20),
            ReadResult::Finished,
            ReadResult::Finished,
            ReadResult::Finished,
        ]
    );
    assert!(buffer.playback_finished());
}

#[tokio::test]
async fn test_read_ahead_fills_in_lock_step() {
    let format = SampleFormat::mono(16000);
    let upstream_graph = AudioGraph::concurrent();
    let downstream_graph = AudioGraph::concurrent();
    let original = sine(format, Duration::from_secs(1));
    let source = Arc::new(FixedSource::new(upstream_graph.clone(), original.clone(), None).unwrap());
    let buffer = Arc::new(
        ReadAheadBuffer::new(
            upstream_graph,
            downstream_graph.clone(),
            format,
            None,
            &BufferConfig::default(),
        )
        .unwrap(),
    );
    let (sink, sink_dyn) = bucket(&downstream_graph, format);
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();
    connect_output(&as_source(&buffer), &sink_dyn).unwrap();

    let clock = LockStepClock::new();
    let cancel = CancellationToken::new();
    buffer.fill_buffer_in_background(&cancel, &clock).unwrap();
    assert_eq!(clock.participants(), 1);

    // The pump parks only once the ring is full
    clock.step(Duration::from_millis(10)).await;
    assert_eq!(buffer.buffered_frames(), 3200);
    assert_eq!(source.read_calls(), 1);

    assert_eq!(
        sink.read_from_input(1600, &cancel, &clock).await.unwrap(),
        ReadResult::Frames(1600)
    );
    clock.step(Duration::from_millis(10)).await;
    clock.step(Duration::from_millis(10)).await;
    assert_eq!(buffer.buffered_frames(), 3200);

    loop {
        let result = sink.read_from_input(1000, &cancel, &clock).await.unwrap();
        if result.is_finished() {
            break;
        }
        if result == ReadResult::Frames(0) {
            clock.step(Duration::from_millis(10)).await;
        }
    }
    assert_eq!(*sink.audio().samples, *original.samples);
    buffer.close().await;
    assert_eq!(clock.participants(), 0);
}

#[tokio::test]
async fn test_read_ahead_reports_upstream_failure() {
    let format = SampleFormat::mono(16000);
    let upstream_graph = AudioGraph::concurrent();
    let source = Arc::new(FailingSource::new(upstream_graph.clone(), format));
    let buffer = ReadAheadBuffer::new(
        upstream_graph,
        AudioGraph::concurrent(),
        format,
        None,
        &BufferConfig::default(),
    )
    .unwrap();
    let buffer = Arc::new(buffer);
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();

    let cancel = CancellationToken::new();
    buffer
        .fill_buffer_in_background(&cancel, &WallClock::new())
        .unwrap();
    wait_for_pump_to_stop(&buffer).await;

    let err = buffer.wait_for_current_read_to_finish(&cancel).await.unwrap_err();
    assert!(matches!(err, GraphError::NodeFailed { .. }));
    assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    buffer.wait_for_current_read_to_finish(&cancel).await.unwrap();
}

#[tokio::test]
async fn test_read_ahead_close_abandons_slow_upstream_read() {
    let (source, buffer) = stalled_read_ahead();
    let cancel = CancellationToken::new();
    buffer
        .fill_buffer_in_background(&cancel, &WallClock::new())
        .unwrap();
    source.wait_for_read().await;
    assert!(buffer.is_pumping());

    tokio::time::timeout(Duration::from_secs(2), buffer.close())
        .await
        .expect("close waited on the upstream read");
    assert!(!buffer.is_pumping());
    assert!(!cancel.is_cancelled());
    buffer.wait_for_current_read_to_finish(&cancel).await.unwrap();
}

#[tokio::test]
async fn test_read_ahead_caller_cancel_abandons_slow_upstream_read() {
    let (source, buffer) = stalled_read_ahead();
    let cancel = CancellationToken::new();
    buffer
        .fill_buffer_in_background(&cancel, &WallClock::new())
        .unwrap();
    source.wait_for_read().await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), wait_for_pump_to_stop(&buffer))
        .await
        .unwrap();
    assert_eq!(source.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_read_ahead_dispose_abandons_slow_upstream_read() {
    let (source, buffer) = stalled_read_ahead();
    buffer
        .fill_buffer_in_background(&CancellationToken::new(), &WallClock::new())
        .unwrap();
    source.wait_for_read().await;

    buffer.dispose();
    tokio::time::timeout(Duration::from_secs(2), wait_for_pump_to_stop(&buffer))
        .await
        .unwrap();
    assert!(!source.output_port().is_connected());
}

#[tokio::test]
async fn test_read_ahead_restarts_on_read() {
    let format = SampleFormat::mono(16000);
    let upstream_graph = AudioGraph::concurrent();
    let downstream_graph = AudioGraph::concurrent();
    let source = Arc::new(
        FixedSource::new(upstream_graph.clone(), AudioSample::new(vec![0.5; 100], format), None)
            .unwrap(),
    );
    let buffer = Arc::new(
        ReadAheadBuffer::new(
            upstream_graph,
            downstream_graph.clone(),
            format,
            None,
            &BufferConfig::default(),
        )
        .unwrap(),
    );
    let (sink, sink_dyn) = bucket(&downstream_graph, format);
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();
    connect_output(&as_source(&buffer), &sink_dyn).unwrap();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    assert!(!buffer.is_pumping());
    assert_eq!(
        sink.read_from_input(200, &cancel, &clock).await.unwrap(),
        ReadResult::Frames(0)
    );
    assert_eq!(buffer.stats().underflow_reads, 1);
    wait_for_pump_to_stop(&buffer).await;

    assert_eq!(
        sink.read_from_input(200, &cancel, &clock).await.unwrap(),
        ReadResult::Frames(100)
    );
    assert_eq!(
        sink.read_from_input(200, &cancel, &clock).await.unwrap(),
        ReadResult::Finished
    );
}

#[tokio::test]
async fn test_write_behind_flush_delivers_everything() {
    let format = SampleFormat::stereo(16000);
    let writer_graph = AudioGraph::concurrent();
    let device_graph = AudioGraph::concurrent();
    let buffer = Arc::new(
        WriteBehindBuffer::new(
            writer_graph.clone(),
            device_graph.clone(),
            format,
            Some("out"),
            &BufferConfig::default().with_capacity(Duration::from_secs(1)),
        )
        .unwrap(),
    );
    let (sink, sink_dyn) = bucket(&device_graph, format);
    connect_output(&as_source(&buffer), &sink_dyn).unwrap();

    let original = sine(format, Duration::from_millis(500));
    let source = Arc::new(FixedSource::new(writer_graph, original.clone(), None).unwrap());
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    let mut sizes = Lcg::new(3);
    while source.remaining_frames() > 0 {
        source
            .write_to_output(sizes.next_size(700), &cancel, &clock)
            .await
            .unwrap();
    }
    buffer.flush(&cancel, &clock).await.unwrap();

    assert_eq!(*sink.audio().samples, *original.samples);
    assert_eq!(sink.flush_count(), 1);
    assert_eq!(buffer.buffered_frames(), 0);
    assert!(buffer.playback_finished());
    buffer.close().await;
}

#[tokio::test]
async fn test_write_behind_rejects_input_after_finish() {
    let format = SampleFormat::mono(16000);
    let writer_graph = AudioGraph::concurrent();
    let buffer = Arc::new(
        WriteBehindBuffer::new(
            writer_graph.clone(),
            AudioGraph::concurrent(),
            format,
            None,
            &BufferConfig::default(),
        )
        .unwrap(),
    );
    let source = Arc::new(
        FixedSource::new(writer_graph.clone(), AudioSample::new(vec![0.25; 100], format), None)
            .unwrap(),
    );
    connect_output(&as_source(&source), &as_sink(&buffer)).unwrap();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    assert_eq!(source.write_to_output(100, &cancel, &clock).await.unwrap(), 100);
    buffer.flush(&cancel, &clock).await.unwrap();
    assert!(buffer.playback_finished());

    let late = Arc::new(
        FixedSource::new(writer_graph, AudioSample::new(vec![0.5; 10], format), None).unwrap(),
    );
    let result = connect_output(&as_source(&late), &as_sink(&buffer));
    assert!(matches!(result, Err(GraphError::InvalidState { .. })));
    assert!(!late.output_port().is_connected());
    assert!(same_node(
        &buffer.input_port().peer().unwrap(),
        &as_source(&source)
    ));
}

#[tokio::test]
async fn test_write_behind_surfaces_downstream_failure() {
    let format = SampleFormat::mono(16000);
    let device_graph = AudioGraph::concurrent();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = failures.clone();
    let config = BufferConfig::default().with_events(event_callback(move |event| {
        if let BufferEvent::PumpFailed { error, .. } = event {
            seen.lock().push(error);
        }
    }));
    let buffer = Arc::new(
        WriteBehindBuffer::new(
            AudioGraph::concurrent(),
            device_graph.clone(),
            format,
            None,
            &config,
        )
        .unwrap(),
    );
    let (tx, rx) = mpsc::channel(4);
    drop(rx);
    let closed = Arc::new(ChannelSink::new(device_graph, format, tx, None).unwrap());
    connect_output(&as_source(&buffer), &as_sink(&closed)).unwrap();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    buffer.write(&[0.1; 320], &cancel, &clock).await.unwrap();
    let err = buffer.flush(&cancel, &clock).await.unwrap_err();
    assert!(matches!(err, GraphError::NodeFailed { .. }));
    assert!(!failures.lock().is_empty());

    // The failure is reported once
    buffer.flush(&cancel, &clock).await.unwrap();
}

#[tokio::test]
async fn test_dispose_stops_pumps() {
    let format = SampleFormat::mono(16000);
    let a = AudioGraph::concurrent();
    let b = AudioGraph::concurrent();
    let ahead = ReadAheadBuffer::new(a.clone(), b.clone(), format, None, &BufferConfig::default())
        .unwrap();
    let behind =
        WriteBehindBuffer::new(a, b, format, None, &BufferConfig::default()).unwrap();
    ahead.dispose();
    behind.dispose();
    ahead.dispose();

    let cancel = CancellationToken::new();
    let clock = WallClock::new();
    assert!(matches!(
        ahead.fill_buffer_in_background(&cancel, &clock),
        Err(GraphError::Disposed { .. })
    ));
    assert!(matches!(
        behind.write(&[0.0; 16], &cancel, &clock).await,
        Err(GraphError::Disposed { .. })
    ));
    assert!(ahead.input_port().is_disposed());
    assert!(behind.output_port().is_disposed());
}
