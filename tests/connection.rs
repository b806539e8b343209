//! Connection protocol behavior across node types.

mod common;

use std::sync::Arc;

use common::{as_sink, as_source, bucket};
use stream_graph::{
    connect_input, connect_output, disconnect_input, disconnect_output, same_node, AudioGraph,
    AudioNode, AudioSample, AudioSink, AudioSource, FixedSource, GraphError, SampleFormat,
};

fn source(graph: &Arc<AudioGraph>, format: SampleFormat) -> Arc<FixedSource> {
    Arc::new(FixedSource::new(graph.clone(), AudioSample::new(vec![0.0; 64], format), None).unwrap())
}

#[test]
fn test_connect_is_exclusive_on_both_sides() {
    let graph = AudioGraph::concurrent();
    let format = SampleFormat::mono(16000);
    let a = source(&graph, format);
    let b = source(&graph, format);
    let (x, x_dyn) = bucket(&graph, format);
    let (y, y_dyn) = bucket(&graph, format);

    connect_output(&as_source(&a), &x_dyn).unwrap();
    connect_output(&as_source(&b), &y_dyn).unwrap();

    // a -> y replaces both a -> x and b -> y
    connect_output(&as_source(&a), &y_dyn).unwrap();
    assert!(same_node(&a.output_port().peer().unwrap(), &y));
    assert!(same_node(&y.input_port().peer().unwrap(), &a));
    assert!(!x.input_port().is_connected());
    assert!(!b.output_port().is_connected());
}

#[test]
fn test_connect_input_mirrors_connect_output() {
    let graph = AudioGraph::exclusive();
    let format = SampleFormat::stereo(48000);
    let a = source(&graph, format);
    let (x, x_dyn) = bucket(&graph, format);

    connect_input(&x_dyn, &as_source(&a)).unwrap();
    assert!(same_node(&a.output_port().peer().unwrap(), &x));

    // reconnecting the same edge is a no-op
    connect_input(&x_dyn, &as_source(&a)).unwrap();
    assert!(x.input_port().is_connected());
}

#[test]
fn test_disconnect_is_idempotent() {
    let graph = AudioGraph::concurrent();
    let format = SampleFormat::mono(16000);
    let a = source(&graph, format);
    let (x, x_dyn) = bucket(&graph, format);
    connect_output(&as_source(&a), &x_dyn).unwrap();

    disconnect_output(a.as_ref());
    disconnect_output(a.as_ref());
    disconnect_input(x.as_ref());
    assert!(!a.output_port().is_connected());
    assert!(!x.input_port().is_connected());

    connect_output(&as_source(&a), &x_dyn).unwrap();
    assert!(x.input_port().is_connected());
}

#[test]
fn test_format_mismatch_changes_nothing() {
    let graph = AudioGraph::concurrent();
    let a = source(&graph, SampleFormat::mono(16000));
    let (x, x_dyn) = bucket(&graph, SampleFormat::mono(16000));
    let (_, stereo_dyn) = bucket(&graph, SampleFormat::stereo(16000));
    connect_output(&as_source(&a), &x_dyn).unwrap();

    let err = connect_output(&as_source(&a), &stereo_dyn).unwrap_err();
    assert!(matches!(err, GraphError::FormatMismatch { .. }));
    assert!(same_node(&a.output_port().peer().unwrap(), &x));
}

#[test]
fn test_graph_mismatch_rejected() {
    let format = SampleFormat::mono(16000);
    let a = source(&AudioGraph::concurrent(), format);
    let (_, x_dyn) = bucket(&AudioGraph::concurrent(), format);
    assert!(matches!(
        connect_output(&as_source(&a), &x_dyn),
        Err(GraphError::InvalidArgument { .. })
    ));
}

#[test]
fn test_disposed_endpoints_reject_connections() {
    let graph = AudioGraph::concurrent();
    let format = SampleFormat::mono(16000);
    let a = source(&graph, format);
    let (x, x_dyn) = bucket(&graph, format);
    connect_output(&as_source(&a), &x_dyn).unwrap();

    x.dispose();
    assert!(!a.output_port().is_connected());
    assert!(x.input_port().is_disposed());
    assert!(matches!(
        connect_output(&as_source(&a), &x_dyn),
        Err(GraphError::Disposed { .. })
    ));

    a.dispose();
    let (_, y_dyn) = bucket(&graph, format);
    assert!(matches!(
        connect_output(&as_source(&a), &y_dyn),
        Err(GraphError::Disposed { .. })
    ));
}

#[test]
fn test_node_names_are_unique_per_graph() {
    let graph = AudioGraph::concurrent();
    let format = SampleFormat::mono(16000);
    let a = source(&graph, format);
    let b = source(&graph, format);
    assert_ne!(a.node_name(), b.node_name());

    let named = FixedSource::new(graph, AudioSample::new(vec![], format), Some("mic")).unwrap();
    assert_eq!(named.node_name(), "FixedSource:mic");
}

#[test]
fn test_same_node_across_views() {
    let graph = AudioGraph::concurrent();
    let format = SampleFormat::mono(16000);
    let (x, x_dyn) = bucket(&graph, format);
    assert!(same_node(&x, &x_dyn));
    let other = as_sink(&bucket(&graph, format).0);
    assert!(!same_node(&x_dyn, &other));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rewiring_keeps_edges_consistent() {
    let graph = AudioGraph::concurrent();
    let format = SampleFormat::mono(16000);
    let sources: Vec<_> = (0..4).map(|_| source(&graph, format)).collect();
    let sinks: Vec<_> = (0..4).map(|_| bucket(&graph, format)).collect();

    let mut tasks = Vec::new();
    for t in 0..8usize {
        let sources: Vec<Arc<dyn AudioSource>> = sources.iter().map(as_source).collect();
        let sinks: Vec<Arc<dyn AudioSink>> = sinks.iter().map(|(_, s)| s.clone()).collect();
        tasks.push(tokio::spawn(async move {
            for i in 0..200usize {
                let s = &sources[(i + t) % 4];
                let k = &sinks[(i * 3 + t) % 4];
                if i % 5 == 0 {
                    disconnect_output(s.as_ref());
                } else {
                    connect_output(s, k).unwrap();
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for source in &sources {
        if let Some(sink) = source.output_port().peer() {
            let back = sink.input_port().peer().unwrap();
            assert!(same_node(&back, source));
        }
    }
    for (sink, _) in &sinks {
        if let Some(src) = sink.input_port().peer() {
            let back = src.output_port().peer().unwrap();
            assert!(same_node(&back, sink));
        }
    }
}
