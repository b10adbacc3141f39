//! End-to-end pipeline behavior against an in-memory sink.

use libhoney::{ClientBuilder, MockSink};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn seals_batches_by_destination_and_delivers_responses() {
    let sink: Arc<MockSink<()>> = MockSink::new();
    let (client, mut responses) = ClientBuilder::<()>::new("https://api.honeycomb.io", "wk", "ignored")
        .max_batch_size(2)
        .batch_timeout(Duration::from_secs(10))
        .sink(sink.clone())
        .build()
        .unwrap();

    for dataset in ["a", "b"] {
        for n in 0..2 {
            let event = libhoney::EventBuilder::<()>::new("https://api.honeycomb.io", "wk", dataset)
                .add_field("n", n)
                .build()
                .unwrap();
            client.submit(event).await.unwrap();
        }
    }

    let mut seen = 0;
    for _ in 0..4 {
        let response = tokio::time::timeout(Duration::from_secs(1), responses.recv())
            .await
            .expect("response should arrive promptly")
            .unwrap();
        assert!(response.is_success());
        seen += 1;
    }
    assert_eq!(seen, 4);

    let batches = sink.captured_batches();
    assert_eq!(batches.len(), 2);
    for batch in &batches {
        assert_eq!(batch.event_count, 2);
    }

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn overflow_drops_report_queue_overflow_without_blocking() {
    let sink: Arc<MockSink<()>> = MockSink::new();
    let (client, mut responses) = ClientBuilder::<()>::new("h", "w", "d")
        .pending_work_capacity(1)
        .max_batch_size(10_000)
        .batch_timeout(Duration::from_secs(10))
        .block_on_send(false)
        .sink(sink)
        .build()
        .unwrap();

    let mut overflowed = false;
    for n in 0..200 {
        let event = client.event().add_field("n", n).build().unwrap();
        client.submit(event).await.unwrap();
    }

    for _ in 0..200 {
        if let Ok(Some(response)) =
            tokio::time::timeout(Duration::from_millis(200), responses.recv()).await
        {
            if matches!(response.err, Some(libhoney::DeliveryError::QueueOverflow)) {
                overflowed = true;
                break;
            }
        } else {
            break;
        }
    }

    assert!(overflowed, "expected at least one queue overflow under a saturated channel");
    client.close().await;
}

#[tokio::test]
async fn close_drains_open_batches_before_the_response_channel_closes() {
    let sink: Arc<MockSink<()>> = MockSink::new();
    let (client, mut responses) = ClientBuilder::<()>::new("h", "w", "d")
        .max_batch_size(1_000)
        .batch_timeout(Duration::from_secs(10))
        .sink(sink.clone())
        .build()
        .unwrap();

    for n in 0..10 {
        let event = client.event().add_field("n", n).build().unwrap();
        client.submit(event).await.unwrap();
    }

    client.close().await;
    drop(client);

    let mut count = 0;
    while let Some(response) = responses.recv().await {
        assert!(response.is_success());
        count += 1;
    }
    assert_eq!(count, 10);
    assert_eq!(sink.total_events(), 10);
}

#[tokio::test]
async fn flush_restarts_the_pipeline_for_subsequent_submits() {
    let sink: Arc<MockSink<()>> = MockSink::new();
    let (client, mut responses) = ClientBuilder::<()>::new("h", "w", "d")
        .max_batch_size(1)
        .sink(sink.clone())
        .build()
        .unwrap();

    let first = client.event().add_field("n", 1).build().unwrap();
    client.submit(first).await.unwrap();
    let r1 = tokio::time::timeout(Duration::from_secs(1), responses.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(r1.is_success());

    client.flush().await;

    let second = client.event().add_field("n", 2).build().unwrap();
    client.submit(second).await.unwrap();
    let r2 = tokio::time::timeout(Duration::from_secs(1), responses.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(r2.is_success());

    assert_eq!(sink.total_events(), 2);
    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_submitters_each_receive_exactly_one_response() {
    let sink: Arc<MockSink<()>> = MockSink::new();
    let (client, mut responses) = ClientBuilder::<()>::new("h", "w", "d")
        .max_batch_size(10)
        .batch_timeout(Duration::from_millis(20))
        .block_on_response(true)
        .sink(sink.clone())
        .build()
        .unwrap();

    const TASKS: i64 = 8;
    const PER_TASK: i64 = 25;

    let submitters: Vec<_> = (0..TASKS)
        .map(|t| {
            let client = client.clone();
            tokio::spawn(async move {
                for n in 0..PER_TASK {
                    let event = client
                        .event()
                        .add_field("task", t)
                        .add_field("n", n)
                        .build()
                        .unwrap();
                    client.submit(event).await.unwrap();
                }
            })
        })
        .collect();

    for handle in submitters {
        handle.await.unwrap();
    }

    let expected = (TASKS * PER_TASK) as usize;
    let mut count = 0;
    while count < expected {
        let response = tokio::time::timeout(Duration::from_secs(2), responses.recv())
            .await
            .expect("response should arrive")
            .unwrap();
        assert!(response.is_success());
        count += 1;
    }
    assert_eq!(count, expected);
    assert_eq!(sink.total_events(), expected);

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn block_on_response_backpressure_raises_submission_latency() {
    let sink: Arc<MockSink<()>> = MockSink::new();
    let (client, mut responses) = ClientBuilder::<()>::new("h", "w", "d")
        .max_batch_size(1)
        .batch_timeout(Duration::from_millis(5))
        .max_concurrent_batches(1)
        .pending_work_capacity(1)
        .block_on_send(true)
        .block_on_response(true)
        .sink(sink)
        .build()
        .unwrap();

    const TOTAL_EVENTS: i64 = 20;

    let first = client.event().add_field("n", 0).build().unwrap();
    let started = Instant::now();
    client.submit(first).await.unwrap();
    let undrained_latency = started.elapsed();
    assert!(
        undrained_latency < Duration::from_millis(50),
        "first submit should complete quickly before the response channel backs up"
    );

    // With no one draining `responses`, the response channel fills, which
    // stalls the dispatcher's one permit on its blocking send, which backs
    // up the ready queue, then the batcher, then the work queue itself -
    // end-to-end backpressure reaching `submit` (SPEC_FULL.md §9, "Response
    // channel blocking").
    let flood_client = client.clone();
    let flood = tokio::spawn(async move {
        for n in 1..TOTAL_EVENTS {
            let event = flood_client.event().add_field("n", n).build().unwrap();
            flood_client.submit(event).await.unwrap();
        }
    });

    assert!(
        tokio::time::timeout(Duration::from_millis(200), flood)
            .await
            .is_err(),
        "submits should stall once the response channel backs up with no consumer"
    );

    // Draining responses unsticks the whole chain end to end.
    let mut received = 0;
    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while received < TOTAL_EVENTS {
            if responses.recv().await.is_some() {
                received += 1;
            }
        }
    })
    .await;
    assert!(drained.is_ok(), "draining responses should unblock the stalled submits");

    client.close().await;
}
