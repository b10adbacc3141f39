//! Partitions incoming events by destination and seals size- or time-triggered batches.

use crate::batch::Batch;
use crate::destination::DestinationKey;
use crate::event::Event;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

struct OpenBatch<M> {
    events: Vec<Event<M>>,
    deadline: Instant,
    /// Generation counter distinguishing this open batch from a prior one
    /// that occupied the same destination key, so a late-firing heap entry
    /// for an already-sealed batch can be recognized as stale.
    seq: u64,
}

/// Run the batcher to completion: consumes `work_rx` until it closes,
/// sealing size- and time-triggered batches onto `ready_tx` as it goes, then
/// seals every remaining open batch before returning.
pub async fn run<M: Send + 'static>(
    mut work_rx: mpsc::Receiver<Event<M>>,
    ready_tx: mpsc::Sender<Batch<M>>,
    max_batch_size: usize,
    batch_timeout: Duration,
) {
    let max_batch_size = max_batch_size.max(1);
    let mut open: HashMap<DestinationKey, OpenBatch<M>> = HashMap::new();
    // Min-heap (via Reverse) of (deadline, generation, destination), lazily
    // invalidated against the live `open` map rather than cancelled
    // explicitly - the "single timer wheel" design from SPEC_FULL.md §4.3.
    let mut heap: BinaryHeap<Reverse<(Instant, u64, DestinationKey)>> = BinaryHeap::new();
    let mut next_seq: u64 = 0;

    loop {
        let next_deadline = heap.peek().map(|Reverse((deadline, _, _))| *deadline);

        tokio::select! {
            biased;

            maybe_event = work_rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        let dest = event.destination().clone();
                        let entry = open.entry(dest.clone()).or_insert_with(|| {
                            let deadline = Instant::now() + batch_timeout;
                            let seq = next_seq;
                            next_seq += 1;
                            heap.push(Reverse((deadline, seq, dest.clone())));
                            OpenBatch { events: Vec::new(), deadline, seq }
                        });
                        entry.events.push(event);

                        if entry.events.len() >= max_batch_size {
                            let sealed = open.remove(&dest).expect("just inserted");
                            seal_and_send(&ready_tx, dest, sealed.events).await;
                        }
                    }
                    None => {
                        tracing::debug!(open_batches = open.len(), "work queue closed, draining");
                        for (dest, batch) in open.drain() {
                            seal_and_send(&ready_tx, dest, batch.events).await;
                        }
                        return;
                    }
                }
            }

            _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600))), if next_deadline.is_some() => {
                let Reverse((deadline, seq, dest)) = heap.pop().expect("peeked Some above");
                let is_live = matches!(open.get(&dest), Some(batch) if batch.seq == seq && batch.deadline == deadline);
                if is_live {
                    let sealed = open.remove(&dest).expect("checked above");
                    seal_and_send(&ready_tx, dest, sealed.events).await;
                }
                // else: stale entry for an already-sealed or re-opened batch - ignore.
            }
        }
    }
}

async fn seal_and_send<M>(ready_tx: &mpsc::Sender<Batch<M>>, dest: DestinationKey, events: Vec<Event<M>>) {
    if events.is_empty() {
        return;
    }
    let batch = Batch::seal(dest, events, std::time::Instant::now());
    tracing::debug!(batch_id = batch.id, dataset = %batch.destination.dataset, count = batch.len(), "sealed batch");
    if ready_tx.send(batch).await.is_err() {
        tracing::warn!("ready-batch queue closed while sealing; batch dropped");
    }
}
