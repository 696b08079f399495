//! Fixed-interval receive polling.
//!
//! A [`Poller`] turns a [`ReceiveMessages`] client into a stream of
//! [`ReceiveAttempt`]s: one receive call, then one delivery, then a wait for
//! the next tick, until cancelled or until the consumer goes away.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::client::ReceiveMessages;
use crate::error::Error;
use crate::message::ReceiveAttempt;

pub struct Poller<C> {
    client: C,
    interval: Duration,
    cancel: CancellationToken,
}

impl<C> Poller<C>
where
    C: ReceiveMessages + 'static,
{
    pub fn new(client: C, interval: Duration) -> Result<Poller<C>, Error> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(Poller {
            client,
            interval,
            cancel: CancellationToken::new(),
        })
    }

    /// Ties the poll loop to `cancel`. Cancelling it ends the stream.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Poller<C> {
        self.cancel = cancel;
        self
    }

    /// Spawns the poll loop on the current tokio runtime.
    ///
    /// The first receive call is issued immediately.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(self) -> PollStream {
        // Capacity 1 plus reserve-before-receive: nothing is fetched until
        // the previous attempt has been taken.
        let (tx, rx) = mpsc::channel(1);
        let cancel = self.cancel.clone();
        let span = info_span!("sqs_poll", interval = ?self.interval);
        let task = tokio::spawn(run(self.client, self.interval, self.cancel, tx).instrument(span));

        PollStream {
            inner: ReceiverStream::new(rx),
            cancel,
            task,
        }
    }
}

async fn run<C: ReceiveMessages>(
    client: C,
    interval: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<ReceiveAttempt>,
) {
    // The first tick completes at once; later deadlines saturate instead of
    // overflowing for huge intervals.
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    info!("polling started");

    let mut sequence: u64 = 0;
    loop {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    info!("consumer dropped the stream, polling stopped");
                    return;
                }
            },
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = client.receive_messages() => outcome,
        };

        match &outcome {
            Ok(messages) => debug!(sequence, count = messages.len(), "receive attempt succeeded"),
            Err(err) => warn!(sequence, error = %err, "receive attempt failed"),
        }
        permit.send(ReceiveAttempt::new(sequence, outcome));
        sequence += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
    }

    info!(attempts = sequence, "polling cancelled");
}

/// The consumer side of a running poller.
///
/// Ends (`None`) once the poller is cancelled. Dropping it stops the poll
/// loop at its next delivery.
pub struct PollStream {
    inner: ReceiverStream<ReceiveAttempt>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollStream {
    pub async fn recv(&mut self) -> Option<ReceiveAttempt> {
        self.inner.as_mut().recv().await
    }

    /// Stops the poll loop. Attempts already delivered can still be read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Stream for PollStream {
    type Item = ReceiveAttempt;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

//------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::time::Instant;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::error::ReceiveError;
    use crate::message::Message;

    const INTERVAL: Duration = Duration::from_secs(1);

    /// Replays scripted outcomes, then returns empty batches forever.
    #[derive(Default)]
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<Vec<Message>, ReceiveError>>>,
        calls: Mutex<Vec<Instant>>,
        latency: Duration,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<Vec<Message>, ReceiveError>>) -> Arc<ScriptedClient> {
            Arc::new(ScriptedClient {
                script: Mutex::new(script.into()),
                ..Default::default()
            })
        }

        fn with_latency(latency: Duration) -> Arc<ScriptedClient> {
            Arc::new(ScriptedClient {
                latency,
                ..Default::default()
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReceiveMessages for ScriptedClient {
        async fn receive_messages(&self) -> Result<Vec<Message>, ReceiveError> {
            self.calls.lock().unwrap().push(Instant::now());
            if !self.latency.is_zero() {
                time::sleep(self.latency).await;
            }
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(vec![]))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ReceiveMessages for FailingClient {
        async fn receive_messages(&self) -> Result<Vec<Message>, ReceiveError> {
            Err(ReceiveError::Network("connection refused".to_string()))
        }
    }

    fn message(id: &str) -> Message {
        Message {
            message_id: Some(id.to_string()),
            body: Some(format!("body of {id}")),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let client = ScriptedClient::new(vec![]);

        let result = Poller::new(client.clone(), Duration::ZERO);

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(0, client.call_count());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_outcomes_arrive_in_order_at_each_tick() {
        let client = ScriptedClient::new(vec![
            Ok(vec![message("A"), message("B")]),
            Err(ReceiveError::Timeout("deadline exceeded".to_string())),
            Ok(vec![]),
        ]);
        let start = Instant::now();
        let mut stream = Poller::new(client.clone(), INTERVAL).unwrap().start();

        let first = stream.recv().await.unwrap();
        assert_eq!(0, first.sequence);
        assert_eq!(Ok(vec![message("A"), message("B")]), first.outcome);

        let second = stream.recv().await.unwrap();
        assert_eq!(1, second.sequence);
        assert_eq!(
            Err(ReceiveError::Timeout("deadline exceeded".to_string())),
            second.outcome
        );

        let third = stream.recv().await.unwrap();
        assert_eq!(2, third.sequence);
        assert_eq!(Ok(vec![]), third.outcome);
        assert!(third.error().is_none());

        let times = client.call_times();
        assert_eq!(start, times[0]);
        assert_eq!(start + INTERVAL, times[1]);
        assert_eq!(start + INTERVAL * 2, times[2]);

        stream.cancel();
    }

    // Real clock: a paused one would auto-advance straight to the far-off tick.
    #[tokio::test]
    async fn test_huge_interval_still_delivers_first_attempt() {
        let client = ScriptedClient::new(vec![Ok(vec![message("A")])]);
        let mut stream = Poller::new(client.clone(), Duration::MAX).unwrap().start();

        let first = time::timeout(Duration::from_secs(5), stream.recv())
            .await
            .expect("first attempt should arrive immediately")
            .expect("stream should not end");
        assert_eq!(0, first.sequence);
        assert_eq!(Ok(vec![message("A")]), first.outcome);

        stream.cancel();
        let next = time::timeout(Duration::from_secs(5), stream.recv()).await;
        assert_eq!(Ok(None), next);
        assert_eq!(1, client.call_count());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_never_stop_the_stream() {
        let mut stream = Poller::new(FailingClient, INTERVAL).unwrap().start();

        for expected in 0..10 {
            let attempt = stream.recv().await.unwrap();
            assert_eq!(expected, attempt.sequence);
            assert!(matches!(attempt.error(), Some(ReceiveError::Network(_))));
        }

        stream.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_n_ticks_yield_n_attempts() {
        let client = ScriptedClient::new(vec![]);
        let start = Instant::now();
        let stream = Poller::new(client.clone(), INTERVAL).unwrap().start();

        let attempts: Vec<ReceiveAttempt> = stream.take(5).collect().await;

        let sequences: Vec<u64> = attempts.iter().map(|a| a.sequence).collect();
        assert_eq!(vec![0, 1, 2, 3, 4], sequences);
        for (k, at) in client.call_times().iter().take(5).enumerate() {
            assert!(*at >= start + INTERVAL * k as u32);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_receive_delays_next_tick() {
        let client = ScriptedClient::with_latency(Duration::from_millis(2500));
        let start = Instant::now();
        let mut stream = Poller::new(client.clone(), INTERVAL).unwrap().start();

        stream.recv().await.unwrap();
        stream.recv().await.unwrap();
        stream.recv().await.unwrap();

        let times = client.call_times();
        assert_eq!(start, times[0]);
        assert_eq!(start + Duration::from_millis(2500), times[1]);
        assert_eq!(start + Duration::from_millis(5000), times[2]);

        stream.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_waits_for_slow_consumer() {
        let client = ScriptedClient::new(vec![]);
        let mut stream = Poller::new(client.clone(), INTERVAL).unwrap().start();

        stream.recv().await.unwrap();
        time::sleep(INTERVAL * 10).await;

        // One attempt fetched while we slept, sitting in the buffer; no more.
        assert_eq!(2, client.call_count());

        stream.recv().await.unwrap();
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(3, client.call_count());

        stream.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_calls_and_ends_stream() {
        let client = ScriptedClient::new(vec![]);
        let cancel = CancellationToken::new();
        let mut stream = Poller::new(client.clone(), INTERVAL)
            .unwrap()
            .with_cancellation(cancel.clone())
            .start();

        stream.recv().await.unwrap();
        stream.recv().await.unwrap();
        time::sleep(INTERVAL / 2).await;
        cancel.cancel();

        let next = time::timeout(INTERVAL, stream.recv()).await;
        assert_eq!(Ok(None), next);

        let calls = client.call_count();
        time::sleep(INTERVAL * 5).await;
        assert_eq!(calls, client.call_count());
        assert_eq!(2, calls);
        assert!(stream.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_stops_polling() {
        let client = ScriptedClient::new(vec![]);
        let mut stream = Poller::new(client.clone(), INTERVAL).unwrap().start();
        let cancel = stream.cancellation_token();

        stream.recv().await.unwrap();
        drop(stream);
        time::sleep(INTERVAL * 5).await;

        let calls = client.call_count();
        time::sleep(INTERVAL * 5).await;
        assert_eq!(calls, client.call_count());
        assert!(calls <= 2);
        assert!(!cancel.is_cancelled());
    }
}
