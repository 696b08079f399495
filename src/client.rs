use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sqs::types::MessageSystemAttributeName;
use tracing::debug;

use crate::config::{QueueConfig, validate_wait_time};
use crate::error::{Error, ReceiveError};
use crate::message::Message;
use crate::poller::{PollStream, Poller};

/// The one operation the poller needs from a queue client.
#[async_trait]
pub trait ReceiveMessages: Send + Sync {
    /// Issues a single receive call. An empty queue is `Ok(vec![])`.
    async fn receive_messages(&self) -> Result<Vec<Message>, ReceiveError>;
}

#[async_trait]
impl<T: ReceiveMessages + ?Sized> ReceiveMessages for Arc<T> {
    async fn receive_messages(&self) -> Result<Vec<Message>, ReceiveError> {
        (**self).receive_messages().await
    }
}

/// An SQS client bound to one queue.
///
/// Cloning is cheap and clones share the underlying connection pool. Only one
/// poller per queue is expected; nothing here serialises concurrent receives.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    sqs_client: aws_sdk_sqs::Client,
    config: QueueConfig,
    wait_time_seconds: Option<i32>,
}

impl SqsQueue {
    /// Loads the default AWS session for `config.region`.
    pub async fn new(config: QueueConfig) -> Result<SqsQueue, Error> {
        SqsQueueBuilder::new(config).build().await
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn queue_url(&self) -> &str {
        &self.config.queue_url
    }

    /// The raw SDK client, for operations this crate doesn't wrap (delete,
    /// visibility changes, ...).
    pub fn sqs_client(&self) -> &aws_sdk_sqs::Client {
        &self.sqs_client
    }

    /// Starts polling a clone of this queue every `interval`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the poll loop is
    /// spawned onto the current one.
    ///
    /// ```no_run
    /// # async fn run() -> Result<(), sqs_poll::Error> {
    /// use std::time::Duration;
    /// use sqs_poll::{QueueConfig, SqsQueue};
    ///
    /// let queue = SqsQueue::new(QueueConfig::new(
    ///     "us-east-1",
    ///     "https://sqs.us-east-1.amazonaws.com/000000000000/my-queue",
    /// ))
    /// .await?;
    ///
    /// let mut stream = queue.poll(Duration::from_secs(5))?;
    /// while let Some(attempt) = stream.recv().await {
    ///     match attempt.outcome {
    ///         Ok(messages) => println!("{} messages", messages.len()),
    ///         Err(err) => eprintln!("receive failed: {err}"),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn poll(&self, interval: Duration) -> Result<PollStream, Error> {
        Ok(Poller::new(self.clone(), interval)?.start())
    }
}

#[async_trait]
impl ReceiveMessages for SqsQueue {
    async fn receive_messages(&self) -> Result<Vec<Message>, ReceiveError> {
        let output = self
            .sqs_client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .set_wait_time_seconds(self.wait_time_seconds)
            .send()
            .await?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(Message::from)
            .collect())
    }
}

//------------------------------------------------------------------------------

pub struct SqsQueueBuilder {
    config: QueueConfig,
    sdk_config: Option<SdkConfig>,
    sqs_client: Option<aws_sdk_sqs::Client>,
    endpoint_url: Option<String>,
    wait_time_seconds: Option<i32>,
}

impl SqsQueueBuilder {
    pub fn new(config: QueueConfig) -> SqsQueueBuilder {
        SqsQueueBuilder {
            config,
            sdk_config: None,
            sqs_client: None,
            endpoint_url: None,
            wait_time_seconds: None,
        }
    }

    /// Use an already loaded AWS session instead of the default chain.
    pub fn with_sdk_config(mut self, sdk_config: SdkConfig) -> SqsQueueBuilder {
        self.sdk_config = Some(sdk_config);
        self
    }

    /// Use a ready-made client as is. Endpoint and session settings are ignored.
    pub fn with_sqs_client(mut self, sqs_client: aws_sdk_sqs::Client) -> SqsQueueBuilder {
        self.sqs_client = Some(sqs_client);
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> SqsQueueBuilder {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Long-poll duration passed to every receive call.
    pub fn with_wait_time_seconds(mut self, seconds: i32) -> SqsQueueBuilder {
        self.wait_time_seconds = Some(seconds);
        self
    }

    pub async fn build(self) -> Result<SqsQueue, Error> {
        self.config.validate()?;
        if let Some(seconds) = self.wait_time_seconds {
            validate_wait_time(seconds)?;
        }
        if let Some(url) = &self.endpoint_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Construction(format!(
                    "endpoint URL must be http(s): {url:?}"
                )));
            }
        }

        let sqs_client = match self.sqs_client {
            Some(client) => client,
            None => {
                let region = Region::new(self.config.region.clone());
                let sdk_config = match self.sdk_config {
                    Some(sdk_config) => sdk_config,
                    None => {
                        aws_config::defaults(BehaviorVersion::latest())
                            .region(region.clone())
                            .load()
                            .await
                    }
                };

                let mut builder = aws_sdk_sqs::config::Builder::from(&sdk_config).region(region);
                if let Some(url) = &self.endpoint_url {
                    builder = builder.endpoint_url(url);
                }
                aws_sdk_sqs::Client::from_conf(builder.build())
            }
        };

        debug!(
            region = %self.config.region,
            queue_url = %self.config.queue_url,
            "sqs queue client ready"
        );

        Ok(SqsQueue {
            sqs_client,
            config: self.config,
            wait_time_seconds: self.wait_time_seconds,
        })
    }
}

//------------------------------------------------------------------------------
