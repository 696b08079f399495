//! Poll an AWS SQS queue at a fixed interval and consume the results as a
//! stream.
//!
//! Every tick issues exactly one `ReceiveMessage` call. Its outcome, success
//! or failure, is delivered as a [`ReceiveAttempt`]; failures never end the
//! stream. Polling stops when the stream is cancelled or dropped.
//!
//! Deleting messages, visibility timeouts and the like are left to the raw
//! SDK client, see [`SqsQueue::sqs_client`].

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod poller;

pub use client::{ReceiveMessages, SqsQueue, SqsQueueBuilder};
pub use config::QueueConfig;
pub use error::{Error, ReceiveError};
pub use message::{Message, ReceiveAttempt};
pub use poller::{PollStream, Poller};
pub use tokio_util::sync::CancellationToken;
