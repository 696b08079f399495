use std::collections::HashMap;

use crate::error::ReceiveError;

/// A message as received from the queue. The poller never looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
    pub body: Option<String>,
    pub md5_of_body: Option<String>,
    /// System attributes, keyed by attribute name (e.g. `SentTimestamp`).
    pub attributes: HashMap<String, String>,
}

impl From<aws_sdk_sqs::types::Message> for Message {
    fn from(msg: aws_sdk_sqs::types::Message) -> Self {
        let attributes = msg
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.as_str().to_string(), value))
            .collect();

        Message {
            message_id: msg.message_id,
            receipt_handle: msg.receipt_handle,
            body: msg.body,
            md5_of_body: msg.md5_of_body,
            attributes,
        }
    }
}

/// The outcome of one receive call, tagged with the tick that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveAttempt {
    /// Zero-based tick index. Strictly increasing within one stream.
    pub sequence: u64,
    pub outcome: Result<Vec<Message>, ReceiveError>,
}

impl ReceiveAttempt {
    pub fn new(sequence: u64, outcome: Result<Vec<Message>, ReceiveError>) -> ReceiveAttempt {
        ReceiveAttempt { sequence, outcome }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn messages(&self) -> Option<&[Message]> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&ReceiveError> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> Result<Vec<Message>, ReceiveError> {
        self.outcome
    }
}

//------------------------------------------------------------------------------
