use aws_sdk_sqs::error::ProvideErrorMetadata;
use aws_sdk_sqs::operation::receive_message::ReceiveMessageError;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;

/// Errors returned synchronously, before any polling starts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The queue client could not be set up (bad region, bad queue URL, ...).
    #[error("failed to construct queue client: {0}")]
    Construction(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Why a single receive attempt failed.
///
/// These never stop a poll loop; they travel to the consumer inside a
/// [`ReceiveAttempt`](crate::ReceiveAttempt).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiveError {
    #[error("receive timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The queue does not exist or the queue URL is malformed.
    #[error("invalid queue: {0}")]
    InvalidQueue(String),

    #[error("SQS service error: {0}")]
    Service(String),
}

impl ReceiveError {
    pub fn message(&self) -> &str {
        match self {
            Self::Timeout(msg)
            | Self::Network(msg)
            | Self::Throttled(msg)
            | Self::PermissionDenied(msg)
            | Self::InvalidQueue(msg)
            | Self::Service(msg) => msg,
        }
    }
}

const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "AccessDeniedException"];
const THROTTLING_CODES: &[&str] = &["ThrottlingException", "RequestThrottled"];
const MISSING_QUEUE_CODES: &[&str] = &[
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
    "InvalidAddress",
];

impl From<SdkError<ReceiveMessageError, HttpResponse>> for ReceiveError {
    fn from(err: SdkError<ReceiveMessageError, HttpResponse>) -> Self {
        let detail = DisplayErrorContext(&err).to_string();
        match &err {
            SdkError::TimeoutError(_) => Self::Timeout(detail),
            SdkError::DispatchFailure(failure) if failure.is_timeout() => Self::Timeout(detail),
            SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => Self::Network(detail),
            SdkError::ServiceError(service) => classify_service_error(service.err(), detail),
            _ => Self::Service(detail),
        }
    }
}

fn classify_service_error(err: &ReceiveMessageError, detail: String) -> ReceiveError {
    match err {
        ReceiveMessageError::QueueDoesNotExist(_) | ReceiveMessageError::InvalidAddress(_) => {
            return ReceiveError::InvalidQueue(detail);
        }
        ReceiveMessageError::RequestThrottled(_) | ReceiveMessageError::KmsThrottled(_) => {
            return ReceiveError::Throttled(detail);
        }
        ReceiveMessageError::InvalidSecurity(_) | ReceiveMessageError::KmsAccessDenied(_) => {
            return ReceiveError::PermissionDenied(detail);
        }
        _ => {}
    }

    // Errors the model doesn't declare only carry a code.
    match err.code() {
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => ReceiveError::PermissionDenied(detail),
        Some(code) if THROTTLING_CODES.contains(&code) => ReceiveError::Throttled(detail),
        Some(code) if MISSING_QUEUE_CODES.contains(&code) => ReceiveError::InvalidQueue(detail),
        _ => ReceiveError::Service(detail),
    }
}

//------------------------------------------------------------------------------
