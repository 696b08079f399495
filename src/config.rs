use std::env;

use crate::error::Error;

pub const REGION_ENV_VAR: &str = "AWS_REGION";
pub const QUEUE_URL_ENV_VAR: &str = "SQS_QUEUE_URL";

/// SQS caps long polling at 20 seconds.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Identifies the queue to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub region: String,
    pub queue_url: String,
}

impl QueueConfig {
    pub fn new(region: impl Into<String>, queue_url: impl Into<String>) -> QueueConfig {
        QueueConfig {
            region: region.into(),
            queue_url: queue_url.into(),
        }
    }

    /// Reads `AWS_REGION` and `SQS_QUEUE_URL`.
    pub fn from_env() -> Result<QueueConfig, Error> {
        let region = env::var(REGION_ENV_VAR)
            .map_err(|_| Error::Construction(format!("{REGION_ENV_VAR} is not set")))?;
        let queue_url = env::var(QUEUE_URL_ENV_VAR)
            .map_err(|_| Error::Construction(format!("{QUEUE_URL_ENV_VAR} is not set")))?;

        Ok(QueueConfig::new(region, queue_url))
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.queue_url.trim().is_empty() {
            return Err(Error::Construction("queue URL must not be empty".to_string()));
        }
        validate_region(&self.region)
    }
}

fn validate_region(region: &str) -> Result<(), Error> {
    if region.is_empty() {
        return Err(Error::Construction("region must not be empty".to_string()));
    }

    let well_formed = region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !region.starts_with('-')
        && !region.ends_with('-');
    if !well_formed {
        return Err(Error::Construction(format!("malformed region: {region:?}")));
    }
    Ok(())
}

pub(crate) fn validate_wait_time(seconds: i32) -> Result<(), Error> {
    if !(0..=MAX_WAIT_TIME_SECONDS).contains(&seconds) {
        return Err(Error::Construction(format!(
            "wait time must be between 0 and {MAX_WAIT_TIME_SECONDS} seconds, got {seconds}"
        )));
    }
    Ok(())
}

//------------------------------------------------------------------------------
