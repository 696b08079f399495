use std::env;
use std::time::Duration;

use sqs_poll::{Error, QueueConfig, SqsQueueBuilder};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_INTERVAL_SECS: u64 = 5;

#[::tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let interval = match env::var("SQS_POLL_INTERVAL_SECS") {
        Ok(secs) => secs.parse::<u64>().map(Duration::from_secs).map_err(|_| {
            Error::InvalidArgument(format!("SQS_POLL_INTERVAL_SECS is not a number: {secs:?}"))
        })?,
        Err(_) => Duration::from_secs(DEFAULT_INTERVAL_SECS),
    };

    let mut builder = SqsQueueBuilder::new(QueueConfig::from_env()?);
    if let Ok(endpoint_url) = env::var("SQS_ENDPOINT_URL") {
        builder = builder.with_endpoint_url(endpoint_url);
    }
    let queue = builder.build().await?;

    let mut stream = queue.poll(interval)?;
    let cancel = stream.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping");
            cancel.cancel();
        }
    });

    while let Some(attempt) = stream.recv().await {
        match attempt.outcome {
            Ok(messages) => {
                for msg in messages {
                    info!(
                        sequence = attempt.sequence,
                        message_id = msg.message_id.as_deref().unwrap_or_default(),
                        body = msg.body.as_deref().unwrap_or_default(),
                        "message received"
                    );
                }
            }
            Err(err) => error!(sequence = attempt.sequence, error = %err, "receive failed"),
        }
    }

    Ok(())
}
