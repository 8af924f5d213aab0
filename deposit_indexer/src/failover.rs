use core::future::Future;
use std::sync::Arc;

use anyhow::{ensure, Error as AnyhowError, Result};
use eth1_api::ExecutionClient;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::Error;

/// Retries a unit of work across clients in round-robin order.
///
/// Every attempt gets its own [`CancellationToken`].
/// The token of an attempt is cancelled before the next attempt starts and when the loop ends.
pub struct ClientFailover<'clients> {
    clients: &'clients [Arc<dyn ExecutionClient>],
    attempts: usize,
}

impl<'clients> ClientFailover<'clients> {
    #[must_use]
    pub const fn new(clients: &'clients [Arc<dyn ExecutionClient>], attempts: usize) -> Self {
        Self { clients, attempts }
    }

    /// Returns the result of the first successful attempt or the error of the last one.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut(Arc<dyn ExecutionClient>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        ensure!(!self.clients.is_empty() && self.attempts > 0, Error::NoClients);

        let mut previous_token = None::<CancellationToken>;
        let mut last_error = None::<AnyhowError>;

        for attempt_index in 0..self.attempts {
            if let Some(token) = previous_token.take() {
                token.cancel();
            }

            let client = &self.clients[attempt_index % self.clients.len()];
            let token = CancellationToken::new();

            previous_token = Some(token.clone());

            match attempt(Arc::clone(client), token).await {
                Ok(output) => {
                    if let Some(token) = previous_token {
                        token.cancel();
                    }

                    return Ok(output);
                }
                Err(error) => {
                    warn!(
                        "attempt {} of {} with execution client {} failed: {error}",
                        attempt_index + 1,
                        self.attempts,
                        client.name(),
                    );

                    last_error = Some(error);
                }
            }
        }

        if let Some(token) = previous_token {
            token.cancel();
        }

        Err(last_error.unwrap_or_else(|| Error::NoClients.into()))
    }
}
