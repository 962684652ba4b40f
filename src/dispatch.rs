//! Runs one outbound HTTP request on the runtime's worker pool.
//!
//! The caller suspends on the join handle only, so a slow remote never holds
//! up the task driving the host loop. Dropping the caller's future aborts the
//! spawned request.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Join handle that aborts its task when dropped before completion.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Spawn `request` and wait for its result. A panicked or cancelled task is
/// reported the same way as a failed request.
pub async fn dispatch<F, T>(request: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, reqwest::Error>> + Send + 'static,
    T: Send + 'static,
{
    let handle = AbortOnDrop(tokio::spawn(request.in_current_span()));
    match handle.await {
        Ok(result) => result.map_err(Into::into),
        Err(join_err) => Err(join_err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_dropped_caller_aborts_request() {
        let (held_tx, held_rx) = oneshot::channel::<()>();
        let request = async move {
            let _held = held_tx;
            std::future::pending::<Result<(), reqwest::Error>>().await
        };

        let timed_out = tokio::time::timeout(Duration::from_millis(20), dispatch(request)).await;
        assert!(timed_out.is_err());

        // The spawned task is gone once the sender it owned is dropped.
        let closed = tokio::time::timeout(Duration::from_secs(1), held_rx).await;
        assert!(matches!(closed, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_completed_request_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let resp = dispatch(reqwest::Client::new().get(server.uri()).send())
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);
    }
}
