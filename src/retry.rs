//! Opt-in retries for read-modify-write operations that lost a race with another writer.
//!
//! Nothing in `api` retries on its own. Wrapping an operation in `retry_on_conflict` re-runs the
//! whole operation, including its GET, each time the server answers 409 Conflict, so that the
//! next attempt works from the latest `resourceVersion`.
//!
//! ```no_run
//! # async fn example(api: subatomic_openshift::api::OpenShiftApi) -> Result<(), subatomic_openshift::error::Error> {
//! use subatomic_openshift::resource::ResourceFactory;
//! use subatomic_openshift::retry::{retry_on_conflict, BackoffConfig};
//!
//! let service_account = ResourceFactory::service_account("jenkins");
//! let response = retry_on_conflict(&BackoffConfig::default(), || {
//!     api.replace(service_account.clone(), "team-dev")
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
use crate::error::Error;
use crate::resource::ApiResponse;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use std::future::Future;
use std::time::Duration;

/// Configuration of the exponential backoff between attempts. The `Default` impl starts at 100
/// milliseconds, grows by 1.5x up to 5 seconds, and gives up after 5 attempts.
///
/// ```rust
/// use subatomic_openshift::retry::BackoffConfig;
/// use std::time::Duration;
///
/// let config = BackoffConfig {
///     max_attempts: 10,
///     ..Default::default()
/// };
/// assert_eq!(Duration::from_millis(100), config.initial_interval);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// The delay after the first conflict. Each later delay is multiplied by `multiplier`.
    pub initial_interval: Duration,

    /// The maximum delay between two attempts
    pub max_interval: Duration,

    pub multiplier: f64,

    /// Varies each delay by at most this factor in either direction
    pub randomization_factor: f64,

    /// The total number of attempts, including the first one. The last response is returned
    /// once this is reached, even if it is still a conflict.
    pub max_attempts: usize,
}

impl Default for BackoffConfig {
    fn default() -> BackoffConfig {
        BackoffConfig {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    /// Always waits exactly `interval` between attempts
    pub fn fixed_interval(interval: Duration, max_attempts: usize) -> BackoffConfig {
        BackoffConfig {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
            randomization_factor: 0.0,
            max_attempts,
        }
    }

    fn to_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            randomization_factor: self.randomization_factor,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

/// Runs `operation` until it returns something other than a 409, or until
/// `config.max_attempts` attempts have been made. Transport errors are returned right away.
pub async fn retry_on_conflict<F, Fut>(
    config: &BackoffConfig,
    mut operation: F,
) -> Result<ApiResponse, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse, Error>>,
{
    let mut backoff = config.to_backoff();
    let mut attempt = 1;
    loop {
        let response = operation().await?;
        if !response.is_conflict() || attempt >= config.max_attempts {
            return Ok(response);
        }
        let delay = match backoff.next_backoff() {
            Some(delay) => delay,
            None => return Ok(response),
        };
        log::info!(
            "Attempt {} of {} got a conflict, retrying in {}ms",
            attempt,
            config.max_attempts,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testkit::run;
    use serde_json::Value;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn responses_with_statuses(
        statuses: &'static [u16],
    ) -> (Arc<AtomicUsize>, impl FnMut() -> futures_util::future::Ready<Result<ApiResponse, Error>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let operation = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            let status = statuses[call.min(statuses.len() - 1)];
            futures_util::future::ready(Ok(ApiResponse::new(status, Value::Null)))
        };
        (calls, operation)
    }

    #[test]
    fn conflicts_are_retried_until_success() {
        run(async {
            let (calls, operation) = responses_with_statuses(&[409, 409, 200]);
            let config = BackoffConfig::fixed_interval(Duration::from_millis(1), 5);

            let response = retry_on_conflict(&config, operation).await.unwrap();

            assert_eq!(200, response.status);
            assert_eq!(3, calls.load(Ordering::SeqCst));
        });
    }

    #[test]
    fn last_conflict_is_returned_after_max_attempts() {
        run(async {
            let (calls, operation) = responses_with_statuses(&[409]);
            let config = BackoffConfig::fixed_interval(Duration::from_millis(1), 3);

            let response = retry_on_conflict(&config, operation).await.unwrap();

            assert_eq!(409, response.status);
            assert_eq!(3, calls.load(Ordering::SeqCst));
        });
    }

    #[test]
    fn other_statuses_are_not_retried() {
        run(async {
            let (calls, operation) = responses_with_statuses(&[404, 200]);

            let response = retry_on_conflict(&BackoffConfig::default(), operation)
                .await
                .unwrap();

            assert_eq!(404, response.status);
            assert_eq!(1, calls.load(Ordering::SeqCst));
        });
    }
}
