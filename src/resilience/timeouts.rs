//! Deadlines for store calls.

use std::future::Future;
use std::time::Duration;

use crate::storage::PersistenceError;

/// Run a store call with a deadline. Elapsed deadlines become
/// [`PersistenceError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, PersistenceError>
where
    F: Future<Output = Result<T, PersistenceError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| PersistenceError::Timeout(deadline))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_elapses() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(PersistenceError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<(), _> = with_deadline(Duration::from_secs(1), async {
            Err(PersistenceError::Unavailable("down".into()))
        })
        .await;
        assert!(matches!(result, Err(PersistenceError::Unavailable(_))));
    }
}
