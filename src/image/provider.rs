//! Image generator trait and utilities.

use crate::error::Result;
use crate::image::types::{DataUrl, EditRequest};
use async_trait::async_trait;

/// Trait for backends that re-render a source image under a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates an image for the request.
    ///
    /// `Ok(None)` means the backend answered but returned no image; that is
    /// a soft outcome, distinct from a failed call.
    async fn generate(&self, request: &EditRequest<'_>) -> Result<Option<DataUrl>>;

    /// Returns the name of this backend for display.
    fn name(&self) -> &str;

    /// Checks if the backend is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait for generators with retry logic.
#[async_trait]
pub trait ImageGeneratorExt: ImageGenerator {
    /// Generates with automatic retries on transient failures.
    async fn generate_with_retries(
        &self,
        request: &EditRequest<'_>,
        max_retries: u32,
    ) -> Result<Option<DataUrl>> {
        let mut attempt = 0;
        loop {
            match self.generate(request).await {
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

impl<T: ImageGenerator + ?Sized> ImageGeneratorExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatesError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        retryable: bool,
    }

    #[async_trait]
    impl ImageGenerator for Flaky {
        async fn generate(&self, _request: &EditRequest<'_>) -> Result<Option<DataUrl>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                let cause = if self.retryable {
                    PlatesError::RateLimited {
                        retry_after: Some(Duration::from_millis(1)),
                    }
                } else {
                    PlatesError::Auth("bad key".into())
                };
                return Err(PlatesError::generation("test", cause));
            }
            Ok(Some(DataUrl::new("image/png", "AAAA")))
        }

        fn name(&self) -> &str {
            "flaky"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn request() -> (DataUrl, String) {
        (DataUrl::new("image/png", "AAAA"), "prompt".to_string())
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let gen = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let (source, prompt) = request();
        let out = gen
            .generate_with_retries(&EditRequest::new(&source, &prompt), 3)
            .await
            .unwrap();
        assert!(out.is_some());
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_failures() {
        let gen = Flaky {
            failures: 5,
            calls: AtomicU32::new(0),
            retryable: false,
        };
        let (source, prompt) = request();
        let out = gen
            .generate_with_retries(&EditRequest::new(&source, &prompt), 3)
            .await;
        assert!(out.is_err());
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_call() {
        let gen = Flaky {
            failures: 1,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let (source, prompt) = request();
        let out = gen
            .generate_with_retries(&EditRequest::new(&source, &prompt), 0)
            .await;
        assert!(out.is_err());
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
    }
}
