//! Lifecycle of the shared render backend.
//!
//! One backend instance serves a whole run. It is created on first use,
//! handed out as bounded [`RenderContext`]s, and torn down exactly once.
//! Shutdown waits for outstanding contexts, so no context ever observes a
//! closed backend, and every later acquire fails.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::renderer::{Fetched, Renderer};

type Factory<R> = Box<dyn Fn() -> BoxFuture<'static, FetchResult<R>> + Send + Sync>;

enum State<R> {
    Idle,
    Ready(Arc<R>),
    ShutDown,
}

/// Owner of the render backend for one run.
pub struct RenderHandle<R: Renderer> {
    factory: Factory<R>,
    state: Mutex<State<R>>,
    contexts: Arc<Semaphore>,
    max_contexts: u32,
}

impl<R: Renderer + 'static> RenderHandle<R> {
    /// Create a handle that builds its backend on first acquire.
    pub fn lazy<F, Fut>(factory: F, max_contexts: usize) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<R>> + Send + 'static,
    {
        let max_contexts = max_contexts.clamp(1, u32::MAX as usize) as u32;
        Self {
            factory: Box::new(move || factory().boxed()),
            state: Mutex::new(State::Idle),
            contexts: Arc::new(Semaphore::new(max_contexts as usize)),
            max_contexts,
        }
    }

    /// Wrap an already-built backend.
    pub fn ready(renderer: Arc<R>, max_contexts: usize) -> Self {
        let handle = Self::lazy(
            || async { Err(FetchError::Unavailable("backend already built".into())) },
            max_contexts,
        );
        Self {
            state: Mutex::new(State::Ready(renderer)),
            ..handle
        }
    }

    /// Acquire a rendering context, creating the backend if needed.
    ///
    /// Waits while `max_contexts` contexts are in use. Fails after shutdown.
    pub async fn acquire(&self) -> FetchResult<RenderContext<R>> {
        let permit = self
            .contexts
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Unavailable("render backend shut down".into()))?;

        let renderer = {
            let mut state = self.state.lock().await;
            match &*state {
                State::Ready(renderer) => renderer.clone(),
                State::ShutDown => {
                    return Err(FetchError::Unavailable("render backend shut down".into()))
                }
                State::Idle => {
                    let renderer = Arc::new((self.factory)().await?);
                    tracing::debug!(backend = renderer.name(), "render backend started");
                    *state = State::Ready(renderer.clone());
                    renderer
                }
            }
        };

        Ok(RenderContext {
            renderer,
            _permit: permit,
        })
    }

    /// Tear the backend down. Idempotent; returns whether this call closed it.
    pub async fn shutdown(&self) -> bool {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, State::ShutDown)
        };

        // Wait for in-flight contexts before closing the backend.
        let drained = self.contexts.acquire_many(self.max_contexts).await;
        self.contexts.close();
        drop(drained);

        match previous {
            State::Ready(renderer) => {
                renderer.close().await;
                tracing::debug!(backend = renderer.name(), "render backend closed");
                true
            }
            State::Idle | State::ShutDown => false,
        }
    }

    pub async fn is_shut_down(&self) -> bool {
        matches!(*self.state.lock().await, State::ShutDown)
    }
}

/// A bounded unit of rendering work. Dropping it releases the slot.
pub struct RenderContext<R> {
    renderer: Arc<R>,
    _permit: OwnedSemaphorePermit,
}

impl<R: Renderer> RenderContext<R> {
    pub async fn navigate(&self, url: &Url, timeout: Duration) -> FetchResult<Fetched> {
        self.renderer.navigate(url, timeout).await
    }

    /// Release the context explicitly.
    pub fn release(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSite;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lazy_creation_happens_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let handle = RenderHandle::lazy(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(MockSite::new("https://example.com")) }
            },
            2,
        );

        assert_eq!(created.load(Ordering::SeqCst), 0);
        let a = handle.acquire().await.unwrap();
        let b = handle.acquire().await.unwrap();
        drop(a);
        b.release();
        let _c = handle.acquire().await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_final() {
        let site = Arc::new(MockSite::new("https://example.com"));
        let handle = RenderHandle::ready(site.clone(), 1);

        handle.acquire().await.unwrap().release();
        assert!(handle.shutdown().await);
        assert!(!handle.shutdown().await);
        assert!(handle.is_shut_down().await);
        assert!(matches!(
            handle.acquire().await,
            Err(FetchError::Unavailable(_))
        ));
        assert_eq!(site.close_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_use_does_not_create() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let handle = RenderHandle::lazy(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(MockSite::new("https://example.com")) }
            },
            1,
        );
        assert!(!handle.shutdown().await);
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_creation_can_be_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let handle = RenderHandle::lazy(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(FetchError::Unavailable("launch failed".into()))
                    } else {
                        Ok(MockSite::new("https://example.com"))
                    }
                }
            },
            1,
        );
        assert!(handle.acquire().await.is_err());
        assert!(handle.acquire().await.is_ok());
    }
}
