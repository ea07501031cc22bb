use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cost class of a site adapter. Cheap adapters issue plain HTTP requests,
/// expensive adapters drive a shared headless browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Cheap,
    Expensive,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Cheap => write!(f, "cheap"),
            AdapterKind::Expensive => write!(f, "expensive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetCancelled;

impl std::fmt::Display for BudgetCancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request budget was cancelled")
    }
}

impl std::error::Error for BudgetCancelled {}

/// Process-wide slot pools shared by every request. Separate pools keep the
/// slow browser adapters from starving the plain HTTP ones.
#[derive(Debug)]
pub struct ConcurrencyGovernor {
    cheap: Arc<Semaphore>,
    expensive: Arc<Semaphore>,
    browser_warmup: OnceCell<()>,
}

impl ConcurrencyGovernor {
    pub fn new(cheap_slots: usize, expensive_slots: usize) -> Self {
        Self {
            cheap: Arc::new(Semaphore::new(cheap_slots)),
            expensive: Arc::new(Semaphore::new(expensive_slots)),
            browser_warmup: OnceCell::new(),
        }
    }

    /// Budget handle for one incoming request. Cheap and expensive slot
    /// acquisition both go through the returned handle.
    pub fn acquire_request_budget(
        &self,
        cancellation: CancellationToken,
        deadline: Instant,
    ) -> RequestBudget {
        RequestBudget {
            cheap: self.cheap.clone(),
            expensive: self.expensive.clone(),
            cancellation,
            deadline,
        }
    }

    /// One-time warm-up of the shared expensive resource. The first caller
    /// runs `init`, every later caller awaits the same result. Safe to call
    /// concurrently from all expensive adapters.
    pub async fn warm_up_browser<F, Fut>(&self, init: F) -> anyhow::Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<()>>,
    {
        self.browser_warmup.get_or_try_init(init).await?;
        Ok(())
    }

    pub fn available_slots(&self, kind: AdapterKind) -> usize {
        match kind {
            AdapterKind::Cheap => self.cheap.available_permits(),
            AdapterKind::Expensive => self.expensive.available_permits(),
        }
    }
}

/// Per-request view over the governor pools. Carries the cancellation signal
/// and the soft deadline through the whole pipeline.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    cheap: Arc<Semaphore>,
    expensive: Arc<Semaphore>,
    pub cancellation: CancellationToken,
    pub deadline: Instant,
}

impl RequestBudget {
    /// Acquire one slot of the adapter's kind. Resolves with `BudgetCancelled`
    /// only on explicit cancellation; the permit is released when the returned
    /// guard drops, on every exit path.
    pub async fn acquire_slot(&self, kind: AdapterKind) -> Result<SlotPermit, BudgetCancelled> {
        let semaphore = match kind {
            AdapterKind::Cheap => self.cheap.clone(),
            AdapterKind::Expensive => self.expensive.clone(),
        };
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(BudgetCancelled),
            permit = semaphore.acquire_owned() => {
                let permit = permit.expect("governor semaphores are never closed");
                Ok(SlotPermit { _permit: permit, kind })
            }
        }
    }

    /// Time left until the request deadline. Zero once the deadline passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
    pub kind: AdapterKind,
}
