//! One-shot readiness signal for hydration.

use crate::error::StoreError;
use crate::status::HydrationReport;
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum ReadyState {
    Pending,
    Ready(HydrationReport),
    Failed(String),
}

/// Settling half of the readiness signal, owned by the hydration task.
#[derive(Debug)]
pub(crate) struct ReadinessHandle {
    tx: watch::Sender<ReadyState>,
}

/// Observer of hydration's one-shot outcome.
///
/// Cheap to clone; any number of observers may wait. The signal settles
/// exactly once, either success (with the [`HydrationReport`]) or failure.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<ReadyState>,
}

/// Creates a connected settle/observe pair.
pub(crate) fn readiness() -> (ReadinessHandle, Readiness) {
    let (tx, rx) = watch::channel(ReadyState::Pending);
    (ReadinessHandle { tx }, Readiness { rx })
}

impl ReadinessHandle {
    /// Settles with success. Panics if the signal already settled;
    /// double settlement is a programming error.
    pub(crate) fn succeed(&self, report: HydrationReport) {
        self.settle(ReadyState::Ready(report));
    }

    /// Settles with failure. Panics if the signal already settled.
    pub(crate) fn fail(&self, message: String) {
        self.settle(ReadyState::Failed(message));
    }

    fn settle(&self, next: ReadyState) {
        self.tx.send_modify(|state| {
            assert!(
                matches!(state, ReadyState::Pending),
                "readiness signal settled twice"
            );
            *state = next;
        });
    }
}

impl Readiness {
    /// Waits until hydration settles.
    ///
    /// Returns the hydration report on success; a readiness failure (the
    /// fatal apply path) surfaces as [`StoreError::ReadinessFailed`].
    pub async fn wait(&self) -> Result<HydrationReport, StoreError> {
        let mut rx = self.rx.clone();
        loop {
            {
                match &*rx.borrow() {
                    ReadyState::Ready(report) => return Ok(report.clone()),
                    ReadyState::Failed(message) => {
                        return Err(StoreError::ReadinessFailed(message.clone()))
                    }
                    ReadyState::Pending => {}
                }
            }
            if rx.changed().await.is_err() {
                // Settler dropped without settling; surface as failure.
                return Err(StoreError::ReadinessFailed(
                    "readiness signal dropped before settling".into(),
                ));
            }
        }
    }

    /// Returns the report if hydration already settled successfully.
    pub fn report(&self) -> Option<HydrationReport> {
        match &*self.rx.borrow() {
            ReadyState::Ready(report) => Some(report.clone()),
            _ => None,
        }
    }

    /// Returns true once the signal settled, either way.
    pub fn is_settled(&self) -> bool {
        !matches!(&*self.rx.borrow(), ReadyState::Pending)
    }
}
