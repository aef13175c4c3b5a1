use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::analysis::{EncodedImage, FoodAnalysis};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CaptureError {
    #[error("an analysis is already in progress")]
    InProgress,
    #[error("capture {0} is no longer current")]
    Stale(Uuid),
    #[error("capture {0} has no analysis result yet")]
    NotReady(Uuid),
}

#[derive(Debug, Clone)]
enum Phase {
    Analyzing,
    Ready(FoodAnalysis),
}

#[derive(Debug, Clone)]
struct Capture {
    id: Uuid,
    image: EncodedImage,
    phase: Phase,
}

/// Analysis result handed over for confirmation.
#[derive(Debug, Clone)]
pub struct ReadyCapture {
    pub id: Uuid,
    pub analysis: FoodAnalysis,
    pub image: EncodedImage,
}

/// At most one outstanding capture per user.
///
/// A capture id is the ticket for everything that follows `begin`: results,
/// failures and confirmations carrying an id that is no longer current are
/// rejected as stale, so a response that returns after `dismiss` is dropped.
#[derive(Debug, Default)]
pub struct CaptureRegistry {
    captures: Mutex<HashMap<Uuid, Capture>>,
}

impl CaptureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a capture for `image`. A finished but unconfirmed capture is
    /// replaced; one still analyzing is not.
    pub async fn begin(&self, user: Uuid, image: EncodedImage) -> Result<Uuid, CaptureError> {
        let mut captures = self.captures.lock().await;
        if let Some(Capture {
            phase: Phase::Analyzing,
            ..
        }) = captures.get(&user)
        {
            return Err(CaptureError::InProgress);
        }
        let id = Uuid::new_v4();
        captures.insert(
            user,
            Capture {
                id,
                image,
                phase: Phase::Analyzing,
            },
        );
        debug!(%user, capture_id = %id, "capture started");
        Ok(id)
    }

    pub async fn complete(
        &self,
        user: Uuid,
        id: Uuid,
        analysis: FoodAnalysis,
    ) -> Result<(), CaptureError> {
        let mut captures = self.captures.lock().await;
        match captures.get_mut(&user) {
            Some(c) if c.id == id => {
                c.phase = Phase::Ready(analysis);
                Ok(())
            }
            _ => {
                debug!(%user, capture_id = %id, "discarding stale analysis result");
                Err(CaptureError::Stale(id))
            }
        }
    }

    /// Drops the capture after a failed analysis; the user has to capture again.
    pub async fn fail(&self, user: Uuid, id: Uuid) {
        let mut captures = self.captures.lock().await;
        if captures.get(&user).is_some_and(|c| c.id == id) {
            captures.remove(&user);
        }
    }

    /// Returns `false` when there was nothing to dismiss.
    pub async fn dismiss(&self, user: Uuid) -> bool {
        let removed = self.captures.lock().await.remove(&user);
        if let Some(c) = &removed {
            debug!(%user, capture_id = %c.id, "capture dismissed");
        }
        removed.is_some()
    }

    /// Removes and returns the ready capture `id`.
    pub async fn take_ready(&self, user: Uuid, id: Uuid) -> Result<ReadyCapture, CaptureError> {
        let mut captures = self.captures.lock().await;
        let ready = match captures.get(&user) {
            Some(c) if c.id == id => matches!(c.phase, Phase::Ready(_)),
            _ => return Err(CaptureError::Stale(id)),
        };
        if !ready {
            return Err(CaptureError::NotReady(id));
        }
        match captures.remove(&user) {
            Some(Capture {
                image,
                phase: Phase::Ready(analysis),
                ..
            }) => Ok(ReadyCapture {
                id,
                analysis,
                image,
            }),
            _ => Err(CaptureError::Stale(id)),
        }
    }

    /// Like [`begin`](Self::begin), but hands back a ticket that clears the
    /// capture if it is dropped before the analysis is resolved.
    pub async fn open(
        self: &Arc<Self>,
        user: Uuid,
        image: EncodedImage,
    ) -> Result<CaptureTicket, CaptureError> {
        let id = self.begin(user, image).await?;
        Ok(CaptureTicket {
            registry: Arc::clone(self),
            user,
            id,
            resolved: false,
        })
    }

    /// Synchronous variant of [`fail`](Self::fail) for use from `Drop`.
    fn abandon(self: &Arc<Self>, user: Uuid, id: Uuid) {
        if let Ok(mut captures) = self.captures.try_lock() {
            if captures.get(&user).is_some_and(|c| c.id == id) {
                captures.remove(&user);
                debug!(%user, capture_id = %id, "abandoned capture cleared");
            }
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let registry = Arc::clone(self);
            handle.spawn(async move { registry.fail(user, id).await });
        }
    }

    /// Puts a taken capture back, e.g. when logging it failed.
    pub async fn restore(&self, user: Uuid, ready: ReadyCapture) {
        let mut captures = self.captures.lock().await;
        captures.entry(user).or_insert(Capture {
            id: ready.id,
            image: ready.image,
            phase: Phase::Ready(ready.analysis),
        });
    }
}

/// An analyzing capture owned by the request that started it.
///
/// If the request is abandoned mid-analysis (the client went away and the
/// handler future was dropped), dropping the ticket clears the capture so the
/// user is not locked out of starting a new one.
pub struct CaptureTicket {
    registry: Arc<CaptureRegistry>,
    user: Uuid,
    id: Uuid,
    resolved: bool,
}

impl CaptureTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn complete(mut self, analysis: FoodAnalysis) -> Result<(), CaptureError> {
        let out = self.registry.complete(self.user, self.id, analysis).await;
        self.resolved = true;
        out
    }

    pub async fn fail(mut self) {
        self.registry.fail(self.user, self.id).await;
        self.resolved = true;
    }
}

impl Drop for CaptureTicket {
    fn drop(&mut self) {
        if !self.resolved {
            self.registry.abandon(self.user, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fake::salad;

    fn image() -> EncodedImage {
        EncodedImage::from_client("data:image/jpeg;base64,AAAA")
    }

    #[tokio::test]
    async fn second_capture_while_analyzing_is_rejected() {
        let reg = CaptureRegistry::new();
        let user = Uuid::new_v4();
        let id = reg.begin(user, image()).await.unwrap();
        assert_eq!(reg.begin(user, image()).await, Err(CaptureError::InProgress));

        // other users are independent
        assert!(reg.begin(Uuid::new_v4(), image()).await.is_ok());

        reg.complete(user, id, salad()).await.unwrap();
        assert!(reg.begin(user, image()).await.is_ok());
    }

    #[tokio::test]
    async fn result_after_dismiss_is_discarded() {
        let reg = CaptureRegistry::new();
        let user = Uuid::new_v4();
        let id = reg.begin(user, image()).await.unwrap();
        assert!(reg.dismiss(user).await);

        assert_eq!(
            reg.complete(user, id, salad()).await,
            Err(CaptureError::Stale(id))
        );
        assert!(matches!(
            reg.take_ready(user, id).await,
            Err(CaptureError::Stale(_))
        ));
        assert!(!reg.dismiss(user).await);
    }

    #[tokio::test]
    async fn result_for_superseded_capture_is_discarded() {
        let reg = CaptureRegistry::new();
        let user = Uuid::new_v4();
        let first = reg.begin(user, image()).await.unwrap();
        reg.fail(user, first).await;
        let second = reg.begin(user, image()).await.unwrap();

        assert_eq!(
            reg.complete(user, first, salad()).await,
            Err(CaptureError::Stale(first))
        );
        reg.complete(user, second, salad()).await.unwrap();
        let ready = reg.take_ready(user, second).await.unwrap();
        assert_eq!(ready.analysis.food_name, "Greek salad");
        assert_eq!(ready.image.data, "AAAA");
    }

    #[tokio::test]
    async fn dropped_ticket_clears_an_unresolved_capture() {
        let reg = Arc::new(CaptureRegistry::new());
        let user = Uuid::new_v4();
        let ticket = reg.open(user, image()).await.unwrap();
        let abandoned = ticket.id();
        drop(ticket);

        let ticket = reg.open(user, image()).await.unwrap();
        assert_ne!(ticket.id(), abandoned);
        let id = ticket.id();
        ticket.complete(salad()).await.unwrap();
        assert!(reg.take_ready(user, id).await.is_ok());
    }

    #[tokio::test]
    async fn failed_ticket_clears_the_capture() {
        let reg = Arc::new(CaptureRegistry::new());
        let user = Uuid::new_v4();
        let ticket = reg.open(user, image()).await.unwrap();
        let id = ticket.id();
        ticket.fail().await;
        assert_eq!(
            reg.take_ready(user, id).await.unwrap_err(),
            CaptureError::Stale(id)
        );
        assert!(!reg.dismiss(user).await);
    }

    #[tokio::test]
    async fn take_ready_requires_a_result_and_consumes_it() {
        let reg = CaptureRegistry::new();
        let user = Uuid::new_v4();
        let id = reg.begin(user, image()).await.unwrap();
        assert_eq!(
            reg.take_ready(user, id).await.unwrap_err(),
            CaptureError::NotReady(id)
        );

        reg.complete(user, id, salad()).await.unwrap();
        let ready = reg.take_ready(user, id).await.unwrap();
        assert!(reg.take_ready(user, id).await.is_err());

        reg.restore(user, ready).await;
        assert!(reg.take_ready(user, id).await.is_ok());
    }
}
