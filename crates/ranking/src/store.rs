//! Interfaces to the record stores and notification channel the ranking
//! logic runs against.

use async_trait::async_trait;
use log::{info, warn};
use miette::Diagnostic;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::models::{
    Catch, CatchId, NewCatch, Spot, SpotId, SpotTitle, Territory, TerritoryId, UserId, Version,
    Versioned,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("store backend failed")]
    #[diagnostic(code(store::backend))]
    Backend(#[source] BoxError),

    #[error("stored {entity} is corrupt: {reason}")]
    #[diagnostic(code(store::corrupt))]
    Corrupt { entity: &'static str, reason: String },
}

impl Error {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Result of a conditional spot update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The update was written; the spot is now at this version.
    Applied(Version),
    /// The spot moved past the expected version; nothing was written.
    Conflict,
}

#[async_trait]
pub trait SpotStore: Send + Sync {
    async fn get_spot(&self, id: SpotId) -> Result<Option<Versioned<Spot>>, Error>;

    async fn list_spots(&self) -> Result<Vec<Spot>, Error>;

    /// Writes `title` to the spot only if it is still at `expected`.
    async fn conditional_update(
        &self,
        id: SpotId,
        expected: Version,
        title: SpotTitle,
    ) -> Result<Commit, Error>;
}

#[async_trait]
pub trait CatchStore: Send + Sync {
    async fn get_catch(&self, id: CatchId) -> Result<Option<Catch>, Error>;

    async fn list_catches_by_spot(&self, spot: SpotId) -> Result<Vec<Catch>, Error>;

    async fn list_catches_by_user(&self, user: UserId) -> Result<Vec<Catch>, Error>;

    async fn insert_catch(&self, catch: NewCatch) -> Result<Catch, Error>;
}

#[async_trait]
pub trait TerritoryStore: Send + Sync {
    async fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, Error>;

    async fn list_territories(&self) -> Result<Vec<Territory>, Error>;

    async fn list_spots_for_territory(&self, id: TerritoryId) -> Result<Vec<Spot>, Error>;
}

/// Everything the submission pipeline needs from persistence.
pub trait Store: SpotStore + CatchStore + TerritoryStore {}

impl<T> Store for T where T: SpotStore + CatchStore + TerritoryStore {}

/// Emitted when a spot changes hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleChanged {
    pub spot: SpotId,
    pub king: UserId,
    pub previous_king: Option<UserId>,
}

/// Fire-and-forget receiver of title changes. Must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: TitleChanged);
}

impl NotificationSink for UnboundedSender<TitleChanged> {
    fn notify(&self, event: TitleChanged) {
        if let Err(err) = self.send(event) {
            warn!("Dropping title change, receiver is gone: {:?}", err.0);
        }
    }
}

/// Sink that only writes title changes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: TitleChanged) {
        match event.previous_king {
            Some(previous) => info!(
                "{} took spot {} from {}",
                event.king, event.spot, previous
            ),
            None => info!("{} is the first king of spot {}", event.king, event.spot),
        }
    }
}
