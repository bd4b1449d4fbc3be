//! Catch submission and the read-side queries, wired to one store.

use std::{fmt, sync::Arc};

use log::{error, info, warn};
use miette::Diagnostic;
use serde::Serialize;

use crate::{
    leaderboard::{self, GlobalEntry, LeaderboardBuilder, SpotLeaderboard},
    models::{Catch, CatchId, NewCatch, SpotId, TerritoryId, UserId},
    qualifier,
    resolver::{self, ResolverConfig, SpotTitleResolver, TitleOutcome},
    store::{self, NotificationSink, Store},
    territory::{self, TerritoryRulerCalculator, TerritoryStanding},
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("could not save catch")]
    #[diagnostic(code(kingdom::save_catch))]
    SaveCatch(#[source] store::Error),

    #[error("catch {0} does not exist")]
    #[diagnostic(code(kingdom::catch_not_found))]
    CatchNotFound(CatchId),

    #[error("could not access store")]
    #[diagnostic(code(kingdom::store))]
    Store(#[source] store::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Leaderboard(#[from] leaderboard::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Territory(#[from] territory::Error),
}

/// What happened to a submitted catch.
///
/// The catch is saved whenever a `Submission` is returned. Title resolution
/// is a separate step; its failure is reported in `title` and leaves the
/// saved catch untouched.
#[derive(Debug)]
pub struct Submission {
    pub catch: Catch,
    pub title: Result<TitleOutcome, resolver::Error>,
    /// Standing of the spot's territory after a title change.
    pub territory: Option<TerritoryStanding>,
}

impl Submission {
    pub fn title_changed(&self) -> bool {
        matches!(&self.title, Ok(outcome) if outcome.changed())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub user: UserId,
    /// Every saved catch of the user, private ones included.
    pub catches: usize,
    /// Largest catch that competes for titles; private catches never count.
    pub best_catch: Option<Catch>,
    pub spots: Vec<SpotId>,
    pub territories: Vec<TerritoryId>,
}

/// The ranking engine behind one store.
pub struct Kingdom<S: ?Sized> {
    store: Arc<S>,
    resolver: SpotTitleResolver<S>,
    notifications: Option<Box<dyn NotificationSink>>,
}

impl<S> fmt::Debug for Kingdom<S>
where
    S: fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kingdom")
            .field("store", &self.store)
            .field("resolver", &self.resolver)
            .field("notifications", &self.notifications.is_some())
            .finish()
    }
}

impl<S> Kingdom<S>
where
    S: Store + ?Sized,
{
    pub fn new(store: Arc<S>, config: ResolverConfig) -> Self {
        Self {
            resolver: SpotTitleResolver::new(store.clone(), config),
            store,
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.notifications = Some(Box::new(sink));
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Saves `catch` and lets it contend for its spot's title.
    pub async fn submit(&self, catch: NewCatch) -> Result<Submission, Error> {
        let catch = self
            .store
            .insert_catch(catch)
            .await
            .map_err(Error::SaveCatch)?;
        info!("Saved catch {}: {catch}", catch.id);

        Ok(self.contend(catch).await)
    }

    /// Lets an already saved catch contend again, e.g. after the previous
    /// attempt ran out of retries.
    pub async fn resubmit(&self, id: CatchId) -> Result<Submission, Error> {
        let catch = self
            .store
            .get_catch(id)
            .await
            .map_err(Error::Store)?
            .ok_or(Error::CatchNotFound(id))?;

        Ok(self.contend(catch).await)
    }

    async fn contend(&self, catch: Catch) -> Submission {
        let title = self.resolver.resolve(&catch).await;
        if let Err(err) = &title {
            error!("Could not resolve title for catch {}: {err}", catch.id);
        }

        let mut territory = None;
        if let Ok(TitleOutcome::Claimed(change)) = &title {
            if let Some(id) = change.territory.filter(|_| change.recompute_territory) {
                territory = self.territory_after_change(id).await;
            }

            if let (Some(sink), Some(event)) = (&self.notifications, change.event()) {
                sink.notify(event);
            }
        }

        Submission {
            catch,
            title,
            territory,
        }
    }

    async fn territory_after_change(&self, id: TerritoryId) -> Option<TerritoryStanding> {
        match self.territory_standing(id).await {
            Ok(standing) => {
                info!("Territory {id} is ruled by {:?}", standing.ruler);
                Some(standing)
            }
            Err(Error::Territory(territory::Error::NotFound(_))) => {
                warn!("Spot references territory {id}, which does not exist");
                None
            }
            Err(err) => {
                error!("Could not recompute territory {id}: {err}");
                None
            }
        }
    }

    pub async fn spot_leaderboard(
        &self,
        spot: SpotId,
        limit: usize,
    ) -> Result<SpotLeaderboard, Error> {
        Ok(LeaderboardBuilder::new(self.store.clone())
            .spot(spot, limit)
            .await?)
    }

    pub async fn global_leaderboard(&self, limit: usize) -> Result<Vec<GlobalEntry>, Error> {
        Ok(LeaderboardBuilder::new(self.store.clone())
            .global(limit)
            .await?)
    }

    pub async fn territory_standing(&self, id: TerritoryId) -> Result<TerritoryStanding, Error> {
        Ok(TerritoryRulerCalculator::new(self.store.clone())
            .standing(id)
            .await?)
    }

    pub async fn user_summary(&self, user: UserId) -> Result<UserSummary, Error> {
        let catches = self
            .store
            .list_catches_by_user(user)
            .await
            .map_err(Error::Store)?;

        let best_catch = catches
            .iter()
            .filter(|catch| qualifier::is_contender(catch))
            .max_by(|a, b| {
                a.size
                    .normalized()
                    .total_cmp(&b.size.normalized())
                    .then_with(|| b.id.cmp(&a.id))
            })
            .cloned();

        let spots = self
            .store
            .list_spots()
            .await
            .map_err(Error::Store)?
            .into_iter()
            .filter(|spot| spot.title().map(|title| title.king) == Some(user))
            .map(|spot| spot.id)
            .collect();

        let territories = TerritoryRulerCalculator::new(self.store.clone())
            .standings()
            .await?
            .into_values()
            .filter(|standing| standing.ruler == Some(user))
            .map(|standing| standing.territory)
            .collect();

        Ok(UserSummary {
            user,
            catches: catches.len(),
            best_catch,
            spots,
            territories,
        })
    }
}
