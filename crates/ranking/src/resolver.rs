//! Decides whether a catch takes over its spot's title and commits the change.
//!
//! The store offers no locks, so every decision is made against a versioned
//! read and committed with [`SpotStore::conditional_update`]. When the spot
//! moved in between, the whole decision is redone against the fresh state:
//! the record may have grown past the catch in the meantime.

use std::{sync::Arc, time::Duration};

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use log::{debug, info, warn};
use miette::Diagnostic;
use serde::Serialize;

use crate::{
    models::{Catch, Size, SpotId, SpotTitle, TerritoryId, UserId, Version, Versioned},
    qualifier,
    store::{self, Commit, SpotStore, TitleChanged},
};

/// Minimum excess, in centimeters, a catch needs over the current record.
pub const DEFAULT_MARGIN: f64 = 0.1;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("spot {0} does not exist")]
    #[diagnostic(code(resolver::spot_not_found))]
    SpotNotFound(SpotId),

    #[error("spot {spot} kept changing, gave up after {attempts} attempts")]
    #[diagnostic(
        code(resolver::conflicts_exhausted),
        help("the catch is saved; submitting it for the title again is safe")
    )]
    ConflictsExhausted { spot: SpotId, attempts: u32 },

    #[error("could not access spot store")]
    #[diagnostic(code(resolver::store))]
    Store(#[source] store::Error),
}

impl Error {
    /// Whether the caller may simply try the same catch again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConflictsExhausted { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub margin: f64,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(200),
        }
    }
}

impl ResolverConfig {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Whether `candidate` takes the title from the current record.
///
/// Sizes are compared in centimeters. An untitled spot goes to any candidate.
pub fn beats(candidate: &Size, current: Option<&Size>, margin: f64) -> bool {
    match current {
        Some(current) => candidate.normalized() > current.normalized() + margin,
        None => true,
    }
}

/// A committed title change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleChange {
    pub spot: SpotId,
    pub territory: Option<TerritoryId>,
    pub king: UserId,
    pub previous_king: Option<UserId>,
    pub title: SpotTitle,
    pub version: Version,
    /// The spot belongs to a territory whose ruler may have changed.
    pub recompute_territory: bool,
}

impl TitleChange {
    /// Notification for this change, if the spot changed hands.
    pub fn event(&self) -> Option<TitleChanged> {
        (self.previous_king != Some(self.king)).then(|| TitleChanged {
            spot: self.spot,
            king: self.king,
            previous_king: self.previous_king,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TitleOutcome {
    /// Private catches never compete.
    NotQualified,
    /// The catch was not logged at a spot.
    NoSpot,
    /// The current record stands.
    Kept { king: Option<UserId> },
    Claimed(TitleChange),
}

impl TitleOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, TitleOutcome::Claimed(_))
    }

    pub fn change(&self) -> Option<&TitleChange> {
        match self {
            TitleOutcome::Claimed(change) => Some(change),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SpotTitleResolver<S: ?Sized> {
    spots: Arc<S>,
    config: ResolverConfig,
}

impl<S> SpotTitleResolver<S>
where
    S: SpotStore + ?Sized,
{
    pub fn new(spots: Arc<S>, config: ResolverConfig) -> Self {
        Self { spots, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Lets `catch` contend for the title of the spot it was logged at.
    pub async fn resolve(&self, catch: &Catch) -> Result<TitleOutcome, Error> {
        if !qualifier::is_contender(catch) {
            debug!("Catch {} is {}, not contending", catch.id, catch.visibility);
            return Ok(TitleOutcome::NotQualified);
        }

        let Some(spot) = catch.spot else {
            debug!("Catch {} has no spot, not contending", catch.id);
            return Ok(TitleOutcome::NoSpot);
        };

        let attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.backoff();

        for attempt in 1..=attempts {
            let Versioned { value, version } = self
                .spots
                .get_spot(spot)
                .await
                .map_err(Error::Store)?
                .ok_or(Error::SpotNotFound(spot))?;

            if value.has_inconsistent_title() {
                warn!(
                    "Spot {spot} has inconsistent title (king: {:?}, best catch: {:?}), catch {} contends as for an untitled spot",
                    value.king, value.best_catch, catch.id
                );
            }

            let current = value.title();
            let previous_king = current.as_ref().map(|title| title.king);

            if current
                .as_ref()
                .map_or(false, |title| title.best_catch == catch.id)
            {
                debug!("Catch {} already holds spot {spot}", catch.id);
                return Ok(TitleOutcome::Kept {
                    king: previous_king,
                });
            }

            let current_size = current.as_ref().map(|title| &title.best_size);
            if !beats(&catch.size, current_size, self.config.margin) {
                debug!(
                    "Catch {} ({}) does not beat the record of spot {spot}",
                    catch.id, catch.size
                );
                return Ok(TitleOutcome::Kept {
                    king: previous_king,
                });
            }

            let title = SpotTitle::for_catch(catch);
            match self
                .spots
                .conditional_update(spot, version, title.clone())
                .await
                .map_err(Error::Store)?
            {
                Commit::Applied(version) => {
                    info!(
                        "{} is the new king of spot {spot} with {}",
                        catch.owner, catch.size
                    );

                    return Ok(TitleOutcome::Claimed(TitleChange {
                        spot,
                        territory: value.territory,
                        king: catch.owner,
                        previous_king,
                        title,
                        version,
                        recompute_territory: value.territory.is_some(),
                    }));
                }
                Commit::Conflict => {
                    warn!(
                        "Spot {spot} changed while resolving catch {} (attempt {attempt}/{attempts})",
                        catch.id
                    );

                    if attempt < attempts {
                        if let Some(delay) = backoff.next_backoff() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(Error::ConflictsExhausted { spot, attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use test_case::test_case;

    use super::*;
    use crate::{
        memory::MemoryStore,
        models::{CatchId, SizeUnit, Spot, Visibility},
    };

    fn catch(id: i32, owner: i32, size: Size, visibility: Visibility) -> Catch {
        Catch {
            id: CatchId(id),
            owner: UserId(owner),
            spot: Some(SpotId(1)),
            species: "perch".to_string(),
            size,
            visibility,
            created_at: Utc::now(),
        }
    }

    fn resolver(store: Arc<MemoryStore>) -> SpotTitleResolver<MemoryStore> {
        SpotTitleResolver::new(store, ResolverConfig::default())
    }

    async fn king(store: &MemoryStore) -> Option<UserId> {
        store.get_spot(SpotId(1)).await.unwrap().unwrap().value.king
    }

    #[test_case(Size::cm(40.2), Some(Size::cm(40.0)), true ; "clear win")]
    #[test_case(Size::cm(40.05), Some(Size::cm(40.0)), false ; "within margin")]
    #[test_case(Size::cm(40.0), Some(Size::cm(40.0)), false ; "exact tie")]
    #[test_case(Size::cm(0.05), None, true ; "untitled spot")]
    #[test_case(Size::new(16.0, SizeUnit::Inches), Some(Size::cm(40.0)), true ; "inches against centimeters")]
    #[test_case(Size::new(390.0, SizeUnit::Millimeters), Some(Size::cm(40.0)), false ; "millimeters against centimeters")]
    fn beats_current_record(candidate: Size, current: Option<Size>, expected: bool) {
        assert_eq!(beats(&candidate, current.as_ref(), DEFAULT_MARGIN), expected);
    }

    #[tokio::test]
    async fn margin_scenario() {
        let store = Arc::new(MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None)));
        let resolver = resolver(store.clone());

        let first = resolver
            .resolve(&catch(1, 1, Size::cm(40.0), Visibility::Public))
            .await
            .unwrap();
        let change = first.change().unwrap();
        assert_eq!(change.previous_king, None);
        assert_eq!(king(&store).await, Some(UserId(1)));

        let close = resolver
            .resolve(&catch(2, 2, Size::cm(40.05), Visibility::Public))
            .await
            .unwrap();
        assert_eq!(
            close,
            TitleOutcome::Kept {
                king: Some(UserId(1))
            }
        );
        assert_eq!(king(&store).await, Some(UserId(1)));

        let win = resolver
            .resolve(&catch(3, 2, Size::cm(41.0), Visibility::Public))
            .await
            .unwrap();
        let change = win.change().unwrap();
        assert_eq!(change.king, UserId(2));
        assert_eq!(change.previous_king, Some(UserId(1)));
        assert_eq!(change.title.best_catch, CatchId(3));
        assert_eq!(
            change.event(),
            Some(TitleChanged {
                spot: SpotId(1),
                king: UserId(2),
                previous_king: Some(UserId(1)),
            })
        );

        let spot = store.get_spot(SpotId(1)).await.unwrap().unwrap().value;
        assert_eq!(spot.best_size, Some(Size::cm(41.0)));
    }

    #[tokio::test]
    async fn private_catch_never_takes_title() {
        let store = Arc::new(MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None)));
        let resolver = resolver(store.clone());

        resolver
            .resolve(&catch(1, 1, Size::cm(40.0), Visibility::Public))
            .await
            .unwrap();
        let outcome = resolver
            .resolve(&catch(2, 2, Size::cm(90.0), Visibility::Private))
            .await
            .unwrap();

        assert_eq!(outcome, TitleOutcome::NotQualified);
        assert_eq!(king(&store).await, Some(UserId(1)));
    }

    #[tokio::test]
    async fn friends_only_catch_competes() {
        let store = Arc::new(MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None)));

        let outcome = resolver(store)
            .resolve(&catch(1, 1, Size::cm(12.0), Visibility::FriendsOnly))
            .await
            .unwrap();

        assert!(outcome.changed());
    }

    #[tokio::test]
    async fn improving_own_record_does_not_notify() {
        let store = Arc::new(MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None)));
        let resolver = resolver(store);

        resolver
            .resolve(&catch(1, 1, Size::cm(40.0), Visibility::Public))
            .await
            .unwrap();
        let outcome = resolver
            .resolve(&catch(2, 1, Size::cm(45.0), Visibility::Public))
            .await
            .unwrap();

        let change = outcome.change().unwrap();
        assert_eq!(change.previous_king, Some(UserId(1)));
        assert_eq!(change.event(), None);
    }

    #[tokio::test]
    async fn resubmitting_the_record_catch_keeps_title() {
        let store = Arc::new(MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None)));
        let resolver = resolver(store);
        let record = catch(1, 1, Size::cm(40.0), Visibility::Public);

        resolver.resolve(&record).await.unwrap();
        let outcome = resolver.resolve(&record).await.unwrap();

        assert_eq!(
            outcome,
            TitleOutcome::Kept {
                king: Some(UserId(1))
            }
        );
    }

    #[tokio::test]
    async fn catch_without_spot_does_not_contend() {
        let store = Arc::new(MemoryStore::new());
        let mut lost = catch(1, 1, Size::cm(40.0), Visibility::Public);
        lost.spot = None;

        let outcome = resolver(store).resolve(&lost).await.unwrap();

        assert_eq!(outcome, TitleOutcome::NoSpot);
    }

    #[tokio::test]
    async fn missing_spot_is_reported() {
        let store = Arc::new(MemoryStore::new());

        let err = resolver(store)
            .resolve(&catch(1, 1, Size::cm(40.0), Visibility::Public))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SpotNotFound(SpotId(1))));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn inconsistent_spot_is_treated_as_untitled() {
        let broken = Spot {
            king: Some(UserId(9)),
            ..Spot::untitled(SpotId(1), None)
        };
        let store = Arc::new(MemoryStore::new().with_spot(broken));

        let outcome = resolver(store.clone())
            .resolve(&catch(1, 1, Size::cm(1.0), Visibility::Public))
            .await
            .unwrap();

        let change = outcome.change().unwrap();
        assert_eq!(change.previous_king, None);
        assert_eq!(king(&store).await, Some(UserId(1)));
    }

    #[tokio::test]
    async fn territory_spot_requests_recompute() {
        let store = Arc::new(
            MemoryStore::new().with_spot(Spot::untitled(SpotId(1), Some(TerritoryId(4)))),
        );

        let outcome = resolver(store)
            .resolve(&catch(1, 1, Size::cm(30.0), Visibility::Public))
            .await
            .unwrap();

        let change = outcome.change().unwrap();
        assert!(change.recompute_territory);
        assert_eq!(change.territory, Some(TerritoryId(4)));
    }

    /// Lets a rival title land right before the first commit goes through.
    struct Interloper {
        inner: MemoryStore,
        rival: SpotTitle,
        interfered: AtomicU32,
    }

    #[async_trait]
    impl SpotStore for Interloper {
        async fn get_spot(&self, id: SpotId) -> Result<Option<Versioned<Spot>>, store::Error> {
            self.inner.get_spot(id).await
        }

        async fn list_spots(&self) -> Result<Vec<Spot>, store::Error> {
            self.inner.list_spots().await
        }

        async fn conditional_update(
            &self,
            id: SpotId,
            expected: Version,
            title: SpotTitle,
        ) -> Result<Commit, store::Error> {
            if self.interfered.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner.force_title(id, self.rival.clone()).await;
            }
            self.inner.conditional_update(id, expected, title).await
        }
    }

    fn interloper(rival_size: f64) -> Arc<Interloper> {
        Arc::new(Interloper {
            inner: MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None)),
            rival: SpotTitle {
                king: UserId(2),
                best_catch: CatchId(99),
                best_size: Size::cm(rival_size),
            },
            interfered: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn conflict_redoes_decision_against_fresh_record() {
        let store = interloper(80.0);
        let resolver = SpotTitleResolver::new(store.clone(), ResolverConfig::default());

        let outcome = resolver
            .resolve(&catch(1, 1, Size::cm(50.0), Visibility::Public))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TitleOutcome::Kept {
                king: Some(UserId(2))
            }
        );
        let spot = store.inner.get_spot(SpotId(1)).await.unwrap().unwrap();
        assert_eq!(spot.value.king, Some(UserId(2)));
    }

    #[tokio::test]
    async fn conflict_retries_and_wins_when_still_larger() {
        let store = interloper(30.0);
        let resolver = SpotTitleResolver::new(store.clone(), ResolverConfig::default());

        let outcome = resolver
            .resolve(&catch(1, 1, Size::cm(50.0), Visibility::Public))
            .await
            .unwrap();

        let change = outcome.change().unwrap();
        assert_eq!(change.previous_king, Some(UserId(2)));
        assert_eq!(change.version, Version(2));
    }

    struct AlwaysConflicts(MemoryStore);

    #[async_trait]
    impl SpotStore for AlwaysConflicts {
        async fn get_spot(&self, id: SpotId) -> Result<Option<Versioned<Spot>>, store::Error> {
            self.0.get_spot(id).await
        }

        async fn list_spots(&self) -> Result<Vec<Spot>, store::Error> {
            self.0.list_spots().await
        }

        async fn conditional_update(
            &self,
            _id: SpotId,
            _expected: Version,
            _title: SpotTitle,
        ) -> Result<Commit, store::Error> {
            Ok(Commit::Conflict)
        }
    }

    #[tokio::test]
    async fn exhausted_retries_fail_loudly() {
        let store = Arc::new(AlwaysConflicts(
            MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None)),
        ));
        let config = ResolverConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            ..ResolverConfig::default()
        };

        let err = SpotTitleResolver::new(store, config)
            .resolve(&catch(1, 1, Size::cm(50.0), Visibility::Public))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ConflictsExhausted {
                spot: SpotId(1),
                attempts: 3
            }
        ));
        assert!(err.is_retryable());
    }
}
