//! In-process record store.
//!
//! Behaves like the SQL store: spots carry a version that every committed
//! update bumps, and reads yield to the scheduler so that concurrent
//! resolutions interleave around them the way they would around real I/O.

use std::collections::BTreeMap;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::sync::Mutex;

use crate::{
    models::{
        Catch, CatchId, NewCatch, Spot, SpotId, SpotTitle, Territory, TerritoryId, UserId,
        Version, Versioned,
    },
    store::{CatchStore, Commit, Error, SpotStore, TerritoryStore},
};

#[derive(Debug, Default)]
struct Records {
    spots: BTreeMap<SpotId, Versioned<Spot>>,
    catches: BTreeMap<CatchId, Catch>,
    territories: BTreeMap<TerritoryId, String>,
}

impl Records {
    fn territory(&self, id: TerritoryId) -> Option<Territory> {
        let name = self.territories.get(&id)?;

        Some(Territory {
            id,
            name: name.clone(),
            spots: self
                .spots
                .values()
                .filter(|spot| spot.value.territory == Some(id))
                .map(|spot| spot.value.id)
                .collect(),
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_territory(mut self, id: TerritoryId, name: impl Into<String>) -> Self {
        self.records.get_mut().territories.insert(id, name.into());
        self
    }

    pub fn with_spot(mut self, spot: Spot) -> Self {
        self.records.get_mut().spots.insert(
            spot.id,
            Versioned {
                value: spot,
                version: Version::INITIAL,
            },
        );
        self
    }

    pub fn with_catch(mut self, catch: Catch) -> Self {
        self.records.get_mut().catches.insert(catch.id, catch);
        self
    }

    /// Overwrites a spot's title without any version check.
    pub async fn force_title(&self, id: SpotId, title: SpotTitle) -> Option<Version> {
        let mut records = self.records.lock().await;
        let spot = records.spots.get_mut(&id)?;

        spot.value = spot.value.clone().with_title(title);
        spot.version = spot.version.next();

        Some(spot.version)
    }
}

#[async_trait]
impl SpotStore for MemoryStore {
    async fn get_spot(&self, id: SpotId) -> Result<Option<Versioned<Spot>>, Error> {
        let spot = self.records.lock().await.spots.get(&id).cloned();
        tokio::task::yield_now().await;

        Ok(spot)
    }

    async fn list_spots(&self) -> Result<Vec<Spot>, Error> {
        let records = self.records.lock().await;

        Ok(records
            .spots
            .values()
            .map(|spot| spot.value.clone())
            .collect())
    }

    async fn conditional_update(
        &self,
        id: SpotId,
        expected: Version,
        title: SpotTitle,
    ) -> Result<Commit, Error> {
        let mut records = self.records.lock().await;
        let Some(spot) = records.spots.get_mut(&id) else {
            return Ok(Commit::Conflict);
        };

        if spot.version != expected {
            debug!(
                "Rejecting update of spot {id}: expected {expected}, found {}",
                spot.version
            );
            return Ok(Commit::Conflict);
        }

        spot.value = spot.value.clone().with_title(title);
        spot.version = expected.next();
        trace!("Spot {id} is now at {}", spot.version);

        Ok(Commit::Applied(spot.version))
    }
}

#[async_trait]
impl CatchStore for MemoryStore {
    async fn get_catch(&self, id: CatchId) -> Result<Option<Catch>, Error> {
        Ok(self.records.lock().await.catches.get(&id).cloned())
    }

    async fn list_catches_by_spot(&self, spot: SpotId) -> Result<Vec<Catch>, Error> {
        let records = self.records.lock().await;

        Ok(records
            .catches
            .values()
            .filter(|catch| catch.spot == Some(spot))
            .cloned()
            .collect())
    }

    async fn list_catches_by_user(&self, user: UserId) -> Result<Vec<Catch>, Error> {
        let records = self.records.lock().await;

        Ok(records
            .catches
            .values()
            .filter(|catch| catch.owner == user)
            .cloned()
            .collect())
    }

    async fn insert_catch(&self, catch: NewCatch) -> Result<Catch, Error> {
        let mut records = self.records.lock().await;
        let id = records
            .catches
            .keys()
            .next_back()
            .map_or(CatchId(1), |last| CatchId(last.0 + 1));

        let catch = catch.with_id(id);
        records.catches.insert(id, catch.clone());

        Ok(catch)
    }
}

#[async_trait]
impl TerritoryStore for MemoryStore {
    async fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, Error> {
        Ok(self.records.lock().await.territory(id))
    }

    async fn list_territories(&self) -> Result<Vec<Territory>, Error> {
        let records = self.records.lock().await;

        Ok(records
            .territories
            .keys()
            .filter_map(|id| records.territory(*id))
            .collect())
    }

    async fn list_spots_for_territory(&self, id: TerritoryId) -> Result<Vec<Spot>, Error> {
        let records = self.records.lock().await;

        Ok(records
            .spots
            .values()
            .filter(|spot| spot.value.territory == Some(id))
            .map(|spot| spot.value.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{Size, Visibility};

    fn title(king: i32, catch: i32, size: f64) -> SpotTitle {
        SpotTitle {
            king: UserId(king),
            best_catch: CatchId(catch),
            best_size: Size::cm(size),
        }
    }

    #[tokio::test]
    async fn conditional_update_rejects_stale_version() {
        let store = MemoryStore::new().with_spot(Spot::untitled(SpotId(1), None));

        let first = store
            .conditional_update(SpotId(1), Version::INITIAL, title(1, 1, 40.0))
            .await
            .unwrap();
        let second = store
            .conditional_update(SpotId(1), Version::INITIAL, title(2, 2, 50.0))
            .await
            .unwrap();

        assert_eq!(first, Commit::Applied(Version(1)));
        assert_eq!(second, Commit::Conflict);

        let spot = store.get_spot(SpotId(1)).await.unwrap().unwrap();
        assert_eq!(spot.version, Version(1));
        assert_eq!(spot.value.king, Some(UserId(1)));
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let new_catch = NewCatch {
            owner: UserId(1),
            spot: Some(SpotId(1)),
            species: "pike".to_string(),
            size: Size::cm(60.0),
            visibility: Visibility::Public,
            created_at: Utc::now(),
        };

        let a = store.insert_catch(new_catch.clone()).await.unwrap();
        let b = store.insert_catch(new_catch).await.unwrap();

        assert_eq!(a.id, CatchId(1));
        assert_eq!(b.id, CatchId(2));
        assert_eq!(store.list_catches_by_spot(SpotId(1)).await.unwrap().len(), 2);
        assert!(store
            .list_catches_by_user(UserId(2))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn territory_members_follow_spots() {
        let store = MemoryStore::new()
            .with_territory(TerritoryId(1), "North Lake")
            .with_spot(Spot::untitled(SpotId(1), Some(TerritoryId(1))))
            .with_spot(Spot::untitled(SpotId(2), None))
            .with_spot(Spot::untitled(SpotId(3), Some(TerritoryId(1))));

        let territory = store.get_territory(TerritoryId(1)).await.unwrap().unwrap();

        assert_eq!(territory.spots, vec![SpotId(1), SpotId(3)]);
        assert!(store.get_territory(TerritoryId(2)).await.unwrap().is_none());
    }
}
