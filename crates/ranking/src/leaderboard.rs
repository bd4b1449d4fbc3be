use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use log::debug;
use miette::Diagnostic;
use serde::Serialize;

use crate::{
    models::{Catch, CatchId, Size, Spot, SpotId, TerritoryId, UserId},
    qualifier,
    store::{self, Store},
    territory::{self, TerritoryRulerCalculator, TerritoryStanding},
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("spot {0} does not exist")]
    #[diagnostic(code(leaderboard::spot_not_found))]
    SpotNotFound(SpotId),

    #[error("could not compute territory standings")]
    #[diagnostic(code(leaderboard::territory))]
    Territory(#[source] territory::Error),

    #[error("could not access store")]
    #[diagnostic(code(leaderboard::store))]
    Store(#[source] store::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotEntry {
    pub rank: u32,
    pub user: UserId,
    pub catch: CatchId,
    pub species: String,
    pub size: Size,
    /// Size in centimeters, the value entries are ranked by.
    pub normalized: f64,
    pub is_king: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotLeaderboard {
    pub spot: SpotId,
    pub king: Option<UserId>,
    pub entries: Vec<SpotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalEntry {
    pub rank: u32,
    pub user: UserId,
    pub crowns: u32,
    pub total_size: f64,
    pub territories_ruled: u32,
}

/// Larger catches first; on equal size the earlier, then lower id, wins.
fn catch_order(a: &Catch, b: &Catch) -> Ordering {
    b.size
        .normalized()
        .total_cmp(&a.size.normalized())
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Ranks each owner's single best qualifying catch at `spot`.
pub fn spot_board(spot: &Spot, catches: &[Catch], limit: usize) -> Vec<SpotEntry> {
    let mut best: BTreeMap<UserId, &Catch> = BTreeMap::new();

    for catch in catches
        .iter()
        .filter(|catch| catch.spot == Some(spot.id))
        .filter(|catch| qualifier::is_contender(catch))
    {
        best.entry(catch.owner)
            .and_modify(|current| {
                if catch_order(catch, current) == Ordering::Less {
                    *current = catch;
                }
            })
            .or_insert(catch);
    }

    let mut best: Vec<_> = best.into_values().collect();
    best.sort_by(|a, b| catch_order(a, b));

    let king = spot.title().map(|title| title.king);
    let mut rank = 0;
    let mut previous = None;

    best.into_iter()
        .take(limit)
        .map(|catch| {
            let normalized = catch.size.normalized();
            if previous != Some(normalized) {
                rank += 1;
                previous = Some(normalized);
            }

            SpotEntry {
                rank,
                user: catch.owner,
                catch: catch.id,
                species: catch.species.clone(),
                size: catch.size.clone(),
                normalized,
                is_king: king == Some(catch.owner),
            }
        })
        .collect()
}

/// Ranks owners across all spots by crowns, then by summed best sizes.
pub fn global_board(
    spots: &[Spot],
    standings: &BTreeMap<TerritoryId, TerritoryStanding>,
    limit: usize,
) -> Vec<GlobalEntry> {
    let mut ruled: BTreeMap<UserId, u32> = BTreeMap::new();
    for ruler in standings.values().filter_map(|standing| standing.ruler) {
        *ruled.entry(ruler).or_default() += 1;
    }

    let mut rank = 0;
    let mut previous = None;

    territory::tally(spots)
        .into_iter()
        .take(limit)
        .map(|tally| {
            let key = (tally.crowns, tally.total_size);
            if previous != Some(key) {
                rank += 1;
                previous = Some(key);
            }

            GlobalEntry {
                rank,
                user: tally.user,
                crowns: tally.crowns,
                total_size: tally.total_size,
                territories_ruled: ruled.get(&tally.user).copied().unwrap_or(0),
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct LeaderboardBuilder<S: ?Sized> {
    store: Arc<S>,
}

impl<S> LeaderboardBuilder<S>
where
    S: Store + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn spot(&self, id: SpotId, limit: usize) -> Result<SpotLeaderboard, Error> {
        let spot = self
            .store
            .get_spot(id)
            .await
            .map_err(Error::Store)?
            .ok_or(Error::SpotNotFound(id))?
            .value;

        let catches = self
            .store
            .list_catches_by_spot(id)
            .await
            .map_err(Error::Store)?;
        debug!("Ranking {} catches at spot {id}", catches.len());

        Ok(SpotLeaderboard {
            spot: id,
            king: spot.title().map(|title| title.king),
            entries: spot_board(&spot, &catches, limit),
        })
    }

    pub async fn global(&self, limit: usize) -> Result<Vec<GlobalEntry>, Error> {
        let spots = self.store.list_spots().await.map_err(Error::Store)?;
        let standings = TerritoryRulerCalculator::new(self.store.clone())
            .standings()
            .await
            .map_err(Error::Territory)?;
        debug!(
            "Ranking owners over {} spots and {} territories",
            spots.len(),
            standings.len()
        );

        Ok(global_board(&spots, &standings, limit))
    }
}
