//! Territory rulership, derived from the titles of the member spots.
//!
//! Nothing here is stored: the ruler is recomputed from spot state on every
//! call, and identical spot state always yields the identical standing.

use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use log::debug;
use miette::Diagnostic;
use serde::Serialize;

use crate::{
    models::{Spot, TerritoryId, UserId},
    store::{self, TerritoryStore},
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("territory {0} does not exist")]
    #[diagnostic(code(territory::not_found))]
    NotFound(TerritoryId),

    #[error("could not access territory store")]
    #[diagnostic(code(territory::store))]
    Store(#[source] store::Error),
}

/// How many titles an owner holds, and the tie-break score behind them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrownTally {
    pub user: UserId,
    pub crowns: u32,
    /// Sum of the recorded best sizes of the titled spots.
    ///
    /// Values are summed as recorded, without unit conversion, so spots
    /// holding records in different units are not reconciled here.
    pub total_size: f64,
}

/// Crowns descending, then total size descending, then lower user id first.
pub fn rank_order(a: &CrownTally, b: &CrownTally) -> Ordering {
    b.crowns
        .cmp(&a.crowns)
        .then_with(|| b.total_size.total_cmp(&a.total_size))
        .then_with(|| a.user.cmp(&b.user))
}

/// Counts titles per owner over `spots`, best ranked first.
///
/// Spots whose title fields are inconsistent count as untitled.
pub fn tally<'a>(spots: impl IntoIterator<Item = &'a Spot>) -> Vec<CrownTally> {
    let mut tallies: BTreeMap<UserId, CrownTally> = BTreeMap::new();

    for title in spots.into_iter().filter_map(Spot::title) {
        let entry = tallies.entry(title.king).or_insert(CrownTally {
            user: title.king,
            crowns: 0,
            total_size: 0.0,
        });
        entry.crowns += 1;
        entry.total_size += title.best_size.value;
    }

    let mut ranking: Vec<_> = tallies.into_values().collect();
    ranking.sort_by(rank_order);
    ranking
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerritoryStanding {
    pub territory: TerritoryId,
    pub ruler: Option<UserId>,
    pub ranking: Vec<CrownTally>,
}

impl TerritoryStanding {
    /// Computes the standing of a territory from its member spots.
    pub fn compute(territory: TerritoryId, spots: &[Spot]) -> Self {
        let ranking = tally(spots);
        let ruler = ranking.first().map(|tally| tally.user);

        Self {
            territory,
            ruler,
            ranking,
        }
    }

    pub fn crowns(&self, user: UserId) -> u32 {
        self.ranking
            .iter()
            .find(|tally| tally.user == user)
            .map_or(0, |tally| tally.crowns)
    }

    pub fn crown_counts(&self) -> BTreeMap<UserId, u32> {
        self.ranking
            .iter()
            .map(|tally| (tally.user, tally.crowns))
            .collect()
    }
}

#[derive(Debug)]
pub struct TerritoryRulerCalculator<S: ?Sized> {
    territories: Arc<S>,
}

impl<S> TerritoryRulerCalculator<S>
where
    S: TerritoryStore + ?Sized,
{
    pub fn new(territories: Arc<S>) -> Self {
        Self { territories }
    }

    pub async fn standing(&self, id: TerritoryId) -> Result<TerritoryStanding, Error> {
        let territory = self
            .territories
            .get_territory(id)
            .await
            .map_err(Error::Store)?
            .ok_or(Error::NotFound(id))?;

        let spots = self
            .territories
            .list_spots_for_territory(territory.id)
            .await
            .map_err(Error::Store)?;

        let standing = TerritoryStanding::compute(territory.id, &spots);
        debug!(
            "Territory {} ({} spots) is ruled by {:?}",
            territory.name,
            spots.len(),
            standing.ruler
        );

        Ok(standing)
    }

    /// Standings of every territory, keyed by territory id.
    pub async fn standings(&self) -> Result<BTreeMap<TerritoryId, TerritoryStanding>, Error> {
        let mut standings = BTreeMap::new();

        for territory in self
            .territories
            .list_territories()
            .await
            .map_err(Error::Store)?
        {
            let spots = self
                .territories
                .list_spots_for_territory(territory.id)
                .await
                .map_err(Error::Store)?;

            standings.insert(
                territory.id,
                TerritoryStanding::compute(territory.id, &spots),
            );
        }

        Ok(standings)
    }
}
