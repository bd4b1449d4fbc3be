use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace};
use ranking::{
    store::{self, CatchStore, Commit, SpotStore, TerritoryStore},
    Catch, CatchId, NewCatch, Size, SizeUnit, Spot, SpotId, SpotTitle, Territory, TerritoryId,
    UserId, Version, Versioned,
};
use sea_orm::{
    prelude::DateTimeWithTimeZone, sea_query::Expr, ActiveModelTrait, ActiveValue, ColumnTrait,
    DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
};

use crate::entities::{catches, prelude::*, spots, territories};

/// Record store on top of a sea-orm connection.
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn create_territory(&self, name: &str) -> Result<TerritoryId, store::Error> {
        let territory = territories::ActiveModel {
            name: ActiveValue::set(name.to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(store::Error::backend)?;

        Ok(TerritoryId(territory.id))
    }

    pub async fn create_spot(
        &self,
        name: &str,
        territory: Option<TerritoryId>,
    ) -> Result<SpotId, store::Error> {
        let spot = spots::ActiveModel {
            name: ActiveValue::set(name.to_string()),
            territory_id: ActiveValue::set(territory.map(|id| id.0)),
            version: ActiveValue::set(Version::INITIAL.0),
            updated_at: ActiveValue::set(Utc::now().into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(store::Error::backend)?;

        Ok(SpotId(spot.id))
    }
}

fn spot_from_model(model: spots::Model) -> Versioned<Spot> {
    let best_size = match (model.best_size, model.best_unit) {
        (Some(value), Some(unit)) => Some(Size::new(value, SizeUnit::from(unit))),
        _ => None,
    };

    Versioned {
        value: Spot {
            id: SpotId(model.id),
            territory: model.territory_id.map(TerritoryId),
            king: model.king_id.map(UserId),
            best_catch: model.best_catch_id.map(CatchId),
            best_size,
        },
        version: Version(model.version),
    }
}

fn catch_from_model(model: catches::Model) -> Result<Catch, store::Error> {
    let visibility = model
        .visibility
        .parse()
        .map_err(|err: ranking::UnknownVisibility| store::Error::Corrupt {
            entity: "catch",
            reason: format!("catch {}: {err}", model.id),
        })?;

    Ok(Catch {
        id: CatchId(model.id),
        owner: UserId(model.user_id),
        spot: model.spot_id.map(SpotId),
        species: model.species,
        size: Size::new(model.size, SizeUnit::from(model.unit)),
        visibility,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn territory_from_models(model: territories::Model, spots: Vec<spots::Model>) -> Territory {
    let mut spots: Vec<_> = spots.into_iter().map(|spot| SpotId(spot.id)).collect();
    spots.sort();

    Territory {
        id: TerritoryId(model.id),
        name: model.name,
        spots,
    }
}

#[async_trait]
impl SpotStore for SeaOrmStore {
    async fn get_spot(&self, id: SpotId) -> Result<Option<Versioned<Spot>>, store::Error> {
        trace!("Querying spot {id}");

        Ok(Spots::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(store::Error::backend)?
            .map(spot_from_model))
    }

    async fn list_spots(&self) -> Result<Vec<Spot>, store::Error> {
        Ok(Spots::find()
            .order_by_asc(spots::Column::Id)
            .all(&self.db)
            .await
            .map_err(store::Error::backend)?
            .into_iter()
            .map(|model| spot_from_model(model).value)
            .collect())
    }

    async fn conditional_update(
        &self,
        id: SpotId,
        expected: Version,
        title: SpotTitle,
    ) -> Result<Commit, store::Error> {
        let next = expected.next();
        let now: DateTimeWithTimeZone = Utc::now().into();

        let result = Spots::update_many()
            .col_expr(spots::Column::KingId, Expr::value(title.king.0))
            .col_expr(spots::Column::BestCatchId, Expr::value(title.best_catch.0))
            .col_expr(spots::Column::BestSize, Expr::value(title.best_size.value))
            .col_expr(
                spots::Column::BestUnit,
                Expr::value(title.best_size.unit.code().to_string()),
            )
            .col_expr(spots::Column::Version, Expr::value(next.0))
            .col_expr(spots::Column::UpdatedAt, Expr::value(now))
            .filter(spots::Column::Id.eq(id.0))
            .filter(spots::Column::Version.eq(expected.0))
            .exec(&self.db)
            .await
            .map_err(store::Error::backend)?;

        if result.rows_affected == 0 {
            debug!("Spot {id} is no longer at {expected}");
            Ok(Commit::Conflict)
        } else {
            Ok(Commit::Applied(next))
        }
    }
}

#[async_trait]
impl CatchStore for SeaOrmStore {
    async fn get_catch(&self, id: CatchId) -> Result<Option<Catch>, store::Error> {
        Catches::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(store::Error::backend)?
            .map(catch_from_model)
            .transpose()
    }

    async fn list_catches_by_spot(&self, spot: SpotId) -> Result<Vec<Catch>, store::Error> {
        Catches::find()
            .filter(catches::Column::SpotId.eq(spot.0))
            .order_by_asc(catches::Column::Id)
            .all(&self.db)
            .await
            .map_err(store::Error::backend)?
            .into_iter()
            .map(catch_from_model)
            .collect()
    }

    async fn list_catches_by_user(&self, user: UserId) -> Result<Vec<Catch>, store::Error> {
        Catches::find()
            .filter(catches::Column::UserId.eq(user.0))
            .order_by_asc(catches::Column::Id)
            .all(&self.db)
            .await
            .map_err(store::Error::backend)?
            .into_iter()
            .map(catch_from_model)
            .collect()
    }

    async fn insert_catch(&self, catch: NewCatch) -> Result<Catch, store::Error> {
        let model = catches::ActiveModel {
            user_id: ActiveValue::set(catch.owner.0),
            spot_id: ActiveValue::set(catch.spot.map(|spot| spot.0)),
            species: ActiveValue::set(catch.species),
            size: ActiveValue::set(catch.size.value),
            unit: ActiveValue::set(catch.size.unit.code().to_string()),
            visibility: ActiveValue::set(catch.visibility.as_str().to_string()),
            created_at: ActiveValue::set(catch.created_at.into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(store::Error::backend)?;

        catch_from_model(model)
    }
}

#[async_trait]
impl TerritoryStore for SeaOrmStore {
    async fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, store::Error> {
        let Some(territory) = Territories::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(store::Error::backend)? else {
            return Ok(None);
        };

        let spots = territory
            .find_related(Spots)
            .all(&self.db)
            .await
            .map_err(store::Error::backend)?;

        Ok(Some(territory_from_models(territory, spots)))
    }

    async fn list_territories(&self) -> Result<Vec<Territory>, store::Error> {
        Ok(Territories::find()
            .order_by_asc(territories::Column::Id)
            .find_with_related(Spots)
            .all(&self.db)
            .await
            .map_err(store::Error::backend)?
            .into_iter()
            .map(|(territory, spots)| territory_from_models(territory, spots))
            .collect())
    }

    async fn list_spots_for_territory(&self, id: TerritoryId) -> Result<Vec<Spot>, store::Error> {
        Ok(Spots::find()
            .filter(spots::Column::TerritoryId.eq(id.0))
            .order_by_asc(spots::Column::Id)
            .all(&self.db)
            .await
            .map_err(store::Error::backend)?
            .into_iter()
            .map(|model| spot_from_model(model).value)
            .collect())
    }
}
