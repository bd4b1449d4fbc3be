use sea_orm_migration::prelude::*;

use super::m20241019_090000_create_territories_table::Territories;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Spots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Spots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Spots::Name).string().not_null())
                    .col(ColumnDef::new(Spots::TerritoryId).integer())
                    .col(ColumnDef::new(Spots::KingId).integer())
                    .col(ColumnDef::new(Spots::BestCatchId).integer())
                    .col(ColumnDef::new(Spots::BestSize).double())
                    .col(ColumnDef::new(Spots::BestUnit).string())
                    .col(
                        ColumnDef::new(Spots::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Spots::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-spot-territory_id")
                            .from(Spots::Table, Spots::TerritoryId)
                            .to(Territories::Table, Territories::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Spots::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum Spots {
    Table,
    Id,
    Name,
    TerritoryId,
    KingId,
    BestCatchId,
    BestSize,
    BestUnit,
    Version,
    UpdatedAt,
}
