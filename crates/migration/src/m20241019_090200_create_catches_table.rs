use sea_orm_migration::prelude::*;

use super::m20241019_090100_create_spots_table::Spots;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Catches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Catches::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Catches::UserId).integer().not_null())
                    .col(ColumnDef::new(Catches::SpotId).integer())
                    .col(ColumnDef::new(Catches::Species).string().not_null())
                    .col(ColumnDef::new(Catches::Size).double().not_null())
                    .col(ColumnDef::new(Catches::Unit).string().not_null())
                    .col(ColumnDef::new(Catches::Visibility).string().not_null())
                    .col(
                        ColumnDef::new(Catches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-catch-spot_id")
                            .from(Catches::Table, Catches::SpotId)
                            .to(Spots::Table, Spots::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-catches-spot_id")
                    .table(Catches::Table)
                    .col(Catches::SpotId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-catches-user_id")
                    .table(Catches::Table)
                    .col(Catches::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Catches::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum Catches {
    Table,
    Id,
    UserId,
    SpotId,
    Species,
    Size,
    Unit,
    Visibility,
    CreatedAt,
}
