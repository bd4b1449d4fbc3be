pub use sea_orm_migration::prelude::*;

mod m20241019_090000_create_territories_table;
mod m20241019_090100_create_spots_table;
mod m20241019_090200_create_catches_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241019_090000_create_territories_table::Migration),
            Box::new(m20241019_090100_create_spots_table::Migration),
            Box::new(m20241019_090200_create_catches_table::Migration),
        ]
    }
}
