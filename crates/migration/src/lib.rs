pub use sea_orm_migration::prelude::*;

mod m20260810_000001_accounts;
mod m20260810_000002_categories;
mod m20260812_000001_products;
mod m20260815_000001_ledger;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_000001_accounts::Migration),
            Box::new(m20260810_000002_categories::Migration),
            Box::new(m20260812_000001_products::Migration),
            Box::new(m20260815_000001_ledger::Migration),
        ]
    }
}
