use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Entries {
    Table,
    Id,
    Kind,
    Debit,
    Credit,
    AccountId,
    Description,
    OccurredAt,
    UserId,
    GroupId,
}

#[derive(Iden)]
enum EntryItems {
    Table,
    Id,
    EntryId,
    ProductId,
    Quantity,
    Subtotal,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
}

#[derive(Iden)]
enum Products {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Entries::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(Entries::Kind).string().not_null())
                    .col(ColumnDef::new(Entries::Debit).big_integer().not_null())
                    .col(ColumnDef::new(Entries::Credit).big_integer().not_null())
                    .col(ColumnDef::new(Entries::AccountId).blob())
                    .col(ColumnDef::new(Entries::Description).string())
                    .col(ColumnDef::new(Entries::OccurredAt).timestamp().not_null())
                    .col(ColumnDef::new(Entries::UserId).string().not_null())
                    .col(ColumnDef::new(Entries::GroupId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-account_id")
                            .from(Entries::Table, Entries::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entries-user_id-occurred_at")
                    .table(Entries::Table)
                    .col(Entries::UserId)
                    .col(Entries::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entries-account_id")
                    .table(Entries::Table)
                    .col(Entries::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EntryItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EntryItems::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EntryItems::EntryId).blob().not_null())
                    .col(ColumnDef::new(EntryItems::ProductId).blob().not_null())
                    .col(ColumnDef::new(EntryItems::Quantity).big_integer().not_null())
                    .col(ColumnDef::new(EntryItems::Subtotal).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entry_items-entry_id")
                            .from(EntryItems::Table, EntryItems::EntryId)
                            .to(Entries::Table, Entries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entry_items-product_id")
                            .from(EntryItems::Table, EntryItems::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entry_items-entry_id")
                    .table(EntryItems::Table)
                    .col(EntryItems::EntryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entry_items-product_id")
                    .table(EntryItems::Table)
                    .col(EntryItems::ProductId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EntryItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Entries::Table).to_owned())
            .await?;
        Ok(())
    }
}
