use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
    NameKey,
    Kind,
    Subgroup,
    SequenceCode,
    UserId,
    GroupId,
    ScopeKey,
}

#[derive(Iden)]
enum ClassifyRules {
    Table,
    Id,
    Pattern,
    Target,
    Priority,
    UserId,
    GroupId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::NameKey).string().not_null())
                    .col(ColumnDef::new(Categories::Kind).string().not_null())
                    .col(ColumnDef::new(Categories::Subgroup).string())
                    .col(ColumnDef::new(Categories::SequenceCode).integer())
                    .col(ColumnDef::new(Categories::UserId).string().not_null())
                    .col(ColumnDef::new(Categories::GroupId).string())
                    .col(ColumnDef::new(Categories::ScopeKey).string().not_null())
                    .to_owned(),
            )
            .await?;

        // Per-scope uniqueness of names and sequence codes. The second index
        // is what makes the allocate-then-insert race detectable.
        manager
            .create_index(
                Index::create()
                    .name("idx-categories-scope_key-name_key-unique")
                    .table(Categories::Table)
                    .col(Categories::ScopeKey)
                    .col(Categories::NameKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-scope_key-sequence_code-unique")
                    .table(Categories::Table)
                    .col(Categories::ScopeKey)
                    .col(Categories::SequenceCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClassifyRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClassifyRules::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ClassifyRules::Pattern).string().not_null())
                    .col(ColumnDef::new(ClassifyRules::Target).string().not_null())
                    .col(
                        ColumnDef::new(ClassifyRules::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ClassifyRules::UserId).string())
                    .col(ColumnDef::new(ClassifyRules::GroupId).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-classify_rules-priority")
                    .table(ClassifyRules::Table)
                    .col(ClassifyRules::Priority)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ClassifyRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        Ok(())
    }
}
