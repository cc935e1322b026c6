use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DatasetSchemas::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DatasetSchemas::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DatasetSchemas::DatasetId).integer().not_null())
                    .col(ColumnDef::new(DatasetSchemas::Name).string().not_null())
                    .col(ColumnDef::new(DatasetSchemas::Description).text())
                    .col(
                        ColumnDef::new(DatasetSchemas::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(DatasetSchemas::CreatedBy).integer().not_null())
                    .col(
                        ColumnDef::new(DatasetSchemas::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DatasetSchemas::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-dataset_schemas-dataset_id")
                            .from(DatasetSchemas::Table, DatasetSchemas::DatasetId)
                            .to(Datasets::Table, Datasets::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SchemaFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SchemaFields::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SchemaFields::SchemaId).integer().not_null())
                    .col(ColumnDef::new(SchemaFields::Name).string().not_null())
                    .col(ColumnDef::new(SchemaFields::DataType).string().not_null())
                    .col(
                        ColumnDef::new(SchemaFields::IsRequired)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SchemaFields::IsUnique)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SchemaFields::Position).integer().not_null())
                    .col(ColumnDef::new(SchemaFields::Description).text())
                    .col(
                        ColumnDef::new(SchemaFields::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-schema_fields-schema_id")
                            .from(SchemaFields::Table, SchemaFields::SchemaId)
                            .to(DatasetSchemas::Table, DatasetSchemas::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-dataset_schemas-dataset_id")
                    .table(DatasetSchemas::Table)
                    .col(DatasetSchemas::DatasetId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-schema_fields-schema_id-name")
                    .table(SchemaFields::Table)
                    .col(SchemaFields::SchemaId)
                    .col(SchemaFields::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-schema_fields-schema_id-position")
                    .table(SchemaFields::Table)
                    .col(SchemaFields::SchemaId)
                    .col(SchemaFields::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx-schema_fields-schema_id-position")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx-schema_fields-schema_id-name").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx-dataset_schemas-dataset_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SchemaFields::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DatasetSchemas::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum DatasetSchemas {
    Table,
    Id,
    DatasetId,
    Name,
    Description,
    IsActive,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SchemaFields {
    Table,
    Id,
    SchemaId,
    Name,
    DataType,
    IsRequired,
    IsUnique,
    Position,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Datasets {
    Table,
    Id,
}
