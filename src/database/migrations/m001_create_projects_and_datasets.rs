use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(ColumnDef::new(Projects::OwnerId).integer().not_null())
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Projects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Datasets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Datasets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Datasets::ProjectId).integer().not_null())
                    .col(ColumnDef::new(Datasets::Name).string().not_null())
                    .col(ColumnDef::new(Datasets::Description).text())
                    .col(ColumnDef::new(Datasets::FileName).string().not_null())
                    .col(ColumnDef::new(Datasets::FilePath).string())
                    .col(ColumnDef::new(Datasets::FileFormat).string().not_null())
                    .col(
                        ColumnDef::new(Datasets::FileSize)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Datasets::RowCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Datasets::ColumnCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Datasets::Status)
                            .string()
                            .not_null()
                            .default("processing"),
                    )
                    .col(ColumnDef::new(Datasets::ErrorMessage).text())
                    .col(ColumnDef::new(Datasets::UploadedBy).integer().not_null())
                    .col(ColumnDef::new(Datasets::ProcessedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Datasets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Datasets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-datasets-project_id")
                            .from(Datasets::Table, Datasets::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DatasetRows::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DatasetRows::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DatasetRows::DatasetId).integer().not_null())
                    .col(ColumnDef::new(DatasetRows::RowIndex).integer().not_null())
                    .col(ColumnDef::new(DatasetRows::Data).json().not_null())
                    .col(ColumnDef::new(DatasetRows::SourceSubmissionId).integer())
                    .col(
                        ColumnDef::new(DatasetRows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-dataset_rows-dataset_id")
                            .from(DatasetRows::Table, DatasetRows::DatasetId)
                            .to(Datasets::Table, Datasets::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-datasets-project_id")
                    .table(Datasets::Table)
                    .col(Datasets::ProjectId)
                    .to_owned(),
            )
            .await?;

        // Guards row_index allocation against concurrent appends
        manager
            .create_index(
                Index::create()
                    .name("idx-dataset_rows-dataset_id-row_index")
                    .table(DatasetRows::Table)
                    .col(DatasetRows::DatasetId)
                    .col(DatasetRows::RowIndex)
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
                    .name("idx-dataset_rows-dataset_id-row_index")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx-datasets-project_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DatasetRows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Datasets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    Name,
    Description,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Datasets {
    Table,
    Id,
    ProjectId,
    Name,
    Description,
    FileName,
    FilePath,
    FileFormat,
    FileSize,
    RowCount,
    ColumnCount,
    Status,
    ErrorMessage,
    UploadedBy,
    ProcessedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DatasetRows {
    Table,
    Id,
    DatasetId,
    RowIndex,
    Data,
    SourceSubmissionId,
    CreatedAt,
}
