use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DataSubmissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DataSubmissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DataSubmissions::DatasetId).integer().not_null())
                    .col(ColumnDef::new(DataSubmissions::SubmittedBy).integer().not_null())
                    .col(ColumnDef::new(DataSubmissions::FileName).string())
                    .col(ColumnDef::new(DataSubmissions::FilePath).string())
                    .col(ColumnDef::new(DataSubmissions::RowCount).integer().not_null())
                    .col(ColumnDef::new(DataSubmissions::ContentHash).string().not_null())
                    .col(
                        ColumnDef::new(DataSubmissions::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(DataSubmissions::ValidationResults).json())
                    .col(ColumnDef::new(DataSubmissions::ReviewNotes).text())
                    .col(ColumnDef::new(DataSubmissions::ReviewedBy).integer())
                    .col(ColumnDef::new(DataSubmissions::ReviewedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(DataSubmissions::AppliedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(DataSubmissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DataSubmissions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-data_submissions-dataset_id")
                            .from(DataSubmissions::Table, DataSubmissions::DatasetId)
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
                    .table(StagingRows::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StagingRows::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StagingRows::SubmissionId).integer().not_null())
                    .col(ColumnDef::new(StagingRows::RowIndex).integer().not_null())
                    .col(ColumnDef::new(StagingRows::Data).json().not_null())
                    .col(ColumnDef::new(StagingRows::ValidationStatus).string())
                    .col(ColumnDef::new(StagingRows::ValidationErrors).json())
                    .col(
                        ColumnDef::new(StagingRows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-staging_rows-submission_id")
                            .from(StagingRows::Table, StagingRows::SubmissionId)
                            .to(DataSubmissions::Table, DataSubmissions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BusinessRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BusinessRules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BusinessRules::DatasetId).integer().not_null())
                    .col(ColumnDef::new(BusinessRules::RuleName).string().not_null())
                    .col(ColumnDef::new(BusinessRules::RuleType).string().not_null())
                    .col(ColumnDef::new(BusinessRules::RuleConfig).json().not_null())
                    .col(ColumnDef::new(BusinessRules::ErrorMessage).text().not_null())
                    .col(
                        ColumnDef::new(BusinessRules::Severity)
                            .string()
                            .not_null()
                            .default("error"),
                    )
                    .col(
                        ColumnDef::new(BusinessRules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BusinessRules::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(BusinessRules::CreatedBy).integer().not_null())
                    .col(
                        ColumnDef::new(BusinessRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BusinessRules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-business_rules-dataset_id")
                            .from(BusinessRules::Table, BusinessRules::DatasetId)
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
                    .name("idx-data_submissions-dataset_id-status")
                    .table(DataSubmissions::Table)
                    .col(DataSubmissions::DatasetId)
                    .col(DataSubmissions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-staging_rows-submission_id-row_index")
                    .table(StagingRows::Table)
                    .col(StagingRows::SubmissionId)
                    .col(StagingRows::RowIndex)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-business_rules-dataset_id-priority")
                    .table(BusinessRules::Table)
                    .col(BusinessRules::DatasetId)
                    .col(BusinessRules::Priority)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx-business_rules-dataset_id-priority")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx-staging_rows-submission_id-row_index")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx-data_submissions-dataset_id-status")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(BusinessRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StagingRows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DataSubmissions::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum DataSubmissions {
    Table,
    Id,
    DatasetId,
    SubmittedBy,
    FileName,
    FilePath,
    RowCount,
    ContentHash,
    Status,
    ValidationResults,
    ReviewNotes,
    ReviewedBy,
    ReviewedAt,
    AppliedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StagingRows {
    Table,
    Id,
    SubmissionId,
    RowIndex,
    Data,
    ValidationStatus,
    ValidationErrors,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BusinessRules {
    Table,
    Id,
    DatasetId,
    RuleName,
    RuleType,
    RuleConfig,
    ErrorMessage,
    Severity,
    IsActive,
    Priority,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Datasets {
    Table,
    Id,
}
