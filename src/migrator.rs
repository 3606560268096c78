use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_equipment_movements_table::Migration),
            Box::new(m20240101_000002_create_customer_balances_table::Migration),
            Box::new(m20240101_000003_create_equipment_thresholds_table::Migration),
            Box::new(m20240101_000004_create_equipment_specifications_table::Migration),
            Box::new(m20240101_000005_create_driver_instructions_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_equipment_movements_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_equipment_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(EquipmentMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(EquipmentMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::CustomerId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::EquipmentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::Direction)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::Timestamp)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::Source)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::Confidence)
                                .double()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::Verified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(EquipmentMovements::OriginPhotoReference)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(EquipmentMovements::DriverName).string().null())
                        .col(ColumnDef::new(EquipmentMovements::Notes).string().null())
                        .col(
                            ColumnDef::new(EquipmentMovements::RecordedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Fold path: full history scan per key ordered by document time
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_equipment_movements_key_timestamp")
                        .table(EquipmentMovements::Table)
                        .col(EquipmentMovements::CustomerId)
                        .col(EquipmentMovements::EquipmentType)
                        .col(EquipmentMovements::Timestamp)
                        .to_owned(),
                )
                .await?;

            // Duplicate-detection path: recent records per key
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_equipment_movements_key_recorded_at")
                        .table(EquipmentMovements::Table)
                        .col(EquipmentMovements::CustomerId)
                        .col(EquipmentMovements::EquipmentType)
                        .col(EquipmentMovements::RecordedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(EquipmentMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum EquipmentMovements {
        Table,
        Id,
        CustomerId,
        EquipmentType,
        Quantity,
        Direction,
        Timestamp,
        Source,
        Confidence,
        Verified,
        OriginPhotoReference,
        DriverName,
        Notes,
        RecordedAt,
    }
}

mod m20240101_000002_create_customer_balances_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_customer_balances_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CustomerBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerBalances::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::CustomerId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::EquipmentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::CurrentBalance)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::Threshold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::LastMovementAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CustomerBalances::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customer_balances_key")
                        .table(CustomerBalances::Table)
                        .col(CustomerBalances::CustomerId)
                        .col(CustomerBalances::EquipmentType)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customer_balances_status")
                        .table(CustomerBalances::Table)
                        .col(CustomerBalances::Status)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CustomerBalances::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum CustomerBalances {
        Table,
        Id,
        CustomerId,
        EquipmentType,
        CurrentBalance,
        Threshold,
        Status,
        LastMovementAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_equipment_thresholds_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_equipment_thresholds_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(EquipmentThresholds::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(EquipmentThresholds::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentThresholds::CustomerId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentThresholds::EquipmentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentThresholds::Threshold)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentThresholds::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_equipment_thresholds_key")
                        .table(EquipmentThresholds::Table)
                        .col(EquipmentThresholds::CustomerId)
                        .col(EquipmentThresholds::EquipmentType)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(EquipmentThresholds::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum EquipmentThresholds {
        Table,
        Id,
        CustomerId,
        EquipmentType,
        Threshold,
        UpdatedAt,
    }
}

mod m20240101_000004_create_equipment_specifications_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_equipment_specifications_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(EquipmentSpecifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(EquipmentSpecifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentSpecifications::EquipmentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentSpecifications::Name)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(EquipmentSpecifications::Color).string().null())
                        .col(ColumnDef::new(EquipmentSpecifications::Size).string().null())
                        .col(ColumnDef::new(EquipmentSpecifications::Grade).string().null())
                        .col(
                            ColumnDef::new(EquipmentSpecifications::Description)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentSpecifications::DefaultThreshold)
                                .integer()
                                .not_null()
                                .default(20),
                        )
                        .col(
                            ColumnDef::new(EquipmentSpecifications::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(EquipmentSpecifications::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EquipmentSpecifications::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_equipment_specifications_type")
                        .table(EquipmentSpecifications::Table)
                        .col(EquipmentSpecifications::EquipmentType)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(EquipmentSpecifications::Table)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum EquipmentSpecifications {
        Table,
        Id,
        EquipmentType,
        Name,
        Color,
        Size,
        Grade,
        Description,
        DefaultThreshold,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_driver_instructions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_driver_instructions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DriverInstructions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DriverInstructions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::CustomerId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::EquipmentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::ExcessAtCreation)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::Priority)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::AssignedDriver)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::UnableReason)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverInstructions::StatusChangedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Live-instruction lookup per key
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_driver_instructions_key_status")
                        .table(DriverInstructions::Table)
                        .col(DriverInstructions::CustomerId)
                        .col(DriverInstructions::EquipmentType)
                        .col(DriverInstructions::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_driver_instructions_driver")
                        .table(DriverInstructions::Table)
                        .col(DriverInstructions::AssignedDriver)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DriverInstructions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum DriverInstructions {
        Table,
        Id,
        CustomerId,
        EquipmentType,
        ExcessAtCreation,
        Priority,
        AssignedDriver,
        Status,
        UnableReason,
        CreatedAt,
        StatusChangedAt,
    }
}
