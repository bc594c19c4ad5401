use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_master_data_tables::Migration),
            Box::new(m20240101_000002_create_stock_ledger_table::Migration),
            Box::new(m20240101_000003_create_stock_balance_table::Migration),
            Box::new(m20240101_000004_create_stock_reservations_table::Migration),
            Box::new(m20240101_000005_create_document_sequences_table::Migration),
            Box::new(m20240101_000006_create_stock_document_tables::Migration),
        ]
    }
}

/// Adds the six stocking-key columns. Optional parts of the key are stored
/// as nil UUID / empty string so they take part in the unique index.
fn stocking_key_columns<T: Iden + 'static>(
    table: &mut TableCreateStatement,
    item_type: T,
    item_id: T,
    warehouse_id: T,
    location_id: T,
    batch_number: T,
    lot_number: T,
) -> &mut TableCreateStatement {
    table
        .col(ColumnDef::new(item_type).string_len(32).not_null())
        .col(ColumnDef::new(item_id).uuid().not_null())
        .col(ColumnDef::new(warehouse_id).uuid().not_null())
        .col(ColumnDef::new(location_id).uuid().not_null())
        .col(
            ColumnDef::new(batch_number)
                .string_len(64)
                .not_null()
                .default(""),
        )
        .col(
            ColumnDef::new(lot_number)
                .string_len(64)
                .not_null()
                .default(""),
        )
}

// Migration implementations

mod m20240101_000001_create_master_data_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_master_data_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Warehouses::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Warehouses::Code)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::LifecycleStatus)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Warehouses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseLocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseLocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseLocations::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseLocations::Code)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseLocations::Name).string().not_null())
                        .col(
                            ColumnDef::new(WarehouseLocations::LifecycleStatus)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(WarehouseLocations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseLocations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warehouse_locations_warehouse")
                                .from(WarehouseLocations::Table, WarehouseLocations::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouse_locations_warehouse_code")
                        .table(WarehouseLocations::Table)
                        .col(WarehouseLocations::WarehouseId)
                        .col(WarehouseLocations::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Materials::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Materials::Code)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(
                            ColumnDef::new(Materials::UnitOfMeasure)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::LifecycleStatus)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FinishedProducts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FinishedProducts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FinishedProducts::Code)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(FinishedProducts::Name).string().not_null())
                        .col(
                            ColumnDef::new(FinishedProducts::UnitOfMeasure)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FinishedProducts::LifecycleStatus)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(FinishedProducts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FinishedProducts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FinishedProducts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WarehouseLocations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Warehouses {
        Table,
        Id,
        Code,
        Name,
        LifecycleStatus,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum WarehouseLocations {
        Table,
        Id,
        WarehouseId,
        Code,
        Name,
        LifecycleStatus,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
        Code,
        Name,
        UnitOfMeasure,
        LifecycleStatus,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum FinishedProducts {
        Table,
        Id,
        Code,
        Name,
        UnitOfMeasure,
        LifecycleStatus,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_stock_ledger_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_stock_ledger_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let mut table = Table::create();
            table
                .table(StockLedger::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(StockLedger::Id)
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(
                    ColumnDef::new(StockLedger::TransactionType)
                        .string_len(32)
                        .not_null(),
                )
                .col(
                    ColumnDef::new(StockLedger::TransactionNumber)
                        .string_len(64)
                        .not_null(),
                )
                .col(ColumnDef::new(StockLedger::TransactionDate).date().not_null());
            super::stocking_key_columns(
                &mut table,
                StockLedger::ItemType,
                StockLedger::ItemId,
                StockLedger::WarehouseId,
                StockLedger::WarehouseLocationId,
                StockLedger::BatchNumber,
                StockLedger::LotNumber,
            )
            .col(ColumnDef::new(StockLedger::ExpiryDate).date().null())
            .col(
                ColumnDef::new(StockLedger::Quantity)
                    .decimal()
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockLedger::UnitCost)
                    .decimal()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(StockLedger::TotalCost)
                    .decimal()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(StockLedger::BalanceQuantity)
                    .decimal()
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockLedger::ReferenceType)
                    .string_len(32)
                    .not_null(),
            )
            .col(ColumnDef::new(StockLedger::ReferenceId).uuid().not_null())
            .col(ColumnDef::new(StockLedger::CreatedBy).string().not_null())
            .col(
                ColumnDef::new(StockLedger::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            );

            manager.create_table(table.to_owned()).await?;

            // Latest-balance lookups walk this index backwards.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_ledger_key_id")
                        .table(StockLedger::Table)
                        .col(StockLedger::ItemType)
                        .col(StockLedger::ItemId)
                        .col(StockLedger::WarehouseId)
                        .col(StockLedger::WarehouseLocationId)
                        .col(StockLedger::BatchNumber)
                        .col(StockLedger::LotNumber)
                        .col(StockLedger::Id)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_ledger_reference")
                        .table(StockLedger::Table)
                        .col(StockLedger::ReferenceType)
                        .col(StockLedger::ReferenceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLedger::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockLedger {
        Table,
        Id,
        TransactionType,
        TransactionNumber,
        TransactionDate,
        ItemType,
        ItemId,
        WarehouseId,
        WarehouseLocationId,
        BatchNumber,
        LotNumber,
        ExpiryDate,
        Quantity,
        UnitCost,
        TotalCost,
        BalanceQuantity,
        ReferenceType,
        ReferenceId,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240101_000003_create_stock_balance_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stock_balance_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let mut table = Table::create();
            table
                .table(StockBalance::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(StockBalance::Id)
                        .uuid()
                        .primary_key()
                        .not_null(),
                );
            super::stocking_key_columns(
                &mut table,
                StockBalance::ItemType,
                StockBalance::ItemId,
                StockBalance::WarehouseId,
                StockBalance::WarehouseLocationId,
                StockBalance::BatchNumber,
                StockBalance::LotNumber,
            )
            .col(
                ColumnDef::new(StockBalance::Quantity)
                    .decimal()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(StockBalance::ReservedQuantity)
                    .decimal()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(StockBalance::AvailableQuantity)
                    .decimal()
                    .extra("GENERATED ALWAYS AS (quantity - reserved_quantity) STORED"),
            )
            .col(
                ColumnDef::new(StockBalance::UnitCost)
                    .decimal()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(StockBalance::TotalCost)
                    .decimal()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(StockBalance::LastTransactionDate)
                    .date()
                    .null(),
            )
            .col(
                ColumnDef::new(StockBalance::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockBalance::UpdatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            );

            manager.create_table(table.to_owned()).await?;

            // One row per stocking key; upserts conflict on this index.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_balance_stocking_key")
                        .table(StockBalance::Table)
                        .col(StockBalance::ItemType)
                        .col(StockBalance::ItemId)
                        .col(StockBalance::WarehouseId)
                        .col(StockBalance::WarehouseLocationId)
                        .col(StockBalance::BatchNumber)
                        .col(StockBalance::LotNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockBalance::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockBalance {
        Table,
        Id,
        ItemType,
        ItemId,
        WarehouseId,
        WarehouseLocationId,
        BatchNumber,
        LotNumber,
        Quantity,
        ReservedQuantity,
        AvailableQuantity,
        UnitCost,
        TotalCost,
        LastTransactionDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_stock_reservations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_stock_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let mut table = Table::create();
            table
                .table(StockReservations::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(StockReservations::Id)
                        .uuid()
                        .primary_key()
                        .not_null(),
                );
            super::stocking_key_columns(
                &mut table,
                StockReservations::ItemType,
                StockReservations::ItemId,
                StockReservations::WarehouseId,
                StockReservations::WarehouseLocationId,
                StockReservations::BatchNumber,
                StockReservations::LotNumber,
            )
            .col(
                ColumnDef::new(StockReservations::ReservedQuantity)
                    .decimal()
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockReservations::FulfilledQuantity)
                    .decimal()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(StockReservations::ReferenceType)
                    .string_len(32)
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockReservations::ReferenceId)
                    .uuid()
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockReservations::Status)
                    .string_len(16)
                    .not_null()
                    .default("active"),
            )
            .col(
                ColumnDef::new(StockReservations::ExpiresAt)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(
                ColumnDef::new(StockReservations::CreatedBy)
                    .string()
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockReservations::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(StockReservations::UpdatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            );

            manager.create_table(table.to_owned()).await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_reference")
                        .table(StockReservations::Table)
                        .col(StockReservations::ReferenceType)
                        .col(StockReservations::ReferenceId)
                        .col(StockReservations::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_status_expires")
                        .table(StockReservations::Table)
                        .col(StockReservations::Status)
                        .col(StockReservations::ExpiresAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockReservations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockReservations {
        Table,
        Id,
        ItemType,
        ItemId,
        WarehouseId,
        WarehouseLocationId,
        BatchNumber,
        LotNumber,
        ReservedQuantity,
        FulfilledQuantity,
        ReferenceType,
        ReferenceId,
        Status,
        ExpiresAt,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_document_sequences_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_document_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::DocumentType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::Period)
                                .string_len(6)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .primary_key(
                            Index::create()
                                .col(DocumentSequences::DocumentType)
                                .col(DocumentSequences::Period),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DocumentSequences {
        Table,
        DocumentType,
        Period,
        LastValue,
    }
}

mod m20240101_000006_create_stock_document_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_stock_document_tables"
        }
    }

    fn audit_columns<T: Iden + 'static>(
        table: &mut TableCreateStatement,
        status: T,
        created_by: T,
        done_by: T,
        done_at: T,
        created_at: T,
        updated_at: T,
    ) -> &mut TableCreateStatement {
        table
            .col(ColumnDef::new(status).string_len(16).not_null())
            .col(ColumnDef::new(created_by).string().not_null())
            .col(ColumnDef::new(done_by).string().null())
            .col(ColumnDef::new(done_at).timestamp_with_time_zone().null())
            .col(
                ColumnDef::new(created_at)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(updated_at)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Goods receipt notes
            let mut grn = Table::create();
            grn.table(GoodsReceiptNotes::Table)
                .if_not_exists()
                .col(ColumnDef::new(GoodsReceiptNotes::Id).uuid().primary_key().not_null())
                .col(
                    ColumnDef::new(GoodsReceiptNotes::GrnNumber)
                        .string_len(32)
                        .not_null()
                        .unique_key(),
                )
                .col(ColumnDef::new(GoodsReceiptNotes::WarehouseId).uuid().not_null())
                .col(
                    ColumnDef::new(GoodsReceiptNotes::PurchaseOrderReference)
                        .string()
                        .null(),
                )
                .col(ColumnDef::new(GoodsReceiptNotes::ReceiptDate).date().not_null())
                .col(ColumnDef::new(GoodsReceiptNotes::Notes).text().null())
                .col(ColumnDef::new(GoodsReceiptNotes::QcCompletedBy).string().null())
                .col(
                    ColumnDef::new(GoodsReceiptNotes::QcCompletedAt)
                        .timestamp_with_time_zone()
                        .null(),
                );
            audit_columns(
                &mut grn,
                GoodsReceiptNotes::Status,
                GoodsReceiptNotes::CreatedBy,
                GoodsReceiptNotes::PostedBy,
                GoodsReceiptNotes::PostedAt,
                GoodsReceiptNotes::CreatedAt,
                GoodsReceiptNotes::UpdatedAt,
            );
            manager.create_table(grn.to_owned()).await?;

            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceiptNoteItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::GoodsReceiptNoteId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::WarehouseLocationId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::BatchNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::LotNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(ColumnDef::new(GoodsReceiptNoteItems::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::ReceivedQuantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::AcceptedQuantity)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::RejectedQuantity)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptNoteItems::UnitCost)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_grn_items_grn")
                                .from(
                                    GoodsReceiptNoteItems::Table,
                                    GoodsReceiptNoteItems::GoodsReceiptNoteId,
                                )
                                .to(GoodsReceiptNotes::Table, GoodsReceiptNotes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Material issue notes
            let mut min = Table::create();
            min.table(MaterialIssueNotes::Table)
                .if_not_exists()
                .col(ColumnDef::new(MaterialIssueNotes::Id).uuid().primary_key().not_null())
                .col(
                    ColumnDef::new(MaterialIssueNotes::MinNumber)
                        .string_len(32)
                        .not_null()
                        .unique_key(),
                )
                .col(ColumnDef::new(MaterialIssueNotes::WarehouseId).uuid().not_null())
                .col(ColumnDef::new(MaterialIssueNotes::MaterialRequestId).uuid().null())
                .col(ColumnDef::new(MaterialIssueNotes::Department).string().null())
                .col(ColumnDef::new(MaterialIssueNotes::IssueDate).date().not_null());
            audit_columns(
                &mut min,
                MaterialIssueNotes::Status,
                MaterialIssueNotes::CreatedBy,
                MaterialIssueNotes::PostedBy,
                MaterialIssueNotes::PostedAt,
                MaterialIssueNotes::CreatedAt,
                MaterialIssueNotes::UpdatedAt,
            );
            manager.create_table(min.to_owned()).await?;

            manager
                .create_table(
                    Table::create()
                        .table(MaterialIssueNoteItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialIssueNoteItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialIssueNoteItems::MaterialIssueNoteId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialIssueNoteItems::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialIssueNoteItems::WarehouseLocationId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialIssueNoteItems::BatchNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialIssueNoteItems::LotNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialIssueNoteItems::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_min_items_min")
                                .from(
                                    MaterialIssueNoteItems::Table,
                                    MaterialIssueNoteItems::MaterialIssueNoteId,
                                )
                                .to(MaterialIssueNotes::Table, MaterialIssueNotes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Stock adjustments
            let mut adjustment = Table::create();
            adjustment
                .table(StockAdjustments::Table)
                .if_not_exists()
                .col(ColumnDef::new(StockAdjustments::Id).uuid().primary_key().not_null())
                .col(
                    ColumnDef::new(StockAdjustments::AdjustmentNumber)
                        .string_len(32)
                        .not_null()
                        .unique_key(),
                )
                .col(ColumnDef::new(StockAdjustments::WarehouseId).uuid().not_null())
                .col(ColumnDef::new(StockAdjustments::AdjustmentDate).date().not_null())
                .col(ColumnDef::new(StockAdjustments::Reason).string().not_null());
            audit_columns(
                &mut adjustment,
                StockAdjustments::Status,
                StockAdjustments::CreatedBy,
                StockAdjustments::PostedBy,
                StockAdjustments::PostedAt,
                StockAdjustments::CreatedAt,
                StockAdjustments::UpdatedAt,
            );
            manager.create_table(adjustment.to_owned()).await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockAdjustmentItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAdjustmentItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustmentItems::StockAdjustmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustmentItems::ItemType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustmentItems::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAdjustmentItems::WarehouseLocationId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustmentItems::BatchNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustmentItems::LotNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(ColumnDef::new(StockAdjustmentItems::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(StockAdjustmentItems::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustmentItems::UnitCost)
                                .decimal()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_adjustment_items_adjustment")
                                .from(
                                    StockAdjustmentItems::Table,
                                    StockAdjustmentItems::StockAdjustmentId,
                                )
                                .to(StockAdjustments::Table, StockAdjustments::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Stock transfers
            let mut transfer = Table::create();
            transfer
                .table(StockTransfers::Table)
                .if_not_exists()
                .col(ColumnDef::new(StockTransfers::Id).uuid().primary_key().not_null())
                .col(
                    ColumnDef::new(StockTransfers::TransferNumber)
                        .string_len(32)
                        .not_null()
                        .unique_key(),
                )
                .col(ColumnDef::new(StockTransfers::FromWarehouseId).uuid().not_null())
                .col(ColumnDef::new(StockTransfers::ToWarehouseId).uuid().not_null())
                .col(ColumnDef::new(StockTransfers::TransferDate).date().not_null());
            audit_columns(
                &mut transfer,
                StockTransfers::Status,
                StockTransfers::CreatedBy,
                StockTransfers::PostedBy,
                StockTransfers::PostedAt,
                StockTransfers::CreatedAt,
                StockTransfers::UpdatedAt,
            );
            manager.create_table(transfer.to_owned()).await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTransferItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransferItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::StockTransferId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::ItemType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransferItems::ItemId).uuid().not_null())
                        .col(ColumnDef::new(StockTransferItems::FromLocationId).uuid().null())
                        .col(ColumnDef::new(StockTransferItems::ToLocationId).uuid().null())
                        .col(
                            ColumnDef::new(StockTransferItems::BatchNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::LotNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_items_transfer")
                                .from(
                                    StockTransferItems::Table,
                                    StockTransferItems::StockTransferId,
                                )
                                .to(StockTransfers::Table, StockTransfers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Delivery orders
            let mut delivery = Table::create();
            delivery
                .table(DeliveryOrders::Table)
                .if_not_exists()
                .col(ColumnDef::new(DeliveryOrders::Id).uuid().primary_key().not_null())
                .col(
                    ColumnDef::new(DeliveryOrders::DeliveryNumber)
                        .string_len(32)
                        .not_null()
                        .unique_key(),
                )
                .col(ColumnDef::new(DeliveryOrders::WarehouseId).uuid().not_null())
                .col(ColumnDef::new(DeliveryOrders::SalesOrderId).uuid().null())
                .col(ColumnDef::new(DeliveryOrders::CustomerReference).string().null())
                .col(ColumnDef::new(DeliveryOrders::DeliveryDate).date().not_null());
            audit_columns(
                &mut delivery,
                DeliveryOrders::Status,
                DeliveryOrders::CreatedBy,
                DeliveryOrders::ShippedBy,
                DeliveryOrders::ShippedAt,
                DeliveryOrders::CreatedAt,
                DeliveryOrders::UpdatedAt,
            );
            manager.create_table(delivery.to_owned()).await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryOrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderItems::DeliveryOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderItems::FinishedProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderItems::WarehouseLocationId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderItems::BatchNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderItems::LotNumber)
                                .string_len(64)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderItems::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_items_delivery")
                                .from(
                                    DeliveryOrderItems::Table,
                                    DeliveryOrderItems::DeliveryOrderId,
                                )
                                .to(DeliveryOrders::Table, DeliveryOrders::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockTransferItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockTransfers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockAdjustmentItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockAdjustments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialIssueNoteItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialIssueNotes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(GoodsReceiptNoteItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(GoodsReceiptNotes::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum GoodsReceiptNotes {
        Table,
        Id,
        GrnNumber,
        WarehouseId,
        PurchaseOrderReference,
        ReceiptDate,
        Status,
        Notes,
        CreatedBy,
        QcCompletedBy,
        QcCompletedAt,
        PostedBy,
        PostedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum GoodsReceiptNoteItems {
        Table,
        Id,
        GoodsReceiptNoteId,
        MaterialId,
        WarehouseLocationId,
        BatchNumber,
        LotNumber,
        ExpiryDate,
        ReceivedQuantity,
        AcceptedQuantity,
        RejectedQuantity,
        UnitCost,
    }

    #[derive(DeriveIden)]
    enum MaterialIssueNotes {
        Table,
        Id,
        MinNumber,
        WarehouseId,
        MaterialRequestId,
        Department,
        IssueDate,
        Status,
        CreatedBy,
        PostedBy,
        PostedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum MaterialIssueNoteItems {
        Table,
        Id,
        MaterialIssueNoteId,
        MaterialId,
        WarehouseLocationId,
        BatchNumber,
        LotNumber,
        Quantity,
    }

    #[derive(DeriveIden)]
    enum StockAdjustments {
        Table,
        Id,
        AdjustmentNumber,
        WarehouseId,
        AdjustmentDate,
        Reason,
        Status,
        CreatedBy,
        PostedBy,
        PostedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockAdjustmentItems {
        Table,
        Id,
        StockAdjustmentId,
        ItemType,
        ItemId,
        WarehouseLocationId,
        BatchNumber,
        LotNumber,
        ExpiryDate,
        Quantity,
        UnitCost,
    }

    #[derive(DeriveIden)]
    enum StockTransfers {
        Table,
        Id,
        TransferNumber,
        FromWarehouseId,
        ToWarehouseId,
        TransferDate,
        Status,
        CreatedBy,
        PostedBy,
        PostedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockTransferItems {
        Table,
        Id,
        StockTransferId,
        ItemType,
        ItemId,
        FromLocationId,
        ToLocationId,
        BatchNumber,
        LotNumber,
        Quantity,
    }

    #[derive(DeriveIden)]
    enum DeliveryOrders {
        Table,
        Id,
        DeliveryNumber,
        WarehouseId,
        SalesOrderId,
        CustomerReference,
        DeliveryDate,
        Status,
        CreatedBy,
        ShippedBy,
        ShippedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryOrderItems {
        Table,
        Id,
        DeliveryOrderId,
        FinishedProductId,
        WarehouseLocationId,
        BatchNumber,
        LotNumber,
        Quantity,
    }
}
