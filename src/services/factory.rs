use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        delivery_order::DeliveryOrderService, goods_receipt::GoodsReceiptService,
        material_issue::MaterialIssueService, reservations::ReservationService,
        stock_adjustment::StockAdjustmentService, stock_transfer::StockTransferService,
        DEFAULT_LOCK_TIMEOUT,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
    lock_timeout: Duration,
    reservation_ttl: Option<chrono::Duration>,
}

impl ServiceFactory {
    /// Creates a new service factory with default timeouts
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            reservation_ttl: None,
        }
    }

    /// Creates a factory whose services use the configured lock budget and
    /// reservation lifetime
    pub fn from_config(
        db_pool: Arc<DbPool>,
        event_sender: Option<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            lock_timeout: config.lock_timeout(),
            reservation_ttl: config.reservation_ttl(),
        }
    }

    pub fn goods_receipt_service(&self) -> GoodsReceiptService {
        GoodsReceiptService::new(self.db_pool.clone(), self.event_sender.clone())
            .with_lock_timeout(self.lock_timeout)
    }

    pub fn material_issue_service(&self) -> MaterialIssueService {
        MaterialIssueService::new(self.db_pool.clone(), self.event_sender.clone())
            .with_lock_timeout(self.lock_timeout)
    }

    pub fn stock_adjustment_service(&self) -> StockAdjustmentService {
        StockAdjustmentService::new(self.db_pool.clone(), self.event_sender.clone())
            .with_lock_timeout(self.lock_timeout)
    }

    pub fn stock_transfer_service(&self) -> StockTransferService {
        StockTransferService::new(self.db_pool.clone(), self.event_sender.clone())
            .with_lock_timeout(self.lock_timeout)
    }

    pub fn delivery_order_service(&self) -> DeliveryOrderService {
        DeliveryOrderService::new(self.db_pool.clone(), self.event_sender.clone())
            .with_lock_timeout(self.lock_timeout)
    }

    pub fn reservation_service(&self) -> ReservationService {
        ReservationService::new(self.db_pool.clone(), self.event_sender.clone())
            .with_lock_timeout(self.lock_timeout)
            .with_default_ttl(self.reservation_ttl)
    }

    /// Gets a reference to the database pool
    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }

    /// Gets a reference to the event sender
    pub fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub goods_receipts: Arc<GoodsReceiptService>,
    pub material_issues: Arc<MaterialIssueService>,
    pub stock_adjustments: Arc<StockAdjustmentService>,
    pub stock_transfers: Arc<StockTransferService>,
    pub delivery_orders: Arc<DeliveryOrderService>,
    pub reservations: Arc<ReservationService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            goods_receipts: Arc::new(factory.goods_receipt_service()),
            material_issues: Arc::new(factory.material_issue_service()),
            stock_adjustments: Arc::new(factory.stock_adjustment_service()),
            stock_transfers: Arc::new(factory.stock_transfer_service()),
            delivery_orders: Arc::new(factory.delivery_order_service()),
            reservations: Arc::new(factory.reservation_service()),
        }
    }
}
