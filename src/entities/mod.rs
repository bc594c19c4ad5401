// Stock engine
pub mod stock_balance;
pub mod stock_ledger;
pub mod stock_reservation;

// Master data (read-only lookups)
pub mod finished_product;
pub mod material;
pub mod warehouse;
pub mod warehouse_location;

// Stock documents
pub mod delivery_order;
pub mod delivery_order_item;
pub mod goods_receipt_note;
pub mod goods_receipt_note_item;
pub mod material_issue_note;
pub mod material_issue_note_item;
pub mod stock_adjustment;
pub mod stock_adjustment_item;
pub mod stock_transfer;
pub mod stock_transfer_item;

pub mod document_sequence;
