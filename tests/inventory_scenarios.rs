use opensase_inventory::services::{OrderItemsPlaced, OrderStatusChanged};
use opensase_inventory::{
    Actor, InventoryError, InventoryQueryService, InventoryStore, MemoryStore, MovementFilter, MovementType, NewProduct,
    NoopSink, OrderEventHandler, OrderId, OrderLine, OrderStatus, OrderStockOutcome, PageRequest, ProductId, ProductStatus,
    Reference, ReferenceType, StockMutator,
};
use std::sync::Arc;
use std::time::Duration;

struct Shop {
    store: Arc<MemoryStore>,
    mutator: Arc<StockMutator>,
    orders: OrderEventHandler,
    queries: InventoryQueryService,
}

fn shop() -> Shop {
    let store = Arc::new(MemoryStore::new());
    let mutator = Arc::new(StockMutator::new(store.clone(), Arc::new(NoopSink), Duration::from_secs(2), 5));
    Shop { orders: OrderEventHandler::new(mutator.clone()), queries: InventoryQueryService::new(store.clone()), store, mutator }
}

impl Shop {
    async fn product(&self, name: &str, stock: i64, threshold: i64) -> ProductId {
        let product_id = ProductId::new();
        self.mutator.register_product(NewProduct {
            product_id, sku: name.to_uppercase(), name: name.into(), status: ProductStatus::Active, stock_alert_threshold: Some(threshold),
        }).await.unwrap();
        if stock > 0 {
            self.mutator.add(product_id, stock, Reference::manual(), Actor::admin("seed")).await.unwrap();
        }
        product_id
    }

    async fn stock(&self, p: ProductId) -> i64 {
        self.store.stock_record(p).await.unwrap().unwrap().stock
    }

    async fn pay(&self, order: &str, items: Vec<OrderLine>) -> Result<OrderStockOutcome, InventoryError> {
        self.orders.on_status_changed(&OrderStatusChanged { order_id: OrderId::new(order), from: OrderStatus::Pending, to: OrderStatus::Paid, items }).await
    }

    async fn alert_ids(&self) -> Vec<ProductId> {
        self.queries.low_stock_alerts().await.unwrap().iter().map(|r| r.product_id).collect()
    }
}

#[tokio::test]
async fn paid_orders_deduct_and_cancellation_restores() {
    let shop = shop();
    let p = shop.product("Kettle", 10, 5).await;

    shop.pay("O1", vec![OrderLine::new(p, 3)]).await.unwrap();
    assert_eq!(shop.stock(p).await, 7);
    assert!(shop.alert_ids().await.is_empty());

    shop.pay("O2", vec![OrderLine::new(p, 4)]).await.unwrap();
    assert_eq!(shop.stock(p).await, 3);
    assert_eq!(shop.alert_ids().await, vec![p]);

    let cancel = OrderStatusChanged { order_id: OrderId::new("O2"), from: OrderStatus::Paid, to: OrderStatus::Cancelled, items: vec![OrderLine::new(p, 4)] };
    assert!(matches!(shop.orders.on_status_changed(&cancel).await.unwrap(), OrderStockOutcome::Restored(_)));
    assert_eq!(shop.stock(p).await, 7);
    assert!(shop.alert_ids().await.is_empty());

    let latest = shop.store.latest_entry(p).await.unwrap().unwrap();
    assert_eq!(latest.movement_type, MovementType::In);
    assert_eq!((latest.stock_before, latest.stock_after), (3, 7));
    assert_eq!(latest.reference_type, Some(ReferenceType::OrderCancel));
    assert_eq!(latest.reference_id.as_deref(), Some("O2"));
    assert_eq!(latest.created_by, Actor::System);
}

#[tokio::test]
async fn manual_adjustment_records_signed_delta() {
    let shop = shop();
    let p = shop.product("Teapot", 7, 5).await;

    let change = shop.mutator.adjust(p, 0, "damaged goods", Actor::admin("u-17")).await.unwrap();
    assert_eq!((change.stock_before, change.stock_after), (7, 0));

    let entry = shop.store.latest_entry(p).await.unwrap().unwrap();
    assert_eq!(entry.movement_type, MovementType::Adjust);
    assert_eq!(entry.quantity, -7);
    assert_eq!(entry.reason.as_deref(), Some("damaged goods"));
    assert_eq!(entry.created_by, Actor::admin("u-17"));

    let err = shop.mutator.adjust(p, 3, "   ", Actor::admin("u-17")).await.unwrap_err();
    assert_eq!(err, InventoryError::MissingReason);
    assert_eq!(shop.stock(p).await, 0);
}

#[tokio::test]
async fn oversized_deduction_leaves_no_trace() {
    let shop = shop();
    let p = shop.product("Cup", 10, 5).await;
    let before = shop.store.ledger_len();

    let err = shop.mutator.deduct(p, 100, Reference::manual(), Actor::System).await.unwrap_err();
    assert_eq!(err, InventoryError::insufficient(p, 100, 10));
    assert_eq!(shop.stock(p).await, 10);
    assert_eq!(shop.store.ledger_len(), before);
}

#[tokio::test]
async fn order_with_one_short_item_changes_nothing() {
    let shop = shop();
    let p1 = shop.product("Saucer", 10, 5).await;
    let p2 = shop.product("Spoon", 1, 5).await;
    let before = shop.store.ledger_len();

    let placed = OrderItemsPlaced {
        order_id: OrderId::new("O9"), status: OrderStatus::Paid,
        items: vec![OrderLine::new(p1, 2), OrderLine::new(p2, 3)],
    };
    match shop.orders.on_items_placed(&placed).await.unwrap_err() {
        InventoryError::InsufficientStock { shortages } => {
            assert_eq!(shortages.len(), 1);
            assert_eq!((shortages[0].product_id, shortages[0].requested, shortages[0].available), (p2, 3, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(shop.stock(p1).await, 10);
    assert_eq!(shop.stock(p2).await, 1);
    assert_eq!(shop.store.ledger_len(), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deductions_never_oversell() {
    let shop = shop();
    let p = shop.product("Last One", 1, 0).await;

    let handles: Vec<_> = (0..16).map(|i| {
        let mutator = shop.mutator.clone();
        tokio::spawn(async move {
            mutator.deduct(p, 1, Reference::order(&OrderId::new(format!("C{i}"))), Actor::System).await
        })
    }).collect();

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(err) => assert!(matches!(err, InventoryError::InsufficientStock { .. }), "unexpected error: {err}"),
        }
    }
    assert_eq!(sold, 1);
    assert_eq!(shop.stock(p).await, 0);
}

#[tokio::test]
async fn deduct_then_restore_round_trips() {
    let shop = shop();
    let p = shop.product("Tray", 12, 5).await;
    let order = OrderId::new("O3");
    shop.mutator.deduct(p, 5, Reference::order(&order), Actor::System).await.unwrap();
    shop.mutator.add(p, 5, Reference::order_cancel(&order), Actor::System).await.unwrap();
    assert_eq!(shop.stock(p).await, 12);
}

#[tokio::test]
async fn ledger_chain_matches_counter() {
    let shop = shop();
    let p = shop.product("Jug", 20, 5).await;

    shop.mutator.deduct(p, 4, Reference::manual(), Actor::System).await.unwrap();
    shop.mutator.add(p, 9, Reference::manual(), Actor::admin("ops")).await.unwrap();
    shop.mutator.adjust(p, 11, "cycle count", Actor::admin("ops")).await.unwrap();
    shop.mutator.deduct(p, 11, Reference::manual(), Actor::System).await.unwrap();
    assert!(shop.mutator.deduct(p, 1, Reference::manual(), Actor::System).await.is_err());
    shop.mutator.add(p, 2, Reference::manual(), Actor::admin("ops")).await.unwrap();

    let page = shop.queries.movement_log(&MovementFilter::for_product(p), PageRequest::new(Some(1), Some(100))).await.unwrap();
    let mut entries: Vec<_> = page.data.into_iter().map(|row| row.entry).collect();
    entries.reverse();
    assert_eq!(entries.len(), 6);

    let mut stock = 0;
    for entry in &entries {
        assert_eq!(entry.stock_before, stock);
        assert_eq!(entry.stock_after, entry.stock_before + entry.quantity);
        assert!(entry.stock_after >= 0);
        stock = entry.stock_after;
    }
    assert_eq!(stock, shop.stock(p).await);
    assert_eq!(stock, 2);
    assert!(shop.queries.audit_product(p).await.unwrap().consistent);
}
