use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Caller, CreateEntryCmd, Engine, EngineError, EntryItemInput, EntryKind, EntryListFilter,
    NewProductCmd, UpdateEntryCmd,
};
use migration::MigratorTrait;

async fn engine() -> Engine {
    let (engine, _db) = engine_with_db().await;
    engine
}

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Make every balance write fail, so the compensation paths can be observed.
async fn freeze_balances(db: &DatabaseConnection) {
    db.execute_unprepared(
        "CREATE TRIGGER balances_frozen BEFORE UPDATE OF closing_balance ON accounts \
         BEGIN SELECT RAISE(ABORT, 'balances frozen'); END",
    )
    .await
    .unwrap();
}

fn alice() -> Caller {
    Caller::new("alice").group("warung")
}

#[tokio::test]
async fn creates_inflow_with_items() {
    let engine = engine().await;
    let caller = alice();
    let product = engine
        .new_product(&caller, NewProductCmd::new("Beras"))
        .await
        .unwrap();

    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(120_000, Utc::now())
                .description("penjualan beras")
                .item(EntryItemInput::with_subtotal(product.id, 2, 120_000)),
        )
        .await
        .unwrap();

    assert_eq!(entry.kind, EntryKind::Inflow);
    assert_eq!(entry.debit, 120_000);
    assert_eq!(entry.credit, 0);

    let (stored, items) = engine.entry(&caller, entry.id).await.unwrap();
    assert_eq!(stored, entry);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].subtotal, 120_000);
    assert_eq!(items[0].product_id, product.id);
}

#[tokio::test]
async fn rejects_mismatched_item_sum_without_mutation() {
    let engine = engine().await;
    let caller = alice();
    let product = engine
        .new_product(&caller, NewProductCmd::new("Gula"))
        .await
        .unwrap();

    let err = engine
        .create_entry(
            &caller,
            CreateEntryCmd::outflow(50_000, Utc::now())
                .item(EntryItemInput::with_subtotal(product.id, 1, 40_000)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let entries = engine
        .list_entries(&caller, EntryListFilter::default())
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn rejects_amounts_that_violate_the_kind() {
    let engine = engine().await;
    let caller = alice();

    let mut cmd = CreateEntryCmd::inflow(0, Utc::now());
    cmd.credit = 50_000;
    assert!(matches!(
        engine.create_entry(&caller, cmd).await,
        Err(EngineError::Validation(_))
    ));

    let both = CreateEntryCmd::new(EntryKind::Inflow, 100, 100, Utc::now());
    assert!(matches!(
        engine.create_entry(&caller, both).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn balance_follows_entry_lifecycle() {
    let engine = engine().await;
    let caller = alice();
    let account = engine
        .new_account(&caller, "Kas Toko", 500_000, false)
        .await
        .unwrap();
    assert_eq!(account.closing_balance, 500_000);

    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(100_000, Utc::now()).account_id(account.id),
        )
        .await
        .unwrap();
    assert_eq!(
        engine.account(&caller, account.id).await.unwrap().closing_balance,
        600_000
    );

    engine.delete_entry(&caller, entry.id).await.unwrap();
    assert_eq!(
        engine.account(&caller, account.id).await.unwrap().closing_balance,
        500_000
    );
}

#[tokio::test]
async fn outflow_decreases_the_balance() {
    let engine = engine().await;
    let caller = alice();
    let account = engine
        .new_account(&caller, "Kas Kecil", 200_000, false)
        .await
        .unwrap();

    engine
        .create_entry(
            &caller,
            CreateEntryCmd::outflow(50_000, Utc::now()).account_id(account.id),
        )
        .await
        .unwrap();

    assert_eq!(
        engine.account(&caller, account.id).await.unwrap().closing_balance,
        150_000
    );
}

#[tokio::test]
async fn update_reattributes_balances_across_accounts() {
    let engine = engine().await;
    let caller = alice();
    let first = engine
        .new_account(&caller, "Kas", 1_000_000, false)
        .await
        .unwrap();
    let second = engine
        .new_account(&caller, "Bank", 0, false)
        .await
        .unwrap();

    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(100_000, Utc::now()).account_id(first.id),
        )
        .await
        .unwrap();
    assert_eq!(
        engine.account(&caller, first.id).await.unwrap().closing_balance,
        1_100_000
    );

    let updated = engine
        .update_entry(
            &caller,
            UpdateEntryCmd::new(entry.id)
                .debit(200_000)
                .account_id(second.id),
        )
        .await
        .unwrap();
    assert_eq!(updated.account_id, Some(second.id));
    assert_eq!(updated.debit, 200_000);

    assert_eq!(
        engine.account(&caller, first.id).await.unwrap().closing_balance,
        1_000_000
    );
    assert_eq!(
        engine.account(&caller, second.id).await.unwrap().closing_balance,
        200_000
    );
}

#[tokio::test]
async fn failed_balance_sync_rolls_back_a_created_entry() {
    let (engine, db) = engine_with_db().await;
    let caller = alice();
    let account = engine
        .new_account(&caller, "Kas", 500_000, false)
        .await
        .unwrap();
    let product = engine
        .new_product(&caller, NewProductCmd::new("Beras"))
        .await
        .unwrap();
    freeze_balances(&db).await;

    let err = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(120_000, Utc::now())
                .account_id(account.id)
                .item(EntryItemInput::with_subtotal(product.id, 1, 120_000)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)));

    // Neither the header nor its items survive the failed balance step.
    assert!(engine
        .list_entries(&caller, EntryListFilter::default())
        .await
        .unwrap()
        .is_empty());
    let items = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            "SELECT id FROM entry_items",
        ))
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(
        engine.account(&caller, account.id).await.unwrap().closing_balance,
        500_000
    );
}

#[tokio::test]
async fn failed_balance_sync_restores_an_updated_entry() {
    let (engine, db) = engine_with_db().await;
    let caller = alice();
    let account = engine
        .new_account(&caller, "Kas", 0, false)
        .await
        .unwrap();
    let product = engine
        .new_product(&caller, NewProductCmd::new("Beras"))
        .await
        .unwrap();
    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(120_000, Utc::now())
                .account_id(account.id)
                .item(EntryItemInput::with_subtotal(product.id, 1, 120_000)),
        )
        .await
        .unwrap();
    freeze_balances(&db).await;

    let err = engine
        .update_entry(
            &caller,
            UpdateEntryCmd::new(entry.id)
                .debit(200_000)
                .items(vec![EntryItemInput::with_subtotal(product.id, 2, 200_000)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)));

    // Header and items are back to their pre-update state.
    let (stored, items) = engine.entry(&caller, entry.id).await.unwrap();
    assert_eq!(stored.debit, 120_000);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].subtotal, 120_000);
    assert_eq!(items[0].quantity, 1);
    assert_eq!(
        engine.account(&caller, account.id).await.unwrap().closing_balance,
        120_000
    );
}

#[tokio::test]
async fn balance_overflow_surfaces_a_consistency_error() {
    let engine = engine().await;
    let caller = alice();
    let account = engine
        .new_account(&caller, "Kas", i64::MAX, false)
        .await
        .unwrap();

    let err = engine.apply_delta(account.id, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::Consistency(_)));
    assert_eq!(
        engine.account(&caller, account.id).await.unwrap().closing_balance,
        i64::MAX
    );
}

#[tokio::test]
async fn amount_change_must_adjust_existing_items() {
    let engine = engine().await;
    let caller = alice();
    let product = engine
        .new_product(&caller, NewProductCmd::new("Kopi"))
        .await
        .unwrap();
    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(120_000, Utc::now())
                .item(EntryItemInput::with_subtotal(product.id, 1, 120_000)),
        )
        .await
        .unwrap();

    let err = engine
        .update_entry(&caller, UpdateEntryCmd::new(entry.id).debit(150_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Supplying matching items makes the same change valid.
    let updated = engine
        .update_entry(
            &caller,
            UpdateEntryCmd::new(entry.id)
                .debit(150_000)
                .items(vec![EntryItemInput::with_subtotal(product.id, 1, 150_000)]),
        )
        .await
        .unwrap();
    assert_eq!(updated.debit, 150_000);

    let (_, items) = engine.entry(&caller, entry.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].subtotal, 150_000);
}

#[tokio::test]
async fn unit_price_items_freeze_their_subtotal() {
    let engine = engine().await;
    let caller = alice();
    let product = engine
        .new_product(&caller, NewProductCmd::new("Teh"))
        .await
        .unwrap();

    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(30_000, Utc::now())
                .item(EntryItemInput::with_unit_price(product.id, 3, 10_000)),
        )
        .await
        .unwrap();

    let (_, items) = engine.entry(&caller, entry.id).await.unwrap();
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].subtotal, 30_000);
}

#[tokio::test]
async fn only_the_owner_may_mutate_an_entry() {
    let engine = engine().await;
    let caller = alice();
    let entry = engine
        .create_entry(&caller, CreateEntryCmd::inflow(10_000, Utc::now()))
        .await
        .unwrap();

    let bob = Caller::new("bob");
    assert!(matches!(
        engine
            .update_entry(&bob, UpdateEntryCmd::new(entry.id).debit(20_000))
            .await,
        Err(EngineError::Unauthorized(_))
    ));
    assert!(matches!(
        engine.delete_entry(&bob, entry.id).await,
        Err(EngineError::Unauthorized(_))
    ));

    // A privileged caller may.
    let admin = Caller::new("admin").privileged();
    engine.delete_entry(&admin, entry.id).await.unwrap();
}

#[tokio::test]
async fn shared_entries_are_visible_to_group_mates() {
    let engine = engine().await;
    let caller = alice();
    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(10_000, Utc::now()).share_to_group(),
        )
        .await
        .unwrap();
    assert_eq!(entry.group_id.as_deref(), Some("warung"));

    let mate = Caller::new("bob").group("warung");
    let (visible, _) = engine.entry(&mate, entry.id).await.unwrap();
    assert_eq!(visible.id, entry.id);

    let stranger = Caller::new("carol").group("toko");
    assert!(matches!(
        engine.entry(&stranger, entry.id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_filters_by_kind_and_account() {
    let engine = engine().await;
    let caller = alice();
    let account = engine
        .new_account(&caller, "Kas", 0, false)
        .await
        .unwrap();

    engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(10_000, Utc::now()).account_id(account.id),
        )
        .await
        .unwrap();
    engine
        .create_entry(&caller, CreateEntryCmd::outflow(5_000, Utc::now()))
        .await
        .unwrap();

    let inflows = engine
        .list_entries(&caller, EntryListFilter::default().kind(EntryKind::Inflow))
        .await
        .unwrap();
    assert_eq!(inflows.len(), 1);
    assert_eq!(inflows[0].kind, EntryKind::Inflow);

    let by_account = engine
        .list_entries(&caller, EntryListFilter::default().account_id(account.id))
        .await
        .unwrap();
    assert_eq!(by_account.len(), 1);
    assert_eq!(by_account[0].account_id, Some(account.id));
}

#[tokio::test]
async fn account_deletion_is_blocked_while_referenced() {
    let engine = engine().await;
    let caller = alice();
    let account = engine
        .new_account(&caller, "Kas", 0, false)
        .await
        .unwrap();
    let entry = engine
        .create_entry(
            &caller,
            CreateEntryCmd::inflow(10_000, Utc::now()).account_id(account.id),
        )
        .await
        .unwrap();

    assert!(matches!(
        engine.delete_account(&caller, account.id).await,
        Err(EngineError::Conflict(_))
    ));

    engine.delete_entry(&caller, entry.id).await.unwrap();
    engine.delete_account(&caller, account.id).await.unwrap();
}
