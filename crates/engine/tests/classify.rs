use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Bucket, Caller, CategoryKind, Engine, EngineError, NewCategoryCmd, NewProductCmd, RuleScope,
    Scope,
};
use migration::MigratorTrait;

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

fn alice() -> Caller {
    Caller::new("alice").group("warung")
}

#[tokio::test]
async fn sequence_codes_start_at_the_range_minimum() {
    let (engine, _db) = engine_with_db().await;
    let caller = alice();

    let kas = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Kas", CategoryKind::Inflow).subgroup(Bucket::AssetCurrent),
        )
        .await
        .unwrap();
    assert_eq!(kas.sequence_code, Some(0));

    let piutang = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Piutang", CategoryKind::Inflow).subgroup(Bucket::AssetCurrent),
        )
        .await
        .unwrap();
    assert_eq!(piutang.sequence_code, Some(1));

    // Each bucket allocates independently inside its own range.
    let hutang = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Hutang Bank", CategoryKind::Outflow)
                .subgroup(Bucket::LiabilityLongterm),
        )
        .await
        .unwrap();
    assert_eq!(hutang.sequence_code, Some(4_500));
}

#[tokio::test]
async fn resolve_returns_the_existing_category() {
    let (engine, _db) = engine_with_db().await;
    let caller = alice();

    let first = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Penjualan", CategoryKind::Inflow).subgroup(Bucket::AssetCurrent),
        )
        .await
        .unwrap();
    // Same name up to case and whitespace resolves instead of creating.
    let second = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("  penjualan ", CategoryKind::Inflow)
                .subgroup(Bucket::AssetCurrent),
        )
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(engine.list_categories(&caller).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rules_classify_new_categories() {
    let (engine, _db) = engine_with_db().await;
    let admin = Caller::new("admin").privileged();
    engine
        .new_rule(&admin, "mesin", Bucket::AssetFixed, 10, RuleScope::Global)
        .await
        .unwrap();

    let caller = alice();
    let category = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Mesin Jahit", CategoryKind::Outflow),
        )
        .await
        .unwrap();
    assert_eq!(category.bucket(), Some(Bucket::AssetFixed));
    assert_eq!(category.sequence_code, Some(2_600));
}

#[tokio::test]
async fn product_creation_classifies_through_its_name() {
    let (engine, _db) = engine_with_db().await;
    let admin = Caller::new("admin").privileged();
    engine
        .new_rule(&admin, "etalase", Bucket::AssetFixed, 10, RuleScope::Global)
        .await
        .unwrap();

    let caller = alice();
    // The category name alone matches nothing; the product name does.
    let product = engine
        .new_product(
            &caller,
            NewProductCmd::new("Etalase Kaca").category_name("Peralatan"),
        )
        .await
        .unwrap();

    let category = engine
        .list_categories(&caller)
        .await
        .unwrap()
        .into_iter()
        .find(|c| Some(c.id) == product.category_id)
        .unwrap();
    assert_eq!(category.bucket(), Some(Bucket::AssetFixed));
}

#[tokio::test]
async fn unmatched_bookkeeping_category_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let caller = alice();

    let err = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Misterius", CategoryKind::Outflow),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Product/market categories skip classification entirely.
    let market = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Pasar Senin", CategoryKind::Market),
        )
        .await
        .unwrap();
    assert_eq!(market.sequence_code, None);
    assert_eq!(market.bucket(), None);
}

#[tokio::test]
async fn allocation_refuses_to_leave_the_range() {
    let (engine, db) = engine_with_db().await;
    let caller = Caller::new("alice");

    // Occupy the last asset_fixed slot directly.
    let id = uuid::Uuid::new_v4();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO categories (id, name, name_key, kind, subgroup, sequence_code, user_id, group_id, scope_key) \
         VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?)",
        vec![
            id.as_bytes().to_vec().into(),
            "Gudang".into(),
            "gudang".into(),
            "outflow".into(),
            "asset_fixed".into(),
            3_599.into(),
            "alice".into(),
            "user:alice".into(),
        ],
    ))
    .await
    .unwrap();

    let err = engine
        .next_sequence_code(&Scope::User("alice".to_string()), Bucket::AssetFixed)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RangeExhausted(_)));

    // Other buckets are unaffected.
    let next = engine
        .next_sequence_code(&Scope::User("alice".to_string()), Bucket::AssetCurrent)
        .await
        .unwrap();
    assert_eq!(next, 0);
}

#[tokio::test]
async fn duplicate_name_race_resolves_to_the_winning_row() {
    let (engine, db) = engine_with_db().await;
    let caller = Caller::new("alice");

    // Simulate a rival writer landing the same name between the lookup and
    // the insert: the trigger plants the rival row, then fails the original
    // insert with a unique violation. RAISE(FAIL) keeps the planted row.
    let rival = uuid::Uuid::new_v4();
    db.execute_unprepared("CREATE TABLE rival_once (fired INTEGER NOT NULL)")
        .await
        .unwrap();
    db.execute_unprepared("INSERT INTO rival_once VALUES (0)")
        .await
        .unwrap();
    db.execute_unprepared(&format!(
        "CREATE TRIGGER categories_rival BEFORE INSERT ON categories \
         WHEN (SELECT fired FROM rival_once) = 0 \
         BEGIN \
           UPDATE rival_once SET fired = 1; \
           INSERT INTO categories \
             (id, name, name_key, kind, subgroup, sequence_code, user_id, group_id, scope_key) \
           VALUES \
             (X'{}', 'Kas', 'kas', 'inflow', 'asset_current', 0, 'alice', NULL, 'user:alice'); \
           SELECT RAISE(FAIL, 'UNIQUE constraint failed: categories.scope_key, categories.name_key'); \
         END",
        rival.simple()
    ))
    .await
    .unwrap();

    let category = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Kas", CategoryKind::Inflow).subgroup(Bucket::AssetCurrent),
        )
        .await
        .unwrap();

    // The retry resolves to the rival's row instead of failing with Conflict.
    assert_eq!(category.id, rival);
    assert_eq!(category.sequence_code, Some(0));
    assert_eq!(engine.list_categories(&caller).await.unwrap().len(), 1);
}

#[tokio::test]
async fn shared_categories_allocate_in_the_group_scope() {
    let (engine, _db) = engine_with_db().await;
    let caller = alice();

    let shared = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Kas Bersama", CategoryKind::Inflow)
                .subgroup(Bucket::AssetCurrent)
                .share_to_group(),
        )
        .await
        .unwrap();
    assert_eq!(shared.group_id.as_deref(), Some("warung"));
    assert_eq!(shared.sequence_code, Some(0));

    // A private category for the same user starts its own sequence.
    let own = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Kas Pribadi", CategoryKind::Inflow)
                .subgroup(Bucket::AssetCurrent),
        )
        .await
        .unwrap();
    assert_eq!(own.group_id, None);
    assert_eq!(own.sequence_code, Some(0));

    // A group-mate resolves the shared one instead of creating a duplicate.
    let mate = Caller::new("bob").group("warung");
    let resolved = engine
        .resolve_or_create_category(
            &mate,
            NewCategoryCmd::new("Kas Bersama", CategoryKind::Inflow)
                .subgroup(Bucket::AssetCurrent)
                .share_to_group(),
        )
        .await
        .unwrap();
    assert_eq!(resolved.id, shared.id);
}

#[tokio::test]
async fn category_deletion_is_blocked_while_referenced() {
    let (engine, _db) = engine_with_db().await;
    let caller = alice();

    let category = engine
        .resolve_or_create_category(
            &caller,
            NewCategoryCmd::new("Dagangan", CategoryKind::Inflow).subgroup(Bucket::AssetCurrent),
        )
        .await
        .unwrap();
    let product = engine
        .new_product(
            &caller,
            NewProductCmd::new("Beras").category_id(category.id),
        )
        .await
        .unwrap();

    assert!(matches!(
        engine.delete_category(&caller, category.id).await,
        Err(EngineError::Conflict(_))
    ));

    engine.delete_product(&caller, product.id).await.unwrap();
    engine.delete_category(&caller, category.id).await.unwrap();
}

#[tokio::test]
async fn only_privileged_callers_create_global_rules() {
    let (engine, _db) = engine_with_db().await;
    let caller = alice();

    assert!(matches!(
        engine
            .new_rule(&caller, "kas", Bucket::AssetCurrent, 0, RuleScope::Global)
            .await,
        Err(EngineError::Unauthorized(_))
    ));
    assert!(matches!(
        engine
            .new_rule(
                &caller,
                "kas",
                Bucket::AssetCurrent,
                0,
                RuleScope::Group("toko".to_string()),
            )
            .await,
        Err(EngineError::Unauthorized(_))
    ));

    engine
        .new_rule(
            &caller,
            "kas",
            Bucket::AssetCurrent,
            0,
            RuleScope::User("alice".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(engine.list_rules(&caller).await.unwrap().len(), 1);
}
