//! End-to-end tests for the rollup step against in-memory stores.

use rollup_core::{
    AttributeValue, EntityReference, ExecutionContext, MemoryTraceSink, MessageName, Outcome,
    Record, RecordId, RecordStore, RollupConfig, RollupError, RollupStep, SkipReason,
};
use rollup_store::fakes::MemoryRecordStore;
use rollup_store::SurrealRecordStore;

const ENTITY: &str = "lat_rollupentity";
const PARENT_ATTR: &str = "lat_parentrollupid";
const VALUE_ATTR: &str = "lat_value";
const NAME_ATTR: &str = "lat_name";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_step() -> RollupStep {
    RollupStep::new(RollupConfig::default()).expect("default config")
}

fn parent() -> EntityReference {
    EntityReference::new(ENTITY, RecordId::new())
}

fn stored_child(id: RecordId, parent: &EntityReference, value: i64) -> Record {
    Record::new(ENTITY, id)
        .with(PARENT_ATTR, parent.clone())
        .with(VALUE_ATTR, value)
}

fn target(id: RecordId, parent: &EntityReference, value: i64) -> Record {
    stored_child(id, parent, value).with(NAME_ATTR, "Test Child")
}

fn summary_of(ctx: &ExecutionContext) -> Option<&str> {
    ctx.target.get_text(NAME_ATTR)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Update of a child already stored: its stored copy is not counted again.
#[tokio::test]
async fn update_of_stored_child_counts_it_once() {
    let parent = parent();
    let child_id = RecordId::new();
    let store = MemoryRecordStore::with_records([
        stored_child(child_id, &parent, 5),
        stored_child(RecordId::new(), &parent, 15),
    ]);
    let sink = MemoryTraceSink::new();

    let pre_image = Record::new(ENTITY, RecordId::new()).with(PARENT_ATTR, parent.clone());
    let mut ctx = ExecutionContext::new(MessageName::Update, target(child_id, &parent, 5))
        .with_pre_image(pre_image);

    let outcome = default_step().execute(&mut ctx, &store, &sink).await.unwrap();

    assert_eq!(summary_of(&ctx), Some("5/20"));
    match outcome {
        Outcome::Applied(summary) => {
            assert!(summary.included_self);
            assert_eq!(summary.sibling_count, 2);
        }
        other => panic!("expected Applied, got {other:?}"),
    }
}

/// The stored copy still holds the old value; the in-flight value wins.
#[tokio::test]
async fn update_that_changes_value_uses_new_value_in_total() {
    let parent = parent();
    let child_id = RecordId::new();
    let store = MemoryRecordStore::with_records([
        stored_child(child_id, &parent, 5),
        stored_child(RecordId::new(), &parent, 15),
    ]);

    let mut ctx = ExecutionContext::new(MessageName::Update, target(child_id, &parent, 7));
    default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert_eq!(summary_of(&ctx), Some("7/22"));
}

#[tokio::test]
async fn new_child_not_yet_visible_is_added_once() {
    let parent = parent();
    let store = MemoryRecordStore::with_records([
        stored_child(RecordId::new(), &parent, 5),
        stored_child(RecordId::new(), &parent, 15),
    ]);

    let mut ctx = ExecutionContext::new(MessageName::Create, target(RecordId::new(), &parent, 5));
    default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert_eq!(summary_of(&ctx), Some("5/25"));
}

#[tokio::test]
async fn first_child_reports_own_value_twice() {
    let parent = parent();
    let store = MemoryRecordStore::new();

    let mut ctx = ExecutionContext::new(MessageName::Create, target(RecordId::new(), &parent, 5));
    default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert_eq!(summary_of(&ctx), Some("5/5"));
}

#[tokio::test]
async fn negative_own_value() {
    let parent = parent();
    let store = MemoryRecordStore::with_records([stored_child(RecordId::new(), &parent, 10)]);

    let mut ctx = ExecutionContext::new(MessageName::Update, target(RecordId::new(), &parent, -3));
    default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert_eq!(summary_of(&ctx), Some("-3/7"));
}

#[tokio::test]
async fn siblings_of_other_parents_are_ignored() {
    let parent = parent();
    let store = MemoryRecordStore::with_records([
        stored_child(RecordId::new(), &parent, 10),
        stored_child(RecordId::new(), &self::parent(), 1000),
    ]);

    let mut ctx = ExecutionContext::new(MessageName::Create, target(RecordId::new(), &parent, 1));
    default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert_eq!(summary_of(&ctx), Some("1/11"));
}

#[tokio::test]
async fn large_sibling_sets_are_read_across_pages() {
    let parent = parent();
    let store = MemoryRecordStore::with_records(
        (0..25).map(|_| stored_child(RecordId::new(), &parent, 2)),
    );
    let step = RollupStep::new(RollupConfig::new("", r#"{"page_size": 10}"#)).unwrap();

    let mut ctx = ExecutionContext::new(MessageName::Create, target(RecordId::new(), &parent, 2));
    step.execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert_eq!(summary_of(&ctx), Some("2/52"));
    assert_eq!(store.query_count(), 3);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_parent_fails_before_any_query() {
    let store = MemoryRecordStore::new();
    let record = Record::new(ENTITY, RecordId::new())
        .with(VALUE_ATTR, 5)
        .with(NAME_ATTR, "Test Child");
    let mut ctx = ExecutionContext::new(MessageName::Create, record.clone());

    let err = default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RollupError::MissingParent { .. }));
    assert_eq!(store.query_count(), 0);
    assert_eq!(ctx.target, record);
}

#[tokio::test]
async fn missing_value_leaves_target_unmutated() {
    let parent = parent();
    let store = MemoryRecordStore::new();
    let record = Record::new(ENTITY, RecordId::new())
        .with(PARENT_ATTR, parent)
        .with(NAME_ATTR, "Test Child");
    let mut ctx = ExecutionContext::new(MessageName::Update, record.clone());

    let err = default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RollupError::MissingValue { .. }));
    assert_eq!(ctx.target, record);
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn null_value_is_missing() {
    let parent = parent();
    let record = Record::new(ENTITY, RecordId::new())
        .with(PARENT_ATTR, parent)
        .with(VALUE_ATTR, AttributeValue::Null);
    let mut ctx = ExecutionContext::new(MessageName::Update, record);

    let err = default_step()
        .execute(&mut ctx, &MemoryRecordStore::new(), &MemoryTraceSink::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RollupError::MissingValue { .. }));
}

#[tokio::test]
async fn text_value_is_a_format_error() {
    let parent = parent();
    let record = Record::new(ENTITY, RecordId::new())
        .with(PARENT_ATTR, parent)
        .with(VALUE_ATTR, "five");
    let mut ctx = ExecutionContext::new(MessageName::Update, record.clone());

    let err = default_step()
        .execute(&mut ctx, &MemoryRecordStore::new(), &MemoryTraceSink::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RollupError::Format { .. }));
    assert_eq!(ctx.target, record);
}

#[tokio::test]
async fn store_failure_is_store_unavailable_and_traced() {
    let parent = parent();
    let store = MemoryRecordStore::new();
    store.fail_with("simulated transport error");
    let sink = MemoryTraceSink::new();
    let record = target(RecordId::new(), &parent, 5);
    let mut ctx = ExecutionContext::new(MessageName::Update, record.clone());

    let err = default_step().execute(&mut ctx, &store, &sink).await.unwrap_err();

    assert!(matches!(err, RollupError::StoreUnavailable(_)));
    assert_eq!(ctx.target, record);
    assert!(sink
        .messages()
        .iter()
        .any(|m| m.starts_with("Sibling query failed")));
}

// ---------------------------------------------------------------------------
// Host context handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_messages_are_skipped() {
    let parent = parent();
    let store = MemoryRecordStore::new();
    let record = target(RecordId::new(), &parent, 5);
    let mut ctx = ExecutionContext::new(MessageName::Delete, record.clone());

    let outcome = default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Skipped(SkipReason::UnsupportedMessage {
            message: "Delete".to_string()
        })
    );
    assert_eq!(ctx.target, record);
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn other_entities_are_skipped() {
    let store = MemoryRecordStore::new();
    let record = Record::new("account", RecordId::new()).with(VALUE_ATTR, 5);
    let mut ctx = ExecutionContext::new(MessageName::Create, record);

    let outcome = default_step()
        .execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Skipped(SkipReason::OtherEntity { .. })));
}

#[tokio::test]
async fn parent_can_come_from_pre_image_when_enabled() {
    let parent = parent();
    let store = MemoryRecordStore::with_records([stored_child(RecordId::new(), &parent, 4)]);
    let step = RollupStep::new(RollupConfig::new("", r#"{"parent_from_pre_image": true}"#)).unwrap();

    let id = RecordId::new();
    let pre_image = stored_child(id, &parent, 1);
    let changed_only = Record::new(ENTITY, id).with(VALUE_ATTR, 6);
    let mut ctx =
        ExecutionContext::new(MessageName::Update, changed_only).with_pre_image(pre_image);

    step.execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();
    assert_eq!(summary_of(&ctx), Some("6/10"));
}

#[tokio::test]
async fn pre_image_parent_is_ignored_by_default() {
    let parent = parent();
    let id = RecordId::new();
    let changed_only = Record::new(ENTITY, id).with(VALUE_ATTR, 6);
    let mut ctx = ExecutionContext::new(MessageName::Update, changed_only)
        .with_pre_image(stored_child(id, &parent, 1));

    let err = default_step()
        .execute(&mut ctx, &MemoryRecordStore::new(), &MemoryTraceSink::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RollupError::MissingParent { .. }));
}

#[tokio::test]
async fn custom_attribute_names_from_unsecure_config() {
    let unsecure = r#"{
        "entity": "new_lineitem",
        "parent_attribute": "new_orderid",
        "value_attribute": "new_quantity",
        "summary_attribute": "new_summary"
    }"#;
    let step = RollupStep::new(RollupConfig::new("ignored-secret", unsecure)).unwrap();
    let order = EntityReference::new("new_order", RecordId::new());
    let store = MemoryRecordStore::with_records([Record::new("new_lineitem", RecordId::new())
        .with("new_orderid", order.clone())
        .with("new_quantity", 3)]);

    let line = Record::new("new_lineitem", RecordId::new())
        .with("new_orderid", order)
        .with("new_quantity", 4);
    let mut ctx = ExecutionContext::new(MessageName::Create, line);

    step.execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();
    assert_eq!(ctx.target.get_text("new_summary"), Some("4/7"));
}

#[test]
fn malformed_unsecure_config_fails_construction() {
    let err = RollupStep::new(RollupConfig::new("", "{oops")).unwrap_err();
    assert!(matches!(err, RollupError::InvalidConfig(_)));
}

#[test]
fn oversized_page_size_fails_construction() {
    let config = RollupConfig::new("", r#"{"page_size": 18446744073709551615}"#);
    let err = RollupStep::new(config).unwrap_err();
    assert!(matches!(err, RollupError::InvalidConfig(_)));
}

#[tokio::test]
async fn trace_sink_receives_progress() {
    let parent = parent();
    let store = MemoryRecordStore::with_records([stored_child(RecordId::new(), &parent, 15)]);
    let sink = MemoryTraceSink::new();

    let mut ctx = ExecutionContext::new(MessageName::Create, target(RecordId::new(), &parent, 5));
    default_step().execute(&mut ctx, &store, &sink).await.unwrap();

    let messages = sink.messages();
    assert!(messages.contains(&"Retrieved 1 sibling(s)".to_string()));
    assert!(messages.contains(&"Wrote 5/20 to lat_name".to_string()));
}

// ---------------------------------------------------------------------------
// SurrealDB backend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn runs_against_surreal_store_and_host_commit_is_visible() {
    let store = SurrealRecordStore::in_memory().await.expect("in-memory surreal");
    let parent = parent();
    store
        .upsert(stored_child(RecordId::new(), &parent, 15))
        .await
        .unwrap();

    let step = default_step();
    let first = target(RecordId::new(), &parent, 5);
    let mut ctx = ExecutionContext::new(MessageName::Create, first);
    step.execute(&mut ctx, &store, &MemoryTraceSink::new())
        .await
        .unwrap();
    assert_eq!(summary_of(&ctx), Some("5/20"));

    // Host commit, then an update of the same child finds its stale copy.
    store.upsert(ctx.target.clone()).await.unwrap();
    let mut update = ExecutionContext::new(MessageName::Update, ctx.target.clone().with(VALUE_ATTR, 9));
    let outcome = step
        .execute(&mut update, &store, &MemoryTraceSink::new())
        .await
        .unwrap();
    assert_eq!(summary_of(&update), Some("9/24"));
    assert!(matches!(outcome, Outcome::Applied(ref s) if s.included_self));
}
