// ==========================================
// WashApi 集成测试
// ==========================================
// 测试范围:
// 1. 单扎投料: 占用翻转、数量合计、失败整体回滚
// 2. 整批投料: 同一批次只能投一次、数量上限
// 3. 请求校验: 来源种类唯一、数量 >= 1
// ==========================================


use garment_tracker::api::ApiError;
use garment_tracker::domain::types::{AllocationStatus, WashSourceKind};
use garment_tracker::domain::wash::{NewWashBatch, WashItem};
use test_helpers::*;

fn item(source_id: i64, quantity: i64) -> WashItem {
    WashItem {
        source_id,
        quantity,
    }
}

fn bundle_request(items: Vec<WashItem>) -> NewWashBatch {
    NewWashBatch {
        shade: "A".to_string(),
        batch_sources: None,
        bundle_sources: Some(items),
    }
}

fn batch_request(items: Vec<WashItem>) -> NewWashBatch {
    NewWashBatch {
        shade: "A".to_string(),
        batch_sources: Some(items),
        bundle_sources: None,
    }
}

// ==========================================
// 单扎投料
// ==========================================

#[test]
fn test_bundle_source_占用翻转与合计() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let inventory = &env.state.inventory_api;
    let user = actor("washer");

    let a = inventory
        .receive_bundle(&new_bundle("MPO1", 1, "M", "Red", 12), &user)
        .expect("收货失败");
    let b = inventory
        .receive_bundle(&new_bundle("MPO1", 2, "M", "Red", 8), &user)
        .expect("收货失败");

    let detail = env
        .state
        .wash_api
        .create_wash_batch(&bundle_request(vec![item(a.id, 12), item(b.id, 5)]), &user)
        .expect("创建洗水批次失败");

    assert_eq!(detail.wash_batch.source_kind, WashSourceKind::Bundle);
    assert_eq!(detail.wash_batch.total_quantity, 17);
    assert_eq!(detail.wash_batch.created_by, "washer");
    assert_eq!(detail.sources.len(), 2);
    assert_eq!(detail.sources[0].source_id, a.id);
    assert_eq!(detail.sources[1].quantity, 5);

    for id in [a.id, b.id] {
        assert_eq!(
            inventory.get_bundle(id).expect("查询失败").status,
            AllocationStatus::Allocated
        );
    }
    assert_eq!(
        env.state.wash_api.get_wash_batch(detail.wash_batch.id).expect("查询失败"),
        detail
    );
}

#[test]
fn test_bundle_source_已占用整体回滚() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let batch = seed_batch(&env, "MPO1", &["cutting"], 1, 1);
    let free = env
        .state
        .inventory_api
        .receive_bundle(&new_bundle("MPO1", 2, "M", "Red", 10), &actor("store"))
        .expect("收货失败");
    let allocated_id = batch.batch_bundles[0].received_id;

    let result = env.state.wash_api.create_wash_batch(
        &bundle_request(vec![item(free.id, 10), item(allocated_id, 10)]),
        &actor("washer"),
    );
    assert!(matches!(result, Err(ApiError::ValidationError(_))));

    // 第一项的占用翻转也被回滚
    assert_eq!(
        env.state.inventory_api.get_bundle(free.id).expect("查询失败").status,
        AllocationStatus::Received
    );
    assert!(env.state.wash_api.list_wash_batches().expect("查询失败").is_empty());

    // 超量 / 扎包不存在
    assert!(matches!(
        env.state
            .wash_api
            .create_wash_batch(&bundle_request(vec![item(free.id, 11)]), &actor("washer")),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        env.state
            .wash_api
            .create_wash_batch(&bundle_request(vec![item(999, 1)]), &actor("washer")),
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 请求校验
// ==========================================

#[test]
fn test_request_来源种类与数量() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.wash_api;
    let user = actor("washer");

    let both = NewWashBatch {
        shade: "A".to_string(),
        batch_sources: Some(vec![item(1, 1)]),
        bundle_sources: Some(vec![item(2, 1)]),
    };
    assert!(matches!(
        api.create_wash_batch(&both, &user),
        Err(ApiError::ValidationError(_))
    ));

    let neither = NewWashBatch {
        shade: "A".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        api.create_wash_batch(&neither, &user),
        Err(ApiError::ValidationError(_))
    ));

    assert!(matches!(
        api.create_wash_batch(&bundle_request(vec![item(1, 0)]), &user),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        api.create_wash_batch(&bundle_request(vec![item(1, 1), item(1, 2)]), &user),
        Err(ApiError::ValidationError(_))
    ));

    let mut blank_shade = bundle_request(vec![item(1, 1)]);
    blank_shade.shade = "  ".to_string();
    assert!(matches!(
        api.create_wash_batch(&blank_shade, &user),
        Err(ApiError::ValidationError(_))
    ));
}

// ==========================================
// 整批投料
// ==========================================

#[test]
fn test_batch_source_只能投料一次() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let batch = seed_batch(&env, "MPO1", &["cutting", "washing"], 1, 3);
    let api = &env.state.wash_api;
    let user = actor("washer");

    let detail = api
        .create_wash_batch(&batch_request(vec![item(batch.batch.id, 30)]), &user)
        .expect("整批投料失败");
    assert_eq!(detail.wash_batch.source_kind, WashSourceKind::Batch);
    assert_eq!(detail.wash_batch.total_quantity, 30);
    assert_eq!(detail.sources[0].source_id, batch.batch.id);

    assert!(matches!(
        api.create_wash_batch(&batch_request(vec![item(batch.batch.id, 1)]), &user),
        Err(ApiError::Conflict(_))
    ));
    assert_eq!(api.list_wash_batches().expect("查询失败").len(), 1);

    // 已投料的批次不能删除
    assert!(matches!(
        env.state.inventory_api.delete_batch(batch.batch.id),
        Err(ApiError::Conflict(_))
    ));
}

#[test]
fn test_batch_source_超量与不存在() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let batch = seed_batch(&env, "MPO1", &["cutting"], 1, 2);
    let api = &env.state.wash_api;
    let user = actor("washer");

    assert!(matches!(
        api.create_wash_batch(&batch_request(vec![item(batch.batch.id, 21)]), &user),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        api.create_wash_batch(&batch_request(vec![item(999, 1)]), &user),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(api.get_wash_batch(999), Err(ApiError::NotFound(_))));

    // 失败后仍可正常投料
    let detail = api
        .create_wash_batch(&batch_request(vec![item(batch.batch.id, 20)]), &user)
        .expect("整批投料失败");
    assert_eq!(detail.wash_batch.total_quantity, 20);
    assert_eq!(api.list_wash_batches().expect("查询失败"), vec![detail]);
}
