// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证写事务（BEGIN IMMEDIATE）下的串行化效果
// 场景: 多个独立连接同时推进同一批次 / 同时占用同一扎包
// ==========================================


#[cfg(test)]
mod concurrent_control_test {
    use garment_tracker::api::ApiError;
    use garment_tracker::domain::types::{AllocationStatus, StageStatus};
    use garment_tracker::domain::wash::{NewWashBatch, WashItem};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::test_helpers::*;

    const THREAD_COUNT: usize = 4;

    #[test]
    fn test_并发关闭同一工序只有一个成功() {
        let env = TestEnv::new().expect("无法创建测试环境");
        let batch = seed_batch(&env, "MPO1", &["cutting", "sewing"], 1, 2);
        let batch_id = batch.batch.id;
        env.state
            .progression_api
            .create_or_update(batch_id, "cutting", StageStatus::In, &actor("line-lead"))
            .expect("开工失败");

        let barrier = Arc::new(Barrier::new(THREAD_COUNT));
        let mut handles = Vec::new();
        for i in 0..THREAD_COUNT {
            let state = env.second_state();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                state.progression_api.create_or_update(
                    batch_id,
                    "cutting",
                    StageStatus::Closed,
                    &actor(&format!("worker-{}", i)),
                )
            }));
        }

        let mut success_count = 0;
        let mut rejected_count = 0;
        for handle in handles {
            match handle.join().expect("线程异常退出") {
                Ok(_) => success_count += 1,
                Err(ApiError::ValidationError(_)) => rejected_count += 1,
                Err(other) => panic!("意外的错误类型: {:?}", other),
            }
        }

        assert_eq!(success_count, 1, "应该只有1个线程关闭成功");
        assert_eq!(rejected_count, THREAD_COUNT - 1);

        let history = env
            .state
            .progression_api
            .list_stage_history(Some(batch_id))
            .expect("查询历史失败");
        assert_eq!(history.len(), 1);
        assert!(history[0].closed_at.is_some());
    }

    #[test]
    fn test_并发占用同一扎包只有一个成功() {
        let env = TestEnv::new().expect("无法创建测试环境");
        let bundle = env
            .state
            .inventory_api
            .receive_bundle(&new_bundle("MPO1", 1, "M", "Red", 10), &actor("store"))
            .expect("收货失败");
        env.state
            .planning_api
            .create_plan("MPO1", &stages(&["cutting"]), &actor("planner"))
            .expect("创建路线失败");
        let bundle_id = bundle.id;

        let barrier = Arc::new(Barrier::new(2));
        let batch_state = env.second_state();
        let wash_state = env.second_state();

        let batch_barrier = barrier.clone();
        let batch_handle = thread::spawn(move || {
            batch_barrier.wait();
            batch_state
                .inventory_api
                .create_batch(&[bundle_id], &actor("store"))
                .map(|_| ())
        });
        let wash_barrier = barrier.clone();
        let wash_handle = thread::spawn(move || {
            wash_barrier.wait();
            let request = NewWashBatch {
                shade: "A".to_string(),
                batch_sources: None,
                bundle_sources: Some(vec![WashItem {
                    source_id: bundle_id,
                    quantity: 10,
                }]),
            };
            wash_state
                .wash_api
                .create_wash_batch(&request, &actor("washer"))
                .map(|_| ())
        });

        let results = [
            batch_handle.join().expect("线程异常退出"),
            wash_handle.join().expect("线程异常退出"),
        ];
        let success_count = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(success_count, 1, "扎包只能被占用一次");
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ApiError::ValidationError(_))));

        assert_eq!(
            env.state
                .inventory_api
                .get_bundle(bundle_id)
                .expect("查询失败")
                .status,
            AllocationStatus::Allocated
        );
        let batches = env.state.inventory_api.list_batches().expect("查询失败").len();
        let washes = env.state.wash_api.list_wash_batches().expect("查询失败").len();
        assert_eq!(batches + washes, 1);
    }
}
