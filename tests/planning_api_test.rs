// ==========================================
// PlanningApi 集成测试
// ==========================================
// 测试范围:
// 1. 路线创建: 序号连续、重复订单、空路线
// 2. 路线替换: 未开工可替换、开工后冲突
// 3. 查询: 按序号取工序、列表搜索
// 4. 工序名称字典
// ==========================================


use garment_tracker::api::ApiError;
use garment_tracker::domain::types::StageStatus;
use test_helpers::*;

#[test]
fn test_create_plan_序号从1连续() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.planning_api;

    let plan = api
        .create_plan(" MPO1 ", &stages(&["cutting", "sewing", "washing"]), &actor("planner"))
        .expect("创建路线失败");

    assert_eq!(plan.mpo, "MPO1");
    assert_eq!(plan.updated_by, "planner");
    let sequences: Vec<i32> = plan.route_steps.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);

    assert_eq!(api.get_stage_at_sequence(&plan, 2).expect("取工序失败"), "sewing");
    assert!(matches!(
        api.get_stage_at_sequence(&plan, 4),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.get_stage_at_sequence(&plan, 0),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_create_plan_重复与非法输入() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.planning_api;
    let user = actor("planner");

    api.create_plan("MPO1", &stages(&["cutting"]), &user)
        .expect("创建路线失败");

    assert!(matches!(
        api.create_plan("MPO1", &stages(&["sewing"]), &user),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        api.create_plan("MPO2", &[], &user),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        api.create_plan("MPO2", &stages(&["cutting", "cutting"]), &user),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        api.create_plan("  ", &stages(&["cutting"]), &user),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(api.get_plan_by_mpo("MPO2"), Err(ApiError::NotFound(_))));
}

#[test]
fn test_replace_plan_未开工可替换() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.planning_api;

    let original = api
        .create_plan("MPO1", &stages(&["cutting", "sewing"]), &actor("planner"))
        .expect("创建路线失败");
    // 已组批但未开工
    seed_batch(&env, "MPO1", &["cutting", "sewing"], 1, 1);

    let replaced = api
        .replace_plan("MPO1", &stages(&["cutting", "printing", "sewing"]), &actor("editor"))
        .expect("替换路线失败");

    assert_eq!(replaced.id, original.id);
    assert_eq!(replaced.updated_by, "editor");
    assert!(replaced.last_update >= original.last_update);
    let names: Vec<&str> = replaced.route_steps.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(names, vec!["cutting", "printing", "sewing"]);
    assert_eq!(replaced.route_steps[2].sequence, 3);
}

#[test]
fn test_replace_plan_开工后冲突() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let batch = seed_batch(&env, "MPO1", &["cutting", "sewing"], 1, 1);
    env.state
        .progression_api
        .create_or_update(batch.batch.id, "cutting", StageStatus::In, &actor("line-lead"))
        .expect("开工失败");

    let result = env.state.planning_api.replace_plan(
        "MPO1",
        &stages(&["cutting"]),
        &actor("editor"),
    );
    assert!(matches!(result, Err(ApiError::Conflict(_))));

    // 路线保持不变
    let plan = env.state.planning_api.get_plan_by_mpo("MPO1").expect("查询失败");
    assert_eq!(plan.route_steps.len(), 2);

    assert!(matches!(
        env.state
            .planning_api
            .replace_plan("MPO9", &stages(&["cutting"]), &actor("editor")),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_list_plans_搜索() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.planning_api;
    let user = actor("planner");

    api.create_plan("SPRING-001", &stages(&["cutting"]), &user)
        .expect("创建失败");
    api.create_plan("SPRING-002", &stages(&["cutting"]), &user)
        .expect("创建失败");
    let autumn = api
        .create_plan("AUTUMN-001", &stages(&["cutting", "sewing"]), &user)
        .expect("创建失败");

    let all = api.list_plans(None).expect("查询失败");
    assert_eq!(all.len(), 3);
    // 最近修改在前
    assert_eq!(all[0].id, autumn.id);
    assert_eq!(all[0].route_steps.len(), 2);

    let spring = api.list_plans(Some("spring")).expect("查询失败");
    assert_eq!(spring.len(), 2);
    assert!(spring.iter().all(|p| p.mpo.starts_with("SPRING")));

    assert_eq!(api.get_plan(autumn.id).expect("查询失败").mpo, "AUTUMN-001");
    assert!(matches!(api.get_plan(999), Err(ApiError::NotFound(_))));
}

#[test]
fn test_stage_name_字典() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.planning_api;

    api.register_stage_name("cutting").expect("登记失败");
    api.register_stage_name("sewing").expect("登记失败");
    assert!(matches!(
        api.register_stage_name("cutting"),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        api.register_stage_name(" "),
        Err(ApiError::ValidationError(_))
    ));

    let names: Vec<String> = api
        .list_stage_names()
        .expect("查询失败")
        .into_iter()
        .map(|s| s.stage)
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"cutting".to_string()));
}
