// ==========================================
// 成衣批次追踪系统 - 主入口
// ==========================================
// 职责: 初始化日志、打开数据库并建表，输出当前台账概况
// 数据库路径: 命令行第一个参数 > GARMENT_TRACKER_DB_PATH > 用户数据目录
// ==========================================

use anyhow::Context;
use garment_tracker::app::{get_default_db_path, AppState};
use garment_tracker::logging;

fn main() {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", garment_tracker::APP_NAME);
    tracing::info!("系统版本: {}", garment_tracker::VERSION);
    tracing::info!("==================================================");

    if let Err(e) = run() {
        tracing::error!(error = %format!("{:#}", e), "启动失败");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let db_path = std::env::args()
        .nth(1)
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path.clone())
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("无法初始化AppState: {}", db_path))?;

    let overview = app_state.ledger_overview()?;
    tracing::info!(
        plans = overview.plans,
        bundles = overview.bundles,
        batches = overview.batches,
        wash_batches = overview.wash_batches,
        "台账概况"
    );
    Ok(())
}
