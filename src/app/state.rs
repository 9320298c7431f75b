// ==========================================
// 解冻库存滚动系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ApiResult, ReportApi, SimulationApi};
use crate::config::ConfigManager;
use crate::db;
use crate::engine::{ForecastAdapter, SimulationOrchestrator};
use crate::importer::{SalesHistoryImporter, SalesImportSummary};
use crate::repository::{InventoryStateRepository, ReportRepository, SalesHistoryRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 模拟操作API(收市推进/重置)
    pub simulation_api: Arc<SimulationApi>,

    /// 报表查询API
    pub report_api: Arc<ReportApi>,

    /// 销量历史导入器
    pub sales_importer: Arc<SalesHistoryImporter>,

    /// 预测适配器(导入后显式失效)
    pub forecast: Arc<ForecastAdapter<ConfigManager>>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会:
    /// 1. 打开共享数据库连接并建表
    /// 2. 初始化Repository层
    /// 3. 初始化Engine层
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        // 创建数据库连接(共享连接)
        let conn =
            db::open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        db::init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let inventory_repo = Arc::new(InventoryStateRepository::from_connection(conn.clone()));
        let sales_repo = Arc::new(SalesHistoryRepository::from_connection(conn.clone()));
        let report_repo = Arc::new(ReportRepository::from_connection(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================

        // 配置管理器
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // 预测适配器(按销量历史指纹缓存)
        let forecast = Arc::new(ForecastAdapter::new(
            sales_repo.clone(),
            config_manager.clone(),
        ));

        // 滚动推演编排器
        let orchestrator = Arc::new(SimulationOrchestrator::new(
            config_manager.clone(),
            inventory_repo.clone(),
            report_repo.clone(),
            forecast.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let simulation_api = Arc::new(SimulationApi::new(
            orchestrator,
            inventory_repo.clone(),
            report_repo.clone(),
        ));

        let report_api = Arc::new(ReportApi::new(report_repo, inventory_repo, forecast.clone()));

        let sales_importer = Arc::new(SalesHistoryImporter::new(sales_repo));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            simulation_api,
            report_api,
            sales_importer,
            forecast,
            config_manager,
        })
    }

    /// 导入销量历史并让预测缓存失效
    ///
    /// 训练数据变了, 旧模型不可再用; 下次推进/查询时按新指纹重训
    pub fn import_sales_history<P: AsRef<std::path::Path>>(
        &self,
        file_path: P,
    ) -> ApiResult<SalesImportSummary> {
        let summary = self.sales_importer.import_file(file_path)?;
        self.forecast.invalidate();
        Ok(summary)
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 开发环境: 用户数据目录/thaw-inventory-dev/thaw_inventory.db
/// - 生产环境: 用户数据目录/thaw-inventory/thaw_inventory.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径(便于调试/测试/CI)
    if let Ok(path) = std::env::var("THAW_INVENTORY_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 先给一个回退值, 拿不到用户数据目录时落在工作目录
    let mut path = PathBuf::from("./thaw_inventory.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录, 避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("thaw-inventory-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("thaw-inventory");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("thaw_inventory.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    // 注意: AppState::new() 的测试需要真实的数据库文件, 在集成测试中进行
}
