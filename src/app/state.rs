// ==========================================
// 藏书编目系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AssignmentApi, InventoryApi};
use crate::config::config_manager::ConfigManager;
use crate::engine::{AllocationEngine, SizeRuleResolver, ValidationGate};
use crate::importer::InventoryImporterImpl;
use crate::repository::{AssignmentRepository, BarcodeCodeRepository, SizeBandRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源
/// 作为上层嵌入（CLI/服务进程）的装配点
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 分配API
    pub assignment_api: Arc<AssignmentApi>,

    /// 库存API
    pub inventory_api: Arc<InventoryApi>,

    /// 库存导入器
    pub importer: Arc<InventoryImporterImpl>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享数据库连接并执行迁移
    /// 2. 初始化所有Repository
    /// 3. 初始化引擎与校验闸
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接），迁移在此显式执行
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::run_migrations(&conn).map_err(|e| format!("数据库迁移失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================

        let band_repo = Arc::new(SizeBandRepository::from_connection(conn.clone()));
        let barcode_repo = Arc::new(BarcodeCodeRepository::from_connection(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::from_connection(conn.clone()));

        // 配置管理器
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================

        // 尺寸规则解析器
        let resolver = Arc::new(SizeRuleResolver::new(band_repo.clone()));

        // 分配引擎（持有共享连接以执行事务）
        let allocation_engine = Arc::new(AllocationEngine::new(conn.clone(), resolver.clone()));

        // 候选条码校验闸
        let gate = Arc::new(ValidationGate::new(resolver.clone(), barcode_repo.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================

        // 分配API
        let assignment_api = Arc::new(AssignmentApi::new(
            allocation_engine.clone(),
            assignment_repo.clone(),
            config_manager.clone(),
        ));

        // 库存API
        let inventory_api = Arc::new(InventoryApi::new(
            allocation_engine.clone(),
            gate,
            barcode_repo.clone(),
            config_manager.clone(),
        ));

        // 库存导入器
        let importer = Arc::new(InventoryImporterImpl::new(conn.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            assignment_api,
            inventory_api,
            importer,
            config_manager,
        })
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
/// - 开发环境: 用户数据目录/book-catalog-dev/book_catalog.db
/// - 生产环境: 用户数据目录/book-catalog/book_catalog.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("BOOK_CATALOG_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 先给一个默认回退值，后续如果能拿到 data_dir 再覆盖
    let mut path = PathBuf::from("./book_catalog.db");

    // 尝试获取用户数据目录
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("book-catalog-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("book-catalog");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("book_catalog.db");
    }

    path.to_string_lossy().to_string()
}
