// ==========================================
// 藏书编目系统 - 应用层
// ==========================================
// 职责: 装配共享状态,连接入口与后端各层
// ==========================================

pub mod state;

// 重导出
pub use state::{AppState, get_default_db_path};
