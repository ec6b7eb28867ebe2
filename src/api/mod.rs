// ==========================================
// 藏书编目系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供上层调用
// ==========================================

pub mod error;
pub mod assignment_api;
pub mod inventory_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use assignment_api::AssignmentApi;
pub use inventory_api::InventoryApi;
