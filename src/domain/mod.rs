// ==========================================
// 藏书编目系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod assignment;
pub mod barcode;
pub mod dimensions;
pub mod import_report;
pub mod size_band;
pub mod types;

// 重导出核心类型
pub use assignment::{Assignment, InconsistencyKind, LedgerInconsistency, LegacyMappingRow};
pub use barcode::{BarcodeCode, SeriesStats};
pub use dimensions::{DimensionError, Dimensions};
pub use import_report::{ImportSummary, RowViolation};
pub use size_band::SizeBand;
pub use types::{CodeStatus, PositionCode};
