// ==========================================
// 藏书编目系统 - 导入层
// ==========================================
// 职责: 外部库存数据导入,生成内部数据
// 支持: CSV
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod inventory_importer_impl;
pub mod inventory_importer_trait;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::CsvParser;
pub use inventory_importer_impl::InventoryImporterImpl;

// 重导出 Trait 接口
pub use inventory_importer_trait::InventoryImporter;
