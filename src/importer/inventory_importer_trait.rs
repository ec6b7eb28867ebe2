// ==========================================
// 藏书编目系统 - 库存导入 Trait
// ==========================================
// 职责: 定义尺寸规则与条码库存的导入接口(不包含实现)
// ==========================================

use crate::domain::import_report::ImportSummary;
use async_trait::async_trait;
use std::error::Error;
use std::path::Path;

// ==========================================
// InventoryImporter Trait
// ==========================================
// 用途: 库存数据导入主接口
// 实现者: InventoryImporterImpl
#[async_trait]
pub trait InventoryImporter: Send + Sync {
    /// 从 CSV 文件导入尺寸规则
    ///
    /// # 参数
    /// - file_path: CSV 文件路径（.csv）
    ///
    /// # 返回
    /// - Ok(ImportSummary): 导入汇总（总行数、入库数、跳过数、违规明细）
    /// - Err: 文件读取错误、数据库错误等
    ///
    /// # 导入流程
    /// 1. 文件读取与解析
    /// 2. 逐行字段校验与类型转换
    /// 3. 单事务落库（重复档位记为违规并跳过）
    async fn import_size_bands<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportSummary, Box<dyn Error>>;

    /// 从 CSV 文件导入条码库存
    ///
    /// # 参数
    /// - file_path: CSV 文件路径（.csv）
    ///
    /// # 返回
    /// - Ok(ImportSummary): 导入汇总
    /// - Err: 文件读取错误、数据库错误等
    ///
    /// # 说明
    /// - 系列名不入文件,由条码文本解析派生
    /// - 格式非法或重复的条码记为违规并跳过,不阻断整个文件
    async fn import_barcodes<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportSummary, Box<dyn Error>>;

    /// 批量导入多个条码文件（并发执行）
    ///
    /// # 参数
    /// - file_paths: 文件路径列表
    ///
    /// # 返回
    /// - Ok(Vec<Result<ImportSummary, String>>): 每个文件的导入结果
    /// - Err: 批量导入错误
    ///
    /// # 说明
    /// - 使用 tokio 并发执行多个文件的导入
    /// - 每个文件的导入是独立的，互不影响
    /// - 如果某个文件导入失败，不影响其他文件
    async fn batch_import_barcodes<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Result<Vec<Result<ImportSummary, String>>, Box<dyn Error>>;
}
