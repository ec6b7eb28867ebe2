// ==========================================
// 藏书编目系统 - 导入汇总模型
// ==========================================
// 用途: 导入层逐文件生成,CLI seed 子命令与测试读取
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// RowViolation - 单行违规明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowViolation {
    pub row: usize,            // 数据行序号(从 1 起,不含表头)
    pub field: Option<String>, // 违规字段(整行问题时为 None)
    pub message: String,       // 违规说明
}

// ==========================================
// ImportSummary - 单文件导入汇总
// ==========================================
// 不变量: total_rows = inserted + skipped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,             // 数据行总数(不含表头)
    pub inserted: usize,               // 成功入库行数
    pub skipped: usize,                // 跳过行数(校验失败或重复)
    pub violations: Vec<RowViolation>, // 逐行违规明细
}
