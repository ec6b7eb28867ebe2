// ==========================================
// 藏书编目系统 - 条码池领域模型
// ==========================================
// 红线: status 是占用判定的权威字段,台账行只作防御性复核
// 用途: 导入层写入,分配引擎通过 CAS 翻转状态
// ==========================================

use crate::domain::types::CodeStatus;
use serde::{Deserialize, Serialize};

// ==========================================
// BarcodeCode - 预印条码
// ==========================================
// 对齐: barcode_code 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodeCode {
    // ===== 主键 =====
    pub code_id: i64, // 自增主键（CAS 定位用）

    // ===== 条码信息 =====
    pub code: String,              // 条码文本（规范化为小写,库内 NOCASE 唯一）
    pub series: String,            // 所属系列（字母前缀,如 "lgk"）
    pub band_id: Option<String>,   // 关联尺寸分段（可空,导入时可不回填）
    pub status: CodeStatus,        // 占用状态
    pub rank_in_series: Option<i64>, // 系列内优先序（小者优先,空值最后）

    // ===== 审计字段 =====
    pub created_at: Option<String>, // 记录创建时间
    pub updated_at: Option<String>, // 记录更新时间
}

// ==========================================
// SeriesStats - 系列库存统计
// ==========================================
// 用途: 盘点视图与低库存预警
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesStats {
    pub series: String,  // 系列名
    pub total: i64,      // 系列内条码总数
    pub available: i64,  // 空闲数
    pub assigned: i64,   // 占用数
    pub low_stock: bool, // 空闲数低于预警阈值
}
