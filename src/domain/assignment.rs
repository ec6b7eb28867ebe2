// ==========================================
// 藏书编目系统 - 分配台账领域模型
// ==========================================
// 红线: 台账只追加和关闭(填 freed_at),永不删除行
// 用途: 分配引擎写入,历史查询与审计只读
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Assignment - 条码分配台账行
// ==========================================
// 对齐: assignment 表
// 约束: 同一条码/同一书目同时最多一条未关闭行(部分唯一索引)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    // ===== 主键 =====
    pub assignment_id: String, // 分配记录唯一标识（UUID）

    // ===== 关联 =====
    pub code: String,    // 条码文本（FK barcode_code.code）
    pub book_id: String, // 书目标识

    // ===== 生命周期 =====
    pub assigned_at: NaiveDateTime,       // 分配时间
    pub freed_at: Option<NaiveDateTime>,  // 释放时间（NULL 表示仍占用）
    pub assigned_by: Option<String>,      // 分配操作者
    pub freed_by: Option<String>,         // 释放操作者

    // ===== 分配上下文 =====
    pub series: Option<String>,        // 解析得到的原始系列（回退前）
    pub fallback_used: bool,           // 是否经回退系列分配
}

impl Assignment {
    /// 台账行是否仍处于占用中
    pub fn is_open(&self) -> bool {
        self.freed_at.is_none()
    }
}

// ==========================================
// LegacyMappingRow - 旧版映射投影
// ==========================================
// 用途: 只读兼容视图,由未关闭台账行投影得到,永不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyMappingRow {
    pub book_id: String, // 书目标识
    pub code: String,    // 当前占用的条码
}

// ==========================================
// 台账一致性检查
// ==========================================

/// 台账与条码池之间的不一致类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
    /// 存在未关闭台账行,但条码状态不是 ASSIGNED
    OpenAssignmentCodeNotAssigned,
    /// 条码状态为 ASSIGNED,但没有任何未关闭台账行
    AssignedCodeWithoutOpenAssignment,
}

/// 一次扫描发现的单条不一致
// 红线: 扫描只报告,不自动修复
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerInconsistency {
    pub kind: InconsistencyKind,       // 不一致类别
    pub code: String,                  // 涉及的条码
    pub book_id: Option<String>,       // 涉及的书目（有台账行时）
    pub assignment_id: Option<String>, // 涉及的台账行（有台账行时）
    pub detail: String,                // 人读描述
}
