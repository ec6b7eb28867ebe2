// ==========================================
// 藏书编目系统 - 尺寸规则领域模型
// ==========================================
// 红线: 规则全部来自 size_band 表,代码中不留硬编码阈值
// 用途: 导入层/管理端写入,解析引擎只读
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// SizeBand - 宽度分段规则
// ==========================================
// 对齐: size_band 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeBand {
    // ===== 主键 =====
    pub band_id: String, // 分段唯一标识

    // ===== 规则字段 =====
    pub name: String,                 // 分段名（条码系列的字母主体,如 "gk"）
    pub min_width_mm: i64,            // 宽度下限（mm,含）
    pub max_width_mm: Option<i64>,    // 宽度上限（mm,仅作文档记录,匹配不使用）
    pub height_threshold_mm: i64,     // 高度分段阈值（mm）
    pub equal_heights_mm: Vec<i64>,   // 等高集合（mm,命中则位置码为 l）

    // ===== 审计字段 =====
    pub created_at: Option<String>, // 记录创建时间
    pub updated_at: Option<String>, // 记录更新时间
}

impl SizeBand {
    /// 判断高度是否命中等高集合
    pub fn is_equal_height(&self, height_mm: i64) -> bool {
        self.equal_heights_mm.contains(&height_mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_equal_height() {
        let band = SizeBand {
            band_id: "B-GK".to_string(),
            name: "gk".to_string(),
            min_width_mm: 110,
            max_width_mm: Some(130),
            height_threshold_mm: 215,
            equal_heights_mm: vec![205, 210, 215],
            created_at: None,
            updated_at: None,
        };
        assert!(band.is_equal_height(210));
        assert!(!band.is_equal_height(211));
    }
}
