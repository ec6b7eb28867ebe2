// ==========================================
// 藏书编目系统 - 书籍尺寸值对象
// ==========================================
// 职责: 宽高的校验、别名字段归一、厘米转毫米
// 红线: 归一化只在此处做一次,下游引擎一律消费毫米整数
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// 宽度字段在导入数据中的别名（按优先级排列）
const WIDTH_ALIASES: [&str; 4] = ["width", "w", "bbreite", "breite"];

/// 高度字段在导入数据中的别名（按优先级排列）
const HEIGHT_ALIASES: [&str; 4] = ["height", "h", "bhoehe", "hoehe"];

// ==========================================
// 尺寸校验错误
// ==========================================
#[derive(Debug, Error)]
pub enum DimensionError {
    #[error("缺少宽度字段 (可用别名: width/w/BBreite)")]
    MissingWidth,

    #[error("缺少高度字段 (可用别名: height/h/BHoehe)")]
    MissingHeight,

    #[error("字段 {field} 的值无法解析为数值: {value}")]
    InvalidValue { field: String, value: String },

    #[error("尺寸必须为正数: 宽={width_cm}, 高={height_cm}")]
    NonPositive { width_cm: f64, height_cm: f64 },
}

// ==========================================
// Dimensions - 书籍尺寸（厘米）
// ==========================================
// 用途: API 入参的统一载体,构造即校验
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width_cm: f64,  // 宽度（cm）
    pub height_cm: f64, // 高度（cm）
}

impl Dimensions {
    /// 构造并校验尺寸
    ///
    /// # 参数
    /// * `width_cm` - 宽度（厘米）
    /// * `height_cm` - 高度（厘米）
    ///
    /// # 返回
    /// * 非有限值或非正值返回 `DimensionError`
    pub fn new(width_cm: f64, height_cm: f64) -> Result<Self, DimensionError> {
        if !width_cm.is_finite() || !height_cm.is_finite() || width_cm <= 0.0 || height_cm <= 0.0 {
            return Err(DimensionError::NonPositive { width_cm, height_cm });
        }
        Ok(Dimensions { width_cm, height_cm })
    }

    /// 从带别名的字段映射构造尺寸
    ///
    /// 字段名大小写不敏感,同义字段按别名表优先级取第一个命中项;
    /// 小数逗号按德式习惯转为小数点后解析
    pub fn from_alias_map(fields: &HashMap<String, String>) -> Result<Self, DimensionError> {
        let width_cm = pick_field(fields, &WIDTH_ALIASES).ok_or(DimensionError::MissingWidth)?;
        let height_cm = pick_field(fields, &HEIGHT_ALIASES).ok_or(DimensionError::MissingHeight)?;
        let width_cm = parse_decimal(&width_cm.0, &width_cm.1)?;
        let height_cm = parse_decimal(&height_cm.0, &height_cm.1)?;
        Dimensions::new(width_cm, height_cm)
    }

    /// 宽度转毫米整数（四舍五入）
    pub fn width_mm(&self) -> i64 {
        (self.width_cm * 10.0).round() as i64
    }

    /// 高度转毫米整数（四舍五入）
    pub fn height_mm(&self) -> i64 {
        (self.height_cm * 10.0).round() as i64
    }
}

/// 按别名优先级提取字段,返回 (命中的别名, 原始值)
fn pick_field(fields: &HashMap<String, String>, aliases: &[&str]) -> Option<(String, String)> {
    for alias in aliases {
        for (key, value) in fields {
            if key.trim().eq_ignore_ascii_case(alias) {
                return Some((key.clone(), value.clone()));
            }
        }
    }
    None
}

/// 解析十进制数值,兼容小数逗号
fn parse_decimal(field: &str, raw: &str) -> Result<f64, DimensionError> {
    let normalized = raw.trim().replace(',', ".");
    normalized.parse::<f64>().map_err(|_| DimensionError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}
