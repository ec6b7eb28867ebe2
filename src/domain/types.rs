// ==========================================
// 藏书编目系统 - 领域类型定义
// ==========================================
// 职责: 条码状态、位置码等共享枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 条码状态 (Code Status)
// ==========================================
// 红线: 状态域只有两个值，不引入中间态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    Available, // 空闲可用
    Assigned,  // 已被占用
}

impl fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeStatus::Available => write!(f, "AVAILABLE"),
            CodeStatus::Assigned => write!(f, "ASSIGNED"),
        }
    }
}

impl CodeStatus {
    /// 从数据库字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Some(CodeStatus::Available),
            "ASSIGNED" => Some(CodeStatus::Assigned),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CodeStatus::Available => "AVAILABLE",
            CodeStatus::Assigned => "ASSIGNED",
        }
    }
}

// ==========================================
// 位置码 (Position Code)
// ==========================================
// 高度相对分段阈值的派生分类，作为条码字母前缀的首字符，
// 不单独落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionCode {
    Down,  // 低于高度阈值
    Level, // 命中等高集合
    Other, // 高于阈值（超高）
}

impl fmt::Display for PositionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionCode::Down => write!(f, "DOWN"),
            PositionCode::Level => write!(f, "LEVEL"),
            PositionCode::Other => write!(f, "OTHER"),
        }
    }
}

impl PositionCode {
    /// 位置码对应的单字符（条码前缀用）
    pub fn as_char(&self) -> char {
        match self {
            PositionCode::Down => 'd',
            PositionCode::Level => 'l',
            PositionCode::Other => 'o',
        }
    }

    /// 从单字符解析位置码
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'd' => Some(PositionCode::Down),
            'l' => Some(PositionCode::Level),
            'o' => Some(PositionCode::Other),
            _ => None,
        }
    }
}
