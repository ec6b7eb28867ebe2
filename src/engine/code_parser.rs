// ==========================================
// 藏书编目系统 - 条码格式解析
// ==========================================
// 格式: 字母前缀 + 数字尾段(如 lgk001)
// 红线: 解析是纯函数,不触库;格式判定先于任何存储查询
// ==========================================

use regex::Regex;
use std::sync::OnceLock;

/// 条码格式: 一段字母 + 一段数字,无其他字符
static CODE_RE: OnceLock<Regex> = OnceLock::new();

fn code_re() -> &'static Regex {
    CODE_RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+)([0-9]+)$").expect("条码正则必须可编译")
    })
}

/// 解析后的条码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCode {
    pub letters: String, // 字母前缀(规范化为小写,即系列名)
    pub digits: String,  // 数字尾段(保留前导零)
}

impl ParsedCode {
    /// 重组为规范化条码文本
    pub fn full_code(&self) -> String {
        format!("{}{}", self.letters, self.digits)
    }
}

/// 解析条码文本
///
/// 前后空白先剔除;大小写不敏感,字母段统一转小写
///
/// # 返回
/// - Some(ParsedCode): 格式合法
/// - None: 格式非法(空串、缺段、含其他字符、段序颠倒)
pub fn parse_code(raw: &str) -> Option<ParsedCode> {
    let trimmed = raw.trim();
    let caps = code_re().captures(trimmed)?;
    Some(ParsedCode {
        letters: caps[1].to_lowercase(),
        digits: caps[2].to_string(),
    })
}
