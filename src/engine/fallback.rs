// ==========================================
// 藏书编目系统 - 回退系列策略
// ==========================================
// 规则: 仅对"位置前缀 + 单字母色码 + 裸 i"结尾的系列,
//       把尾部 i 换成 ik;其余系列一律无回退
// 红线: 不做泛化的相似检索;一次回退,不允许链式回退
// ==========================================

use regex::Regex;
use std::sync::OnceLock;

/// 可回退系列: 可选位置码(d/l/o) + 单字母色码 + 尾部裸 i
static FALLBACK_RE: OnceLock<Regex> = OnceLock::new();

fn fallback_re() -> &'static Regex {
    FALLBACK_RE.get_or_init(|| {
        Regex::new(r"^[dlo]?[a-z]i$").expect("回退系列正则必须可编译")
    })
}

/// 计算系列的回退系列
///
/// # 参数
/// - primary_series: 原始系列名(大小写不敏感)
///
/// # 返回
/// - Some(String): 回退系列(尾部 i 替换为 ik)
/// - None: 该系列无回退
///
/// # 示例
/// ```
/// use book_barcode_inventory::engine::fallback::alternate_series;
///
/// assert_eq!(alternate_series("ei"), Some("eik".to_string()));
/// assert_eq!(alternate_series("eik"), None);
/// assert_eq!(alternate_series("ouk"), None);
/// ```
pub fn alternate_series(primary_series: &str) -> Option<String> {
    let series = primary_series.trim().to_lowercase();
    // 已以 ik 结尾的系列不再回退
    if series.ends_with("ik") {
        return None;
    }
    if !fallback_re().is_match(&series) {
        return None;
    }
    Some(format!("{}k", series))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_i_series_gains_k() {
        assert_eq!(alternate_series("ei"), Some("eik".to_string()));
        assert_eq!(alternate_series("dai"), Some("daik".to_string()));
        assert_eq!(alternate_series("lbi"), Some("lbik".to_string()));
    }

    #[test]
    fn test_ik_series_has_no_fallback() {
        assert_eq!(alternate_series("eik"), None);
        assert_eq!(alternate_series("daik"), None);
    }

    #[test]
    fn test_other_series_have_no_fallback() {
        assert_eq!(alternate_series("ouk"), None);
        assert_eq!(alternate_series("lgk"), None);
        assert_eq!(alternate_series("i"), None); // 缺色码
        assert_eq!(alternate_series("xai"), None); // 位置码不合法
        assert_eq!(alternate_series(""), None);
    }

    #[test]
    fn test_case_insensitive_input() {
        assert_eq!(alternate_series("EI"), Some("eik".to_string()));
        assert_eq!(alternate_series(" Dai "), Some("daik".to_string()));
    }
}
