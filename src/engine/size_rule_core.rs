// ==========================================
// 藏书编目系统 - 尺寸规则匹配核心
// ==========================================
// 红线: 纯函数,不触库,不做 IO
// 规则 1: 宽度匹配取"下限不超过宽度的最高下限"分段
// 规则 2: 上界 max_width_mm 不参与匹配(超宽一律落入最高分段)
// 规则 3: 高度先查等高集合,再比阈值
// ==========================================

use crate::domain::size_band::SizeBand;
use crate::domain::types::PositionCode;

/// 尺寸规则匹配核心
pub struct SizeRuleCore;

impl SizeRuleCore {
    /// 按宽度匹配尺寸分段
    ///
    /// 在 min_width_mm <= width_mm 的分段中取 min_width_mm 最大者;
    /// 没有任何分段满足时返回 None(宽度低于全部下限)
    pub fn match_band(bands: &[SizeBand], width_mm: i64) -> Option<&SizeBand> {
        bands
            .iter()
            .filter(|band| band.min_width_mm <= width_mm)
            .max_by_key(|band| band.min_width_mm)
    }

    /// 由高度派生位置码
    ///
    /// 等高集合命中优先于阈值比较
    pub fn derive_position(band: &SizeBand, height_mm: i64) -> PositionCode {
        if band.is_equal_height(height_mm) {
            PositionCode::Level
        } else if height_mm <= band.height_threshold_mm {
            PositionCode::Down
        } else {
            PositionCode::Other
        }
    }

    /// 拼接系列名: 位置码字符 + 分段名(小写)
    pub fn compose_series(position: PositionCode, band_name: &str) -> String {
        format!("{}{}", position.as_char(), band_name.to_lowercase())
    }
}
