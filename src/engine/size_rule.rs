// ==========================================
// 藏书编目系统 - 尺寸规则解析引擎
// ==========================================
// 职责: 宽高 -> (尺寸分段, 位置码, 条码系列)
// 红线: 规则数据全部来自 size_band 表,引擎只读
// ==========================================

use crate::domain::dimensions::Dimensions;
use crate::domain::types::PositionCode;
use crate::engine::size_rule_core::SizeRuleCore;
use crate::repository::error::RepositoryResult;
use crate::repository::size_band_repo::SizeBandRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// 尺寸解析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSeries {
    pub band_id: String,        // 命中的尺寸分段
    pub band_name: String,      // 分段名(系列字母主体)
    pub position: PositionCode, // 派生位置码
    pub series: String,         // 完整系列名(位置码 + 分段名)
}

// ==========================================
// SizeRuleResolver - 尺寸规则解析引擎
// ==========================================
pub struct SizeRuleResolver {
    band_repo: Arc<SizeBandRepository>,
}

impl SizeRuleResolver {
    pub fn new(band_repo: Arc<SizeBandRepository>) -> Self {
        Self { band_repo }
    }

    /// 解析书籍尺寸对应的条码系列
    ///
    /// # 返回
    /// - Ok(Some(ResolvedSeries)): 命中尺寸分段
    /// - Ok(None): 无任何分段满足宽度条件(无匹配规则)
    /// - Err: 数据库错误
    pub fn resolve(&self, dims: &Dimensions) -> RepositoryResult<Option<ResolvedSeries>> {
        let width_mm = dims.width_mm();
        let height_mm = dims.height_mm();

        let bands = self.band_repo.list_all()?;
        let matched = match SizeRuleCore::match_band(&bands, width_mm) {
            Some(band) => band,
            None => {
                debug!(width_mm, height_mm, "宽度未命中任何尺寸分段");
                return Ok(None);
            }
        };

        let position = SizeRuleCore::derive_position(matched, height_mm);
        let series = SizeRuleCore::compose_series(position, &matched.name);

        Ok(Some(ResolvedSeries {
            band_id: matched.band_id.clone(),
            band_name: matched.name.clone(),
            position,
            series,
        }))
    }
}
