// ==========================================
// 藏书编目系统 - 提交前校验门
// ==========================================
// 职责: 预览与提交之间重新全量校验候选条码
// 红线: 纯输入类失败(格式)先于任何存储查询
// 红线: 校验门只读,不翻转任何状态
// ==========================================

use crate::domain::dimensions::Dimensions;
use crate::engine::code_parser::parse_code;
use crate::engine::fallback::alternate_series;
use crate::engine::size_rule::SizeRuleResolver;
use crate::domain::types::CodeStatus;
use crate::repository::barcode_repo::BarcodeCodeRepository;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// 校验失败原因(原样返回给调用方展示)
pub mod reasons {
    pub const MALFORMED_CODE: &str = "malformed_code";
    pub const NO_MATCHING_SIZE_RULE: &str = "no_matching_size_rule";
    pub const SERIES_MISMATCH: &str = "series_mismatch";
    pub const NOT_IN_POOL: &str = "not_in_pool";
    pub const NOT_AVAILABLE: &str = "not_available";
}

/// 校验门结果
///
/// 通过: ok=true,携带原始系列与候选实际命中的系列;
/// 失败: ok=false,携带失败原因
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>, // 尺寸解析得到的原始系列
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_series: Option<String>, // 候选条码实际命中的系列
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>, // 失败原因
}

impl ValidationOutcome {
    fn pass(series: String, matched_series: String) -> Self {
        Self {
            ok: true,
            series: Some(series),
            matched_series: Some(matched_series),
            reason: None,
        }
    }

    fn fail(reason: &str) -> Self {
        Self {
            ok: false,
            series: None,
            matched_series: None,
            reason: Some(reason.to_string()),
        }
    }
}

// ==========================================
// ValidationGate - 提交前校验门
// ==========================================
pub struct ValidationGate {
    resolver: Arc<SizeRuleResolver>,
    barcode_repo: Arc<BarcodeCodeRepository>,
}

impl ValidationGate {
    pub fn new(resolver: Arc<SizeRuleResolver>, barcode_repo: Arc<BarcodeCodeRepository>) -> Self {
        Self {
            resolver,
            barcode_repo,
        }
    }

    /// 校验候选条码能否用于给定尺寸的书籍
    ///
    /// 校验顺序(首败即停):
    /// 1. 格式(纯解析,不触库)
    /// 2. 尺寸规则命中
    /// 3. 候选系列属于允许集合(primary + alternate,大小写不敏感)
    /// 4. 条码在池内
    /// 5. 条码状态为 AVAILABLE
    ///
    /// 业务失败以 ok=false 返回,Err 仅用于存储层故障
    pub fn validate_candidate(
        &self,
        dims: &Dimensions,
        candidate: &str,
    ) -> RepositoryResult<ValidationOutcome> {
        // 1. 格式判定,先于任何存储查询
        let parsed = match parse_code(candidate) {
            Some(p) => p,
            None => {
                debug!(candidate, "候选条码格式非法");
                return Ok(ValidationOutcome::fail(reasons::MALFORMED_CODE));
            }
        };

        // 2. 尺寸规则
        let resolved = match self.resolver.resolve(dims)? {
            Some(r) => r,
            None => return Ok(ValidationOutcome::fail(reasons::NO_MATCHING_SIZE_RULE)),
        };
        let primary = resolved.series;

        // 3. 系列归属
        let mut allowed = vec![primary.clone()];
        if let Some(alt) = alternate_series(&primary) {
            allowed.push(alt);
        }
        if !allowed.contains(&parsed.letters) {
            debug!(candidate = %parsed.full_code(), ?allowed, "候选条码系列不在允许集合内");
            return Ok(ValidationOutcome::fail(reasons::SERIES_MISMATCH));
        }

        // 4. 池内存在性
        let row = match self.barcode_repo.find_by_code(&parsed.full_code())? {
            Some(row) => row,
            None => return Ok(ValidationOutcome::fail(reasons::NOT_IN_POOL)),
        };

        // 5. 可用性
        if row.status != CodeStatus::Available {
            return Ok(ValidationOutcome::fail(reasons::NOT_AVAILABLE));
        }

        Ok(ValidationOutcome::pass(primary, row.series))
    }
}
