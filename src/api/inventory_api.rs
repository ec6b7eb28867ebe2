// ==========================================
// 藏书编目系统 - 库存与校验 API
// ==========================================
// 职责: 只读预览、提交前校验、管理端释放、库存盘点
// 红线: 预览与校验不翻转任何状态
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::barcode::{BarcodeCode, SeriesStats};
use crate::domain::dimensions::Dimensions;
use crate::domain::types::CodeStatus;
use crate::engine::allocation::{AllocationEngine, PreviewOutcome};
use crate::engine::validation::{ValidationGate, ValidationOutcome};
use crate::repository::barcode_repo::BarcodeCodeRepository;
use tracing::info;

// ==========================================
// InventoryApi - 库存与校验 API
// ==========================================

/// 库存与校验API
///
/// 职责：
/// 1. 登记表单的条码预览（只读，不占用）
/// 2. 提交前候选条码校验
/// 3. 管理端直接释放（绕过台账的逃生口）
/// 4. 系列库存盘点与低库存预警
pub struct InventoryApi {
    allocation_engine: Arc<AllocationEngine>,
    gate: Arc<ValidationGate>,
    barcode_repo: Arc<BarcodeCodeRepository>,
    config_manager: Arc<ConfigManager>,
}

impl InventoryApi {
    /// 创建新的InventoryApi实例
    pub fn new(
        allocation_engine: Arc<AllocationEngine>,
        gate: Arc<ValidationGate>,
        barcode_repo: Arc<BarcodeCodeRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            allocation_engine,
            gate,
            barcode_repo,
            config_manager,
        }
    }

    /// 预览下一个将被分配的条码（不占用）
    ///
    /// # 返回
    /// - Ok(PreviewOutcome): candidate 为 None 表示池耗尽
    pub fn preview(&self, width_cm: f64, height_cm: f64) -> ApiResult<PreviewOutcome> {
        let dims = Dimensions::new(width_cm, height_cm)?;
        let outcome = self.allocation_engine.preview_best(&dims)?;
        Ok(outcome)
    }

    /// 预览（宽松字段入口）
    pub fn preview_with_fields(
        &self,
        fields: &HashMap<String, String>,
    ) -> ApiResult<PreviewOutcome> {
        let dims = Dimensions::from_alias_map(fields)?;
        let outcome = self.allocation_engine.preview_best(&dims)?;
        Ok(outcome)
    }

    /// 提交前校验候选条码
    ///
    /// 校验门的结构化结果原样返回给调用方展示；
    /// 业务失败在结果的 ok/reason 中表达，Err 仅表示存储层故障
    pub fn validate_candidate(
        &self,
        width_cm: f64,
        height_cm: f64,
        candidate: &str,
    ) -> ApiResult<ValidationOutcome> {
        let dims = Dimensions::new(width_cm, height_cm)?;
        let outcome = self.gate.validate_candidate(&dims, candidate)?;
        Ok(outcome)
    }

    /// 管理端按条码释放（绕过台账的逃生口）
    ///
    /// 只翻转条码状态，不碰台账行；台账侧的解除走
    /// AssignmentApi::close_open_assignment
    ///
    /// # 返回
    /// - Ok(true): 释放前处于 ASSIGNED
    /// - Ok(false): 本就是 AVAILABLE（幂等成功）
    pub fn admin_release(&self, code: &str) -> ApiResult<bool> {
        if code.trim().is_empty() {
            return Err(ApiError::InvalidInput("条码不能为空".to_string()));
        }
        let was_assigned = self.barcode_repo.release(code.trim())?;
        info!(code = code.trim(), was_assigned, "管理端按条码释放");
        Ok(was_assigned)
    }

    /// 管理端按内部标识释放
    pub fn admin_release_by_id(&self, code_id: i64) -> ApiResult<bool> {
        let was_assigned = self.barcode_repo.release_by_id(code_id)?;
        info!(code_id, was_assigned, "管理端按标识释放");
        Ok(was_assigned)
    }

    /// 系列库存盘点，low_stock 按配置阈值判定
    pub fn series_stats(&self) -> ApiResult<Vec<SeriesStats>> {
        let threshold = self
            .config_manager
            .get_low_stock_threshold()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let stats = self.barcode_repo.series_stats(threshold)?;
        Ok(stats)
    }

    /// 按系列列出条码
    ///
    /// # 参数
    /// - series: 系列名
    /// - status: 可选状态过滤（"AVAILABLE"/"ASSIGNED"）
    /// - limit: 返回上限，None 则使用配置的默认上限
    pub fn list_codes(
        &self,
        series: &str,
        status: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Vec<BarcodeCode>> {
        if series.trim().is_empty() {
            return Err(ApiError::InvalidInput("系列名不能为空".to_string()));
        }
        let status = match status {
            Some(raw) => Some(CodeStatus::from_db_str(raw).ok_or_else(|| {
                ApiError::InvalidInput(format!("无效的条码状态: {}", raw))
            })?),
            None => None,
        };
        let limit = match limit {
            Some(l) if l > 0 => l,
            Some(_) => {
                return Err(ApiError::InvalidInput("查询上限必须为正数".to_string()));
            }
            None => self
                .config_manager
                .get_assignment_query_limit()
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        };

        let codes = self.barcode_repo.list_by_series(series.trim(), status, limit)?;
        Ok(codes)
    }

    /// 查询单个条码
    pub fn get_code(&self, code: &str) -> ApiResult<Option<BarcodeCode>> {
        if code.trim().is_empty() {
            return Err(ApiError::InvalidInput("条码不能为空".to_string()));
        }
        let found = self.barcode_repo.find_by_code(code.trim())?;
        Ok(found)
    }
}
