// ==========================================
// 藏书编目系统 - 条码分配 API
// ==========================================
// 职责: 书目登记/注销的条码分配入口、台账查询、台账审计
// 红线: 输入类校验先于任何事务;失败结果原样带因返回
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::assignment::{Assignment, LedgerInconsistency, LegacyMappingRow};
use crate::domain::dimensions::Dimensions;
use crate::engine::allocation::{AllocationEngine, AssignmentOutcome};
use crate::repository::assignment_repo::AssignmentRepository;
use tracing::error;

// ==========================================
// AssignmentApi - 条码分配 API
// ==========================================

/// 条码分配API
///
/// 职责：
/// 1. 书目登记时的自动/指定条码分配
/// 2. 书目注销时的条码释放
/// 3. 台账查询（当前占用、历史、全量在用）
/// 4. 台账一致性审计与旧版映射投影
pub struct AssignmentApi {
    allocation_engine: Arc<AllocationEngine>,
    assignment_repo: Arc<AssignmentRepository>,
    config_manager: Arc<ConfigManager>,
}

impl AssignmentApi {
    /// 创建新的AssignmentApi实例
    pub fn new(
        allocation_engine: Arc<AllocationEngine>,
        assignment_repo: Arc<AssignmentRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            allocation_engine,
            assignment_repo,
            config_manager,
        }
    }

    /// 自动分配条码
    ///
    /// # 参数
    /// - book_id: 书目标识
    /// - width_cm: 宽度（厘米）
    /// - height_cm: 高度（厘米）
    /// - actor: 操作者，None 则使用配置的默认操作者
    ///
    /// # 返回
    /// - Ok(AssignmentOutcome): 分配成功
    /// - Err(ApiError): 尺寸非法/无匹配规则/池耗尽等
    pub fn assign_auto(
        &self,
        book_id: &str,
        width_cm: f64,
        height_cm: f64,
        actor: Option<&str>,
    ) -> ApiResult<AssignmentOutcome> {
        if book_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("书目标识不能为空".to_string()));
        }
        let dims = Dimensions::new(width_cm, height_cm)?;
        let actor = self.resolve_actor(actor)?;

        let outcome = self
            .allocation_engine
            .assign_auto(book_id.trim(), &dims, Some(&actor))?;
        Ok(outcome)
    }

    /// 自动分配条码（宽松字段入口）
    ///
    /// 接受带别名的原始字段映射（width/w/BBreite 等），
    /// 在边界处一次性归一为规范尺寸后走标准分配
    pub fn assign_auto_with_fields(
        &self,
        book_id: &str,
        fields: &HashMap<String, String>,
        actor: Option<&str>,
    ) -> ApiResult<AssignmentOutcome> {
        if book_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("书目标识不能为空".to_string()));
        }
        let dims = Dimensions::from_alias_map(fields)?;
        let actor = self.resolve_actor(actor)?;

        let outcome = self
            .allocation_engine
            .assign_auto(book_id.trim(), &dims, Some(&actor))?;
        Ok(outcome)
    }

    /// 指定条码分配（预览确认或手工输入的条码）
    ///
    /// # 参数
    /// - book_id: 书目标识
    /// - candidate: 候选条码（大小写不敏感）
    /// - width_cm/height_cm: 书籍尺寸（厘米）
    /// - actor: 操作者
    pub fn assign_exact(
        &self,
        book_id: &str,
        candidate: &str,
        width_cm: f64,
        height_cm: f64,
        actor: Option<&str>,
    ) -> ApiResult<AssignmentOutcome> {
        if book_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("书目标识不能为空".to_string()));
        }
        if candidate.trim().is_empty() {
            return Err(ApiError::InvalidInput("候选条码不能为空".to_string()));
        }
        let dims = Dimensions::new(width_cm, height_cm)?;
        let actor = self.resolve_actor(actor)?;

        let outcome =
            self.allocation_engine
                .assign_exact(book_id.trim(), candidate, &dims, Some(&actor))?;
        Ok(outcome)
    }

    /// 按书释放条码（书目注销流程）
    ///
    /// 幂等: 书目无占用时返回空列表
    ///
    /// # 返回
    /// - Ok(Vec<String>): 本次释放的条码列表
    pub fn release_for_book(&self, book_id: &str, actor: Option<&str>) -> ApiResult<Vec<String>> {
        if book_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("书目标识不能为空".to_string()));
        }
        let actor = self.resolve_actor(actor)?;

        let released = self
            .allocation_engine
            .release_for_book(book_id.trim(), Some(&actor))?;
        Ok(released)
    }

    /// 关闭指定条码的未关闭台账行并释放条码
    ///
    /// # 返回
    /// - Ok(true): 有占用被解除
    /// - Ok(false): 该条码本无占用
    pub fn close_open_assignment(&self, code: &str, actor: Option<&str>) -> ApiResult<bool> {
        if code.trim().is_empty() {
            return Err(ApiError::InvalidInput("条码不能为空".to_string()));
        }
        let actor = self.resolve_actor(actor)?;

        let changed = self
            .allocation_engine
            .release_by_code(code.trim(), Some(&actor))?;
        Ok(changed)
    }

    /// 查询书目当前的占用
    pub fn get_open_assignment(&self, book_id: &str) -> ApiResult<Option<Assignment>> {
        if book_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("书目标识不能为空".to_string()));
        }
        let found = self.assignment_repo.find_open_for_book(book_id.trim())?;
        Ok(found)
    }

    /// 查询书目的分配历史，新记录在前
    ///
    /// # 参数
    /// - limit: 返回上限，None 则使用配置的默认上限
    pub fn list_assignment_history(
        &self,
        book_id: &str,
        limit: Option<i64>,
    ) -> ApiResult<Vec<Assignment>> {
        if book_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("书目标识不能为空".to_string()));
        }
        let limit = self.resolve_limit(limit)?;
        let rows = self.assignment_repo.find_by_book(book_id.trim(), limit)?;
        Ok(rows)
    }

    /// 列出全部在用占用
    pub fn list_open_assignments(&self, limit: Option<i64>) -> ApiResult<Vec<Assignment>> {
        let limit = self.resolve_limit(limit)?;
        let rows = self.assignment_repo.list_open(limit)?;
        Ok(rows)
    }

    /// 旧版"书目-条码"映射投影（只读兼容视图）
    ///
    /// 由未关闭台账行投影得到；配置关闭时拒绝访问
    pub fn legacy_mapping(&self) -> ApiResult<Vec<LegacyMappingRow>> {
        let enabled = self
            .config_manager
            .is_legacy_projection_enabled()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        if !enabled {
            return Err(ApiError::BusinessRuleViolation(
                "旧版映射投影已停用".to_string(),
            ));
        }
        let rows = self.assignment_repo.legacy_mapping()?;
        Ok(rows)
    }

    /// 扫描台账与条码池的不一致并返回明细
    ///
    /// 每条不一致按 error 级别记录日志；只报告，不修复
    pub fn scan_ledger(&self) -> ApiResult<Vec<LedgerInconsistency>> {
        let findings = self.assignment_repo.scan_inconsistencies()?;
        for finding in &findings {
            error!(
                kind = ?finding.kind,
                code = %finding.code,
                book_id = ?finding.book_id,
                assignment_id = ?finding.assignment_id,
                "台账不一致: {}",
                finding.detail
            );
        }
        Ok(findings)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 操作者兜底: 未指定时取配置的默认操作者
    fn resolve_actor(&self, actor: Option<&str>) -> ApiResult<String> {
        match actor {
            Some(a) if !a.trim().is_empty() => Ok(a.trim().to_string()),
            _ => self
                .config_manager
                .get_default_actor()
                .map_err(|e| ApiError::InternalError(e.to_string())),
        }
    }

    /// 查询上限兜底: 未指定时取配置的默认上限
    fn resolve_limit(&self, limit: Option<i64>) -> ApiResult<i64> {
        match limit {
            Some(l) if l > 0 => Ok(l),
            Some(_) => Err(ApiError::InvalidInput("查询上限必须为正数".to_string())),
            None => self
                .config_manager
                .get_assignment_query_limit()
                .map_err(|e| ApiError::InternalError(e.to_string())),
        }
    }
}
