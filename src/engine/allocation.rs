// ==========================================
// 藏书编目系统 - 条码分配引擎
// ==========================================
// 职责: 自动分配、指定分配、按书释放、只读预览
// 红线: 状态翻转与台账写入必须同一事务,失败整体回滚
// 红线: 回退只允许一跳(primary -> alternate),不允许链式
// ==========================================

use crate::domain::dimensions::Dimensions;
use crate::domain::types::{CodeStatus, PositionCode};
use crate::engine::code_parser::parse_code;
use crate::engine::fallback::alternate_series;
use crate::engine::size_rule::{ResolvedSeries, SizeRuleResolver};
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::barcode_repo::BarcodeCodeRepository;
use crate::repository::error::RepositoryError;
use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

// ==========================================
// 分配引擎错误类型
// ==========================================
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("无匹配的尺寸规则: 宽={width_mm}mm 高={height_mm}mm")]
    NoMatchingSizeRule { width_mm: i64, height_mm: i64 },

    #[error("系列 {series} 无可用条码(已尝试: {allowed:?})")]
    PoolExhausted { series: String, allowed: Vec<String> },

    #[error("条码不在池内: {code}")]
    CodeNotInPool { code: String },

    #[error("条码不可用: {code}")]
    CodeNotAvailable { code: String },

    #[error("条码 {code} 不属于允许的系列 {allowed:?}")]
    SeriesMismatch { code: String, allowed: Vec<String> },

    #[error("条码格式非法: {code}")]
    MalformedCode { code: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type AllocationResult<T> = Result<T, AllocationError>;

// ==========================================
// 分配结果
// ==========================================

/// 一次成功分配的完整结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub assignment_id: String,      // 台账行标识
    pub book_id: String,            // 书目标识
    pub code: String,               // 实际分配的条码
    pub series: String,             // 实际分配的系列
    pub requested_series: String,   // 尺寸解析得到的原始系列
    pub fallback_used: bool,        // 是否经回退系列分配
    pub band_id: String,            // 命中的尺寸分段
    pub band_name: String,          // 分段名
    pub position: PositionCode,     // 派生位置码
    pub assigned_at: NaiveDateTime, // 分配时间
    pub reassigned: bool,           // 是否顶替了该书此前的占用
}

/// 只读预览结果(不翻转任何状态)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewOutcome {
    pub requested_series: String,    // 尺寸解析得到的原始系列
    pub series: String,              // 预计分配所在的系列
    pub allowed: Vec<String>,        // 允许的系列集合(primary + alternate)
    pub candidate: Option<String>,   // 预计分配的条码,None 表示池耗尽
    pub fallback_used: bool,         // 预计分配是否落在回退系列
}

// ==========================================
// AllocationEngine - 条码分配引擎
// ==========================================
pub struct AllocationEngine {
    conn: Arc<Mutex<Connection>>,
    resolver: Arc<SizeRuleResolver>,
}

impl AllocationEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, resolver: Arc<SizeRuleResolver>) -> Self {
        Self { conn, resolver }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> AllocationResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| AllocationError::Repository(RepositoryError::LockError(e.to_string())))
    }

    /// 解析尺寸,无命中时转为分配错误
    fn resolve_series(&self, dims: &Dimensions) -> AllocationResult<ResolvedSeries> {
        self.resolver
            .resolve(dims)?
            .ok_or(AllocationError::NoMatchingSizeRule {
                width_mm: dims.width_mm(),
                height_mm: dims.height_mm(),
            })
    }

    /// 自动分配: 按尺寸解析系列,在系列内占用最优条码并记台账
    ///
    /// 同一事务内完成: 关闭该书旧占用 -> 占用新条码 -> 追加台账行;
    /// 主系列耗尽且存在回退系列时,在回退系列内重试一次
    ///
    /// # 返回
    /// - Ok(AssignmentOutcome): 分配成功
    /// - Err(NoMatchingSizeRule/PoolExhausted): 业务失败,无任何状态变更
    pub fn assign_auto(
        &self,
        book_id: &str,
        dims: &Dimensions,
        actor: Option<&str>,
    ) -> AllocationResult<AssignmentOutcome> {
        let resolved = self.resolve_series(dims)?;
        let primary = resolved.series.clone();
        let alternate = alternate_series(&primary);

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        // 重登记: 先关闭该书现有占用并释放对应条码
        let reassigned = Self::close_existing_for_book(&tx, book_id, actor)?;

        // 主系列占用,耗尽则回退一次
        let (reserved, fallback_used) =
            match BarcodeCodeRepository::reserve_best_on(&tx, &primary, None)? {
                Some(code) => (code, false),
                None => match &alternate {
                    Some(alt) => match BarcodeCodeRepository::reserve_best_on(&tx, alt, None)? {
                        Some(code) => {
                            debug!(series = %primary, alternate = %alt, "主系列耗尽,回退成功");
                            (code, true)
                        }
                        None => {
                            return Err(Self::exhausted(&primary, alternate.as_deref()));
                        }
                    },
                    None => {
                        return Err(Self::exhausted(&primary, None));
                    }
                },
            };

        let assignment = AssignmentRepository::open_on(
            &tx,
            &reserved.code,
            book_id,
            actor,
            Some(&primary),
            fallback_used,
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            book_id,
            code = %reserved.code,
            series = %reserved.series,
            fallback_used,
            reassigned,
            "条码自动分配完成"
        );

        Ok(AssignmentOutcome {
            assignment_id: assignment.assignment_id,
            book_id: book_id.to_string(),
            code: reserved.code,
            series: reserved.series,
            requested_series: primary,
            fallback_used,
            band_id: resolved.band_id,
            band_name: resolved.band_name,
            position: resolved.position,
            assigned_at: assignment.assigned_at,
            reassigned,
        })
    }

    /// 指定分配: 校验候选条码后占用并记台账
    ///
    /// 校验顺序(首败即停):
    /// 1. 格式(纯解析,不触库)
    /// 2. 尺寸规则命中
    /// 3. 候选系列属于允许集合(primary + alternate)
    /// 4. 条码在池内
    /// 5. 条码可占用(状态与台账双重校验)
    pub fn assign_exact(
        &self,
        book_id: &str,
        candidate: &str,
        dims: &Dimensions,
        actor: Option<&str>,
    ) -> AllocationResult<AssignmentOutcome> {
        // 格式判定先于任何存储查询
        let parsed = parse_code(candidate).ok_or_else(|| AllocationError::MalformedCode {
            code: candidate.to_string(),
        })?;
        let normalized = parsed.full_code();

        let resolved = self.resolve_series(dims)?;
        let primary = resolved.series.clone();
        let alternate = alternate_series(&primary);

        let mut allowed = vec![primary.clone()];
        if let Some(alt) = &alternate {
            allowed.push(alt.clone());
        }
        if !allowed.contains(&parsed.letters) {
            return Err(AllocationError::SeriesMismatch {
                code: normalized,
                allowed,
            });
        }
        let fallback_used = parsed.letters != primary;

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let reassigned = Self::close_existing_for_book(&tx, book_id, actor)?;

        let row = BarcodeCodeRepository::find_by_code_on(&tx, &normalized)?.ok_or_else(|| {
            AllocationError::CodeNotInPool {
                code: normalized.clone(),
            }
        })?;
        // 状态与台账双重校验,两者任一不满足即拒绝
        if row.status != CodeStatus::Available {
            return Err(AllocationError::CodeNotAvailable { code: row.code });
        }
        if AssignmentRepository::has_open_for_code_on(&tx, &row.code)? {
            warn!(code = %row.code, "条码状态为 AVAILABLE 但存在未关闭台账行");
            return Err(AllocationError::CodeNotAvailable { code: row.code });
        }
        if !BarcodeCodeRepository::try_mark_assigned_on(&tx, row.code_id)? {
            return Err(AllocationError::CodeNotAvailable { code: row.code });
        }

        let assignment = AssignmentRepository::open_on(
            &tx,
            &row.code,
            book_id,
            actor,
            Some(&primary),
            fallback_used,
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            book_id,
            code = %row.code,
            series = %row.series,
            fallback_used,
            reassigned,
            "条码指定分配完成"
        );

        Ok(AssignmentOutcome {
            assignment_id: assignment.assignment_id,
            book_id: book_id.to_string(),
            code: row.code,
            series: row.series,
            requested_series: primary,
            fallback_used,
            band_id: resolved.band_id,
            band_name: resolved.band_name,
            position: resolved.position,
            assigned_at: assignment.assigned_at,
            reassigned,
        })
    }

    /// 按书释放: 关闭该书全部未关闭台账行并释放对应条码
    ///
    /// 幂等: 该书无占用时返回空列表,不报错
    ///
    /// # 返回
    /// - Ok(Vec<String>): 本次释放的条码列表
    pub fn release_for_book(
        &self,
        book_id: &str,
        actor: Option<&str>,
    ) -> AllocationResult<Vec<String>> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let codes = AssignmentRepository::close_all_open_for_book_on(&tx, book_id, actor)?;
        for code in &codes {
            match BarcodeCodeRepository::release_by_code_on(&tx, code) {
                Ok(_) => {}
                // 台账指向池外条码属于数据不一致,释放流程照常完成
                Err(RepositoryError::NotFound { .. }) => {
                    warn!(code = %code, "台账引用的条码不在池内,跳过释放");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        if !codes.is_empty() {
            info!(book_id, released = codes.len(), "按书释放完成");
        }
        Ok(codes)
    }

    /// 按条码释放: 关闭该条码的未关闭台账行并释放条码
    ///
    /// 幂等: 无未关闭行时仅确保条码回到 AVAILABLE
    ///
    /// # 返回
    /// - Ok(true): 关闭了台账行或条码确实处于占用
    /// - Ok(false): 本就无占用,无实际变更
    pub fn release_by_code(&self, code: &str, actor: Option<&str>) -> AllocationResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let closed = AssignmentRepository::close_open_for_code_on(&tx, code, actor)?;
        let was_assigned = BarcodeCodeRepository::release_by_code_on(&tx, code)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(code, closed, was_assigned, "按条码释放完成");
        Ok(closed > 0 || was_assigned)
    }

    /// 只读预览: 按尺寸解析并查看下一个将被分配的条码
    ///
    /// 不翻转任何状态,结果仅供展示,不构成占用承诺
    pub fn preview_best(&self, dims: &Dimensions) -> AllocationResult<PreviewOutcome> {
        let resolved = self.resolve_series(dims)?;
        let primary = resolved.series.clone();
        let alternate = alternate_series(&primary);

        let mut allowed = vec![primary.clone()];
        if let Some(alt) = &alternate {
            allowed.push(alt.clone());
        }

        let conn = self.get_conn()?;
        if let Some(code) = BarcodeCodeRepository::peek_best_on(&conn, &primary, None)? {
            return Ok(PreviewOutcome {
                requested_series: primary.clone(),
                series: primary,
                allowed,
                candidate: Some(code.code),
                fallback_used: false,
            });
        }
        if let Some(alt) = &alternate {
            if let Some(code) = BarcodeCodeRepository::peek_best_on(&conn, alt, None)? {
                return Ok(PreviewOutcome {
                    requested_series: primary,
                    series: alt.clone(),
                    allowed,
                    candidate: Some(code.code),
                    fallback_used: true,
                });
            }
        }
        Ok(PreviewOutcome {
            requested_series: primary.clone(),
            series: primary,
            allowed,
            candidate: None,
            fallback_used: false,
        })
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 关闭该书现有占用并释放对应条码,返回是否有旧占用被顶替
    fn close_existing_for_book(
        tx: &Connection,
        book_id: &str,
        actor: Option<&str>,
    ) -> AllocationResult<bool> {
        let closed = AssignmentRepository::close_all_open_for_book_on(tx, book_id, actor)?;
        for code in &closed {
            match BarcodeCodeRepository::release_by_code_on(tx, code) {
                Ok(_) => {}
                Err(RepositoryError::NotFound { .. }) => {
                    warn!(code = %code, "台账引用的条码不在池内,跳过释放");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(!closed.is_empty())
    }

    /// 构造池耗尽错误,报告原始系列与已尝试的系列集合
    fn exhausted(primary: &str, alternate: Option<&str>) -> AllocationError {
        let mut allowed = vec![primary.to_string()];
        if let Some(alt) = alternate {
            allowed.push(alt.to_string());
        }
        AllocationError::PoolExhausted {
            series: primary.to_string(),
            allowed,
        }
    }
}
