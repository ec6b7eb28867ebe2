// ==========================================
// 藏书编目系统 - 分配台账数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 台账行只新增和关闭,永不 DELETE
// 对齐: assignment 表及其两个部分唯一索引
// ==========================================

use crate::domain::assignment::{
    Assignment, InconsistencyKind, LedgerInconsistency, LegacyMappingRow,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// assignment 表的统一查询列
const ASSIGNMENT_COLUMNS: &str =
    "assignment_id, code, book_id, assigned_at, freed_at, assigned_by, freed_by, series, fallback_used";

// ==========================================
// AssignmentRepository - 分配台账仓储
// ==========================================

/// 分配台账仓储
/// 职责: 管理 assignment 表的追加、关闭与审计查询
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    /// 创建新的台账仓储实例
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        let conn = Connection::open(&db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内复用的关联函数(接收 &Connection,可传入事务)
    // ==========================================

    /// 判断条码是否存在未关闭台账行
    pub fn has_open_for_code_on(conn: &Connection, code: &str) -> RepositoryResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM assignment WHERE code = ?1 AND freed_at IS NULL",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// 追加一条未关闭台账行
    ///
    /// 双重防御: 先查未关闭行,再依赖部分唯一索引兜底
    ///
    /// # 参数
    /// - code: 条码文本(传入已规范化的池内文本)
    /// - book_id: 书目标识
    /// - actor: 操作者
    /// - series: 解析得到的原始系列(回退前)
    /// - fallback_used: 本次分配是否走了回退系列
    ///
    /// # 返回
    /// - Ok(Assignment): 新追加的台账行
    /// - Err(CodeAlreadyAssigned): 条码已有未关闭行
    pub fn open_on(
        conn: &Connection,
        code: &str,
        book_id: &str,
        actor: Option<&str>,
        series: Option<&str>,
        fallback_used: bool,
    ) -> RepositoryResult<Assignment> {
        if Self::has_open_for_code_on(conn, code)? {
            return Err(RepositoryError::CodeAlreadyAssigned {
                code: code.to_string(),
            });
        }

        let assignment_id = Uuid::new_v4().to_string();
        let assigned_at = now_str();
        conn.execute(
            r#"
            INSERT INTO assignment (
                assignment_id, code, book_id, assigned_at,
                assigned_by, series, fallback_used
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                assignment_id,
                code,
                book_id,
                assigned_at,
                actor,
                series,
                fallback_used as i32,
            ],
        )?;

        Ok(Assignment {
            assignment_id,
            code: code.to_string(),
            book_id: book_id.to_string(),
            assigned_at: parse_datetime(&assigned_at),
            freed_at: None,
            assigned_by: actor.map(|s| s.to_string()),
            freed_by: None,
            series: series.map(|s| s.to_string()),
            fallback_used,
        })
    }

    /// 关闭条码的未关闭台账行
    ///
    /// # 返回
    /// - Ok(usize): 关闭的行数(0 或 1)
    pub fn close_open_for_code_on(
        conn: &Connection,
        code: &str,
        actor: Option<&str>,
    ) -> RepositoryResult<usize> {
        let affected = conn.execute(
            r#"
            UPDATE assignment
            SET freed_at = ?2, freed_by = ?3
            WHERE code = ?1 AND freed_at IS NULL
            "#,
            params![code, now_str(), actor],
        )?;
        Ok(affected)
    }

    /// 关闭书目的全部未关闭台账行,返回涉及的条码
    pub fn close_all_open_for_book_on(
        conn: &Connection,
        book_id: &str,
        actor: Option<&str>,
    ) -> RepositoryResult<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT code FROM assignment WHERE book_id = ?1 AND freed_at IS NULL")?;
        let codes = stmt
            .query_map(params![book_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        if !codes.is_empty() {
            conn.execute(
                r#"
                UPDATE assignment
                SET freed_at = ?2, freed_by = ?3
                WHERE book_id = ?1 AND freed_at IS NULL
                "#,
                params![book_id, now_str(), actor],
            )?;
        }
        Ok(codes)
    }

    /// 查询书目当前的未关闭台账行
    pub fn find_open_for_book_on(
        conn: &Connection,
        book_id: &str,
    ) -> RepositoryResult<Option<Assignment>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignment WHERE book_id = ?1 AND freed_at IS NULL"
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_row(params![book_id], map_assignment_row)
            .optional()?;
        Ok(found)
    }

    // ==========================================
    // 实例方法
    // ==========================================

    /// 查询书目当前的未关闭台账行
    pub fn find_open_for_book(&self, book_id: &str) -> RepositoryResult<Option<Assignment>> {
        let conn = self.get_conn()?;
        Self::find_open_for_book_on(&conn, book_id)
    }

    /// 查询条码当前的未关闭台账行
    pub fn find_open_for_code(&self, code: &str) -> RepositoryResult<Option<Assignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignment WHERE code = ?1 AND freed_at IS NULL"
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_row(params![code], map_assignment_row)
            .optional()?;
        Ok(found)
    }

    /// 查询书目的完整分配历史,新记录在前
    pub fn find_by_book(&self, book_id: &str, limit: i64) -> RepositoryResult<Vec<Assignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM assignment
            WHERE book_id = ?1
            ORDER BY assigned_at DESC, assignment_id DESC
            LIMIT ?2
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![book_id, limit], map_assignment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 列出全部未关闭台账行
    pub fn list_open(&self, limit: i64) -> RepositoryResult<Vec<Assignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM assignment
            WHERE freed_at IS NULL
            ORDER BY assigned_at DESC, assignment_id DESC
            LIMIT ?1
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit], map_assignment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 旧版"书目-条码"映射投影(只读,由未关闭行派生)
    pub fn legacy_mapping(&self) -> RepositoryResult<Vec<LegacyMappingRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT book_id, code
            FROM assignment
            WHERE freed_at IS NULL
            ORDER BY book_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LegacyMappingRow {
                    book_id: row.get(0)?,
                    code: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 关闭条码的未关闭台账行(独立调用)
    pub fn close_open_for_code(&self, code: &str, actor: Option<&str>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Self::close_open_for_code_on(&conn, code, actor)
    }

    /// 扫描台账与条码池之间的不一致
    ///
    /// 只报告,不修复:
    /// 1. 未关闭台账行对应的条码状态不是 ASSIGNED
    /// 2. 状态为 ASSIGNED 的条码没有任何未关闭台账行
    pub fn scan_inconsistencies(&self) -> RepositoryResult<Vec<LedgerInconsistency>> {
        let conn = self.get_conn()?;
        let mut findings = Vec::new();

        let mut stmt = conn.prepare(
            r#"
            SELECT a.assignment_id, a.code, a.book_id, b.status
            FROM assignment a
            LEFT JOIN barcode_code b ON b.code = a.code
            WHERE a.freed_at IS NULL
              AND (b.status IS NULL OR b.status != 'ASSIGNED')
            ORDER BY a.code ASC
            "#,
        )?;
        let open_mismatches = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (assignment_id, code, book_id, status) in open_mismatches {
            let detail = match status {
                Some(s) => format!("未关闭台账行指向的条码状态为 {s},应为 ASSIGNED"),
                None => "未关闭台账行指向的条码不在池内".to_string(),
            };
            findings.push(LedgerInconsistency {
                kind: InconsistencyKind::OpenAssignmentCodeNotAssigned,
                code,
                book_id: Some(book_id),
                assignment_id: Some(assignment_id),
                detail,
            });
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT b.code
            FROM barcode_code b
            WHERE b.status = 'ASSIGNED'
              AND NOT EXISTS (
                  SELECT 1 FROM assignment a
                  WHERE a.code = b.code AND a.freed_at IS NULL
              )
            ORDER BY b.code ASC
            "#,
        )?;
        let orphan_codes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for code in orphan_codes {
            findings.push(LedgerInconsistency {
                kind: InconsistencyKind::AssignedCodeWithoutOpenAssignment,
                code,
                book_id: None,
                assignment_id: None,
                detail: "条码状态为 ASSIGNED,但没有对应的未关闭台账行".to_string(),
            });
        }

        Ok(findings)
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 当前本地时间的台账时间戳
fn now_str() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 解析台账时间戳,坏数据回退到纪元零点
fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_else(|_| {
        chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    })
}

/// 将查询行映射为 Assignment
fn map_assignment_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    let freed_raw: Option<String> = row.get(4)?;
    Ok(Assignment {
        assignment_id: row.get(0)?,
        code: row.get(1)?,
        book_id: row.get(2)?,
        assigned_at: parse_datetime(&row.get::<_, String>(3)?),
        freed_at: freed_raw.map(|s| parse_datetime(&s)),
        assigned_by: row.get(5)?,
        freed_by: row.get(6)?,
        series: row.get(7)?,
        fallback_used: row.get::<_, i32>(8)? == 1,
    })
}
