// ==========================================
// 藏书编目系统 - 条码池数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 状态翻转一律走 CAS(条件 UPDATE),不做盲写
// 约定: code/series 入库前规范化为小写,code 列 NOCASE 唯一
// ==========================================

use crate::domain::barcode::{BarcodeCode, SeriesStats};
use crate::domain::types::CodeStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

/// barcode_code 表的统一查询列
const CODE_COLUMNS: &str =
    "code_id, code, series, band_id, status, rank_in_series, created_at, updated_at";

// ==========================================
// BarcodeCodeRepository - 条码池仓储
// ==========================================

/// 条码池仓储
/// 职责: 管理 barcode_code 表的查询与状态翻转
pub struct BarcodeCodeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BarcodeCodeRepository {
    /// 创建新的条码池仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(BarcodeCodeRepository): 仓储实例
    /// - Err: 数据库连接错误
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

    /// 按条码文本查询(NOCASE 列,大小写不敏感)
    pub fn find_by_code_on(conn: &Connection, code: &str) -> RepositoryResult<Option<BarcodeCode>> {
        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM barcode_code WHERE code = ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_row(params![code.trim()], map_code_row)
            .optional()?;
        Ok(found)
    }

    /// 查询系列内空闲候选,按分配优先序排列
    ///
    /// 排序: rank_in_series 升序(空值排最后) -> code 升序 -> code_id 升序
    ///
    /// # 参数
    /// - series: 系列名(小写)
    /// - prefix: 可选的条码前缀过滤
    /// - limit: 返回上限,None 表示不限
    pub fn pick_candidates_on(
        conn: &Connection,
        series: &str,
        prefix: Option<&str>,
        limit: Option<i64>,
    ) -> RepositoryResult<Vec<BarcodeCode>> {
        let sql = format!(
            r#"
            SELECT {CODE_COLUMNS}
            FROM barcode_code
            WHERE series = ?1
              AND status = 'AVAILABLE'
              AND (?2 IS NULL OR code LIKE ?2 || '%')
            ORDER BY
                CASE WHEN rank_in_series IS NULL THEN 1 ELSE 0 END ASC,
                rank_in_series ASC,
                code ASC,
                code_id ASC
            LIMIT COALESCE(?3, -1)
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let candidates = stmt
            .query_map(params![series.to_lowercase(), prefix, limit], map_code_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    /// CAS 占用: 仅当仍为 AVAILABLE 时翻转为 ASSIGNED
    ///
    /// # 返回
    /// - Ok(true): 本次调用完成了翻转
    /// - Ok(false): 条码已不处于 AVAILABLE(被并发占用或不存在)
    pub fn try_mark_assigned_on(conn: &Connection, code_id: i64) -> RepositoryResult<bool> {
        let affected = conn.execute(
            r#"
            UPDATE barcode_code
            SET status = 'ASSIGNED', updated_at = datetime('now')
            WHERE code_id = ?1 AND status = 'AVAILABLE'
            "#,
            params![code_id],
        )?;
        Ok(affected == 1)
    }

    /// 无条件释放: 翻回 AVAILABLE,重复释放无副作用
    ///
    /// # 返回
    /// - Ok(true): 释放前处于 ASSIGNED
    /// - Ok(false): 释放前已是 AVAILABLE
    /// - Err(NotFound): 条码不在池内
    pub fn release_by_code_on(conn: &Connection, code: &str) -> RepositoryResult<bool> {
        let found = Self::find_by_code_on(conn, code)?;
        let row = found.ok_or_else(|| RepositoryError::NotFound {
            entity: "BarcodeCode".to_string(),
            id: code.to_string(),
        })?;
        let was_assigned = row.status == CodeStatus::Assigned;
        conn.execute(
            r#"
            UPDATE barcode_code
            SET status = 'AVAILABLE', updated_at = datetime('now')
            WHERE code_id = ?1
            "#,
            params![row.code_id],
        )?;
        Ok(was_assigned)
    }

    /// 在系列内按优先序占用首个可占用条码
    ///
    /// 逐个候选做 CAS,第一个翻转成功者即中选;
    /// 需在事务内调用以保证候选快照与翻转的一致性
    ///
    /// # 返回
    /// - Ok(Some(BarcodeCode)): 占用成功,返回占用后的条码
    /// - Ok(None): 系列内无可占用条码(池耗尽)
    pub fn reserve_best_on(
        conn: &Connection,
        series: &str,
        prefix: Option<&str>,
    ) -> RepositoryResult<Option<BarcodeCode>> {
        let candidates = Self::pick_candidates_on(conn, series, prefix, None)?;
        for candidate in candidates {
            if Self::try_mark_assigned_on(conn, candidate.code_id)? {
                return Ok(Some(BarcodeCode {
                    status: CodeStatus::Assigned,
                    ..candidate
                }));
            }
        }
        Ok(None)
    }

    /// 占用指定条码
    ///
    /// # 返回
    /// - Ok(BarcodeCode): 占用成功
    /// - Err(NotFound): 条码不在池内
    /// - Err(CodeAlreadyAssigned): 条码已被占用(含 CAS 竞争失败)
    pub fn reserve_exact_on(conn: &Connection, code: &str) -> RepositoryResult<BarcodeCode> {
        let found = Self::find_by_code_on(conn, code)?;
        let row = found.ok_or_else(|| RepositoryError::NotFound {
            entity: "BarcodeCode".to_string(),
            id: code.to_string(),
        })?;
        if row.status != CodeStatus::Available {
            return Err(RepositoryError::CodeAlreadyAssigned {
                code: row.code.clone(),
            });
        }
        if !Self::try_mark_assigned_on(conn, row.code_id)? {
            return Err(RepositoryError::CodeAlreadyAssigned {
                code: row.code.clone(),
            });
        }
        Ok(BarcodeCode {
            status: CodeStatus::Assigned,
            ..row
        })
    }

    /// 只读查看系列内下一个将被分配的条码,不翻转状态
    pub fn peek_best_on(
        conn: &Connection,
        series: &str,
        prefix: Option<&str>,
    ) -> RepositoryResult<Option<BarcodeCode>> {
        let mut candidates = Self::pick_candidates_on(conn, series, prefix, Some(1))?;
        Ok(candidates.pop())
    }

    // ==========================================
    // 实例方法(自带锁与事务)
    // ==========================================

    /// 插入单个条码
    pub fn insert(&self, code: &BarcodeCode) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_on(&conn, code)
    }

    /// 在给定连接上插入条码(供导入事务复用)
    ///
    /// 红线: 用普通 INSERT 而非 INSERT OR REPLACE,
    /// REPLACE 会把已占用条码重置回 AVAILABLE
    pub fn insert_on(conn: &Connection, code: &BarcodeCode) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO barcode_code (code, series, band_id, status, rank_in_series)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                code.code.trim().to_lowercase(),
                code.series.trim().to_lowercase(),
                code.band_id,
                code.status.to_db_str(),
                code.rank_in_series,
            ],
        )?;
        Ok(())
    }

    /// 批量插入条码
    ///
    /// # 返回
    /// - Ok(usize): 成功插入的记录数
    /// - Err: 数据库错误(任一失败则整批回滚)
    pub fn batch_insert(&self, codes: Vec<BarcodeCode>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for code in &codes {
            Self::insert_on(&tx, code)?;
            count += 1;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    /// 按条码文本查询
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<BarcodeCode>> {
        let conn = self.get_conn()?;
        Self::find_by_code_on(&conn, code)
    }

    /// 按主键查询
    pub fn find_by_id(&self, code_id: i64) -> RepositoryResult<Option<BarcodeCode>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM barcode_code WHERE code_id = ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt.query_row(params![code_id], map_code_row).optional()?;
        Ok(found)
    }

    /// 按系列列出条码,按分配优先序排列
    ///
    /// # 参数
    /// - series: 系列名
    /// - status: 可选的状态过滤
    /// - limit: 返回上限
    pub fn list_by_series(
        &self,
        series: &str,
        status: Option<CodeStatus>,
        limit: i64,
    ) -> RepositoryResult<Vec<BarcodeCode>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {CODE_COLUMNS}
            FROM barcode_code
            WHERE series = ?1
              AND (?2 IS NULL OR status = ?2)
            ORDER BY
                CASE WHEN rank_in_series IS NULL THEN 1 ELSE 0 END ASC,
                rank_in_series ASC,
                code ASC,
                code_id ASC
            LIMIT ?3
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let codes = stmt
            .query_map(
                params![
                    series.to_lowercase(),
                    status.map(|s| s.to_db_str()),
                    limit
                ],
                map_code_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    /// 按系列汇总库存,low_stock 按传入阈值判定
    pub fn series_stats(&self, low_stock_threshold: i64) -> RepositoryResult<Vec<SeriesStats>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT series,
                   COUNT(*) AS total,
                   SUM(CASE WHEN status = 'AVAILABLE' THEN 1 ELSE 0 END) AS available,
                   SUM(CASE WHEN status = 'ASSIGNED' THEN 1 ELSE 0 END) AS assigned
            FROM barcode_code
            GROUP BY series
            ORDER BY series ASC
            "#,
        )?;
        let stats = stmt
            .query_map([], |row| {
                let available: i64 = row.get(2)?;
                Ok(SeriesStats {
                    series: row.get(0)?,
                    total: row.get(1)?,
                    available,
                    assigned: row.get(3)?,
                    low_stock: available < low_stock_threshold,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// 统计系列内空闲条码数
    pub fn count_available(&self, series: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM barcode_code WHERE series = ?1 AND status = 'AVAILABLE'",
            params![series.to_lowercase()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 在系列内占用首个可占用条码(独立事务)
    pub fn reserve_best(
        &self,
        series: &str,
        prefix: Option<&str>,
    ) -> RepositoryResult<Option<BarcodeCode>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let reserved = Self::reserve_best_on(&tx, series, prefix)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(reserved)
    }

    /// 占用指定条码(独立事务)
    pub fn reserve_exact(&self, code: &str) -> RepositoryResult<BarcodeCode> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let reserved = Self::reserve_exact_on(&tx, code)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(reserved)
    }

    /// 释放指定条码(独立事务,幂等)
    ///
    /// # 返回
    /// - Ok(true): 释放前处于 ASSIGNED
    /// - Ok(false): 释放前已是 AVAILABLE
    pub fn release(&self, code: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let was_assigned = Self::release_by_code_on(&tx, code)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(was_assigned)
    }

    /// 按内部标识释放(独立事务,幂等)
    pub fn release_by_id(&self, code_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM barcode_code WHERE code_id = ?1"
        );
        let found = tx
            .prepare(&sql)?
            .query_row(params![code_id], map_code_row)
            .optional()?;
        let row = found.ok_or_else(|| RepositoryError::NotFound {
            entity: "BarcodeCode".to_string(),
            id: code_id.to_string(),
        })?;
        let was_assigned = row.status == CodeStatus::Assigned;
        tx.execute(
            r#"
            UPDATE barcode_code
            SET status = 'AVAILABLE', updated_at = datetime('now')
            WHERE code_id = ?1
            "#,
            params![code_id],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(was_assigned)
    }

    /// 只读查看系列内下一个将被分配的条码
    pub fn peek_best(
        &self,
        series: &str,
        prefix: Option<&str>,
    ) -> RepositoryResult<Option<BarcodeCode>> {
        let conn = self.get_conn()?;
        Self::peek_best_on(&conn, series, prefix)
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 将查询行映射为 BarcodeCode
fn map_code_row(row: &Row<'_>) -> rusqlite::Result<BarcodeCode> {
    let status_raw: String = row.get(4)?;
    let status = CodeStatus::from_db_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("无效的条码状态: {status_raw}").into(),
        )
    })?;
    Ok(BarcodeCode {
        code_id: row.get(0)?,
        code: row.get(1)?,
        series: row.get(2)?,
        band_id: row.get(3)?,
        status,
        rank_in_series: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
