// ==========================================
// 藏书编目系统 - 尺寸规则数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑,规则匹配在引擎层
// ==========================================

use crate::domain::size_band::SizeBand;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// SizeBandRepository - 尺寸规则仓储
// ==========================================

/// 尺寸规则仓储
/// 职责: 管理 size_band 表的 CRUD 操作
pub struct SizeBandRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SizeBandRepository {
    /// 创建新的尺寸规则仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(SizeBandRepository): 仓储实例
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

    /// 在给定连接上插入一条尺寸规则(供导入事务复用)
    pub fn insert_on(conn: &Connection, band: &SizeBand) -> RepositoryResult<()> {
        let equal_heights = serde_json::to_string(&band.equal_heights_mm)
            .map_err(|e| RepositoryError::ValidationError(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO size_band (
                band_id, name, min_width_mm, max_width_mm,
                height_threshold_mm, equal_heights_mm
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                band.band_id,
                band.name,
                band.min_width_mm,
                band.max_width_mm,
                band.height_threshold_mm,
                equal_heights,
            ],
        )?;
        Ok(())
    }

    /// 新增一条尺寸规则
    pub fn create(&self, band: &SizeBand) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_on(&conn, band)
    }

    /// 按主键查询尺寸规则
    ///
    /// # 返回
    /// - Ok(Some(SizeBand)): 找到规则
    /// - Ok(None): 未找到
    /// - Err: 数据库错误
    pub fn find_by_id(&self, band_id: &str) -> RepositoryResult<Option<SizeBand>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT band_id, name, min_width_mm, max_width_mm,
                   height_threshold_mm, equal_heights_mm, created_at, updated_at
            FROM size_band
            WHERE band_id = ?1
            "#,
        )?;
        let band = stmt.query_row(params![band_id], map_band_row).optional()?;
        Ok(band)
    }

    /// 按分段名查询尺寸规则
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<SizeBand>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT band_id, name, min_width_mm, max_width_mm,
                   height_threshold_mm, equal_heights_mm, created_at, updated_at
            FROM size_band
            WHERE name = ?1
            "#,
        )?;
        let band = stmt.query_row(params![name], map_band_row).optional()?;
        Ok(band)
    }

    /// 查询全部尺寸规则,按宽度下限升序
    ///
    /// 解析引擎依赖此序做"最高命中下限"匹配
    pub fn list_all(&self) -> RepositoryResult<Vec<SizeBand>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT band_id, name, min_width_mm, max_width_mm,
                   height_threshold_mm, equal_heights_mm, created_at, updated_at
            FROM size_band
            ORDER BY min_width_mm ASC
            "#,
        )?;
        let bands = stmt
            .query_map([], map_band_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bands)
    }
}

/// 将查询行映射为 SizeBand
fn map_band_row(row: &Row<'_>) -> rusqlite::Result<SizeBand> {
    let equal_heights_raw: String = row.get(5)?;
    Ok(SizeBand {
        band_id: row.get(0)?,
        name: row.get(1)?,
        min_width_mm: row.get(2)?,
        max_width_mm: row.get(3)?,
        height_threshold_mm: row.get(4)?,
        // 等高集合以 JSON 数组存储,坏数据按空集处理
        equal_heights_mm: serde_json::from_str(&equal_heights_raw).unwrap_or_default(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
