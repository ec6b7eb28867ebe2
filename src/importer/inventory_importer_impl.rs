// ==========================================
// 藏书编目系统 - 库存数据导入器实现
// ==========================================
// 职责: 整合导入流程,从 CSV 文件到数据库
// 流程: 解析 → 逐行校验与转换 → 落库(事务化) → 汇总
// ==========================================

use crate::domain::barcode::BarcodeCode;
use crate::domain::import_report::{ImportSummary, RowViolation};
use crate::domain::size_band::SizeBand;
use crate::domain::types::CodeStatus;
use crate::engine::code_parser::parse_code;
use crate::importer::error::ImportError;
use crate::importer::file_parser::CsvParser;
use crate::importer::inventory_importer_trait::InventoryImporter;
use crate::repository::{BarcodeCodeRepository, RepositoryError, SizeBandRepository};
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// InventoryImporterImpl - 库存数据导入器实现
// ==========================================
pub struct InventoryImporterImpl {
    // 共享数据库连接
    conn: Arc<Mutex<Connection>>,

    // 文件解析器
    file_parser: CsvParser,
}

impl InventoryImporterImpl {
    /// 创建新的 InventoryImporter 实例
    ///
    /// # 参数
    /// - conn: 共享数据库连接
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            file_parser: CsvParser,
        }
    }
}

#[async_trait::async_trait]
impl InventoryImporter for InventoryImporterImpl {
    /// 从 CSV 文件导入尺寸规则
    ///
    /// 列: band_id, name, min_width_mm, height_threshold_mm
    ///     (可选) max_width_mm, equal_heights_mm(竖线分隔,如 "205|210|215")
    #[instrument(skip(self, file_path))]
    async fn import_size_bands<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportSummary, Box<dyn Error>> {
        use std::time::Instant;
        let start_time = Instant::now();

        let file_path_str = file_path.as_ref().to_str().unwrap_or("unknown");
        info!(file_path = %file_path_str, "开始导入尺寸规则");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let raw_rows = self
            .file_parser
            .parse_to_raw_records(file_path.as_ref())
            .map_err(|e| {
                error!(error = %e, "文件解析失败");
                format!("文件解析失败: {}", e)
            })?;

        let total_rows = raw_rows.len();
        info!(total_rows = total_rows, "文件解析完成");

        // === 步骤 2: 逐行校验与转换 ===
        debug!("步骤 2: 字段校验与类型转换");
        let mut bands = Vec::new();
        let mut violations = Vec::new();
        for (idx, row) in raw_rows.into_iter().enumerate() {
            let row_number = idx + 1;
            match map_band_record(&row, row_number) {
                Ok(band) => bands.push((row_number, band)),
                Err(e) => {
                    warn!(row_number = row_number, error = %e, "尺寸规则行校验失败");
                    violations.push(row_violation_from(row_number, e));
                }
            }
        }
        info!(
            valid = bands.len(),
            failed = violations.len(),
            "字段校验完成"
        );

        // === 步骤 3: 事务化落库 ===
        // 重复档位不阻断文件,记为违规后继续
        debug!("步骤 3: 事务化落库");
        let mut inserted = 0usize;
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.unchecked_transaction()?;

        for (row_number, band) in bands {
            match SizeBandRepository::insert_on(&tx, &band) {
                Ok(()) => inserted += 1,
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    warn!(row_number = row_number, band_id = %band.band_id, "尺寸规则重复,跳过");
                    violations.push(RowViolation {
                        row: row_number,
                        field: Some("band_id".to_string()),
                        message: format!("尺寸规则重复: {}", band.band_id),
                    });
                }
                Err(e) => {
                    error!(error = %e, "尺寸规则落库失败");
                    return Err(Box::new(e));
                }
            }
        }

        tx.commit()?;

        let skipped = violations.len();
        info!(
            total = total_rows,
            inserted = inserted,
            skipped = skipped,
            elapsed_ms = start_time.elapsed().as_millis(),
            "尺寸规则导入完成"
        );

        Ok(ImportSummary {
            total_rows,
            inserted,
            skipped,
            violations,
        })
    }

    /// 从 CSV 文件导入条码库存
    ///
    /// 列: code
    ///     (可选) rank_in_series, band_id
    /// 系列名由条码字母前缀派生,新条码一律 AVAILABLE
    #[instrument(skip(self, file_path))]
    async fn import_barcodes<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportSummary, Box<dyn Error>> {
        use std::time::Instant;
        let start_time = Instant::now();

        let file_path_str = file_path.as_ref().to_str().unwrap_or("unknown");
        info!(file_path = %file_path_str, "开始导入条码库存");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let raw_rows = self
            .file_parser
            .parse_to_raw_records(file_path.as_ref())
            .map_err(|e| {
                error!(error = %e, "文件解析失败");
                format!("文件解析失败: {}", e)
            })?;

        let total_rows = raw_rows.len();
        info!(total_rows = total_rows, "文件解析完成");

        // === 步骤 2: 逐行校验与转换 ===
        // 格式非法的条码在此拦截,不触达数据库
        debug!("步骤 2: 字段校验与类型转换");
        let mut codes = Vec::new();
        let mut violations = Vec::new();
        for (idx, row) in raw_rows.into_iter().enumerate() {
            let row_number = idx + 1;
            match map_code_record(&row, row_number) {
                Ok(code) => codes.push((row_number, code)),
                Err(e) => {
                    warn!(row_number = row_number, error = %e, "条码行校验失败");
                    violations.push(row_violation_from(row_number, e));
                }
            }
        }
        info!(
            valid = codes.len(),
            failed = violations.len(),
            "字段校验完成"
        );

        // === 步骤 3: 事务化落库 ===
        // 重复条码(含同文件内重复)由唯一约束拦截,记为违规后继续
        debug!("步骤 3: 事务化落库");
        let mut inserted = 0usize;
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.unchecked_transaction()?;

        for (row_number, code) in codes {
            match BarcodeCodeRepository::insert_on(&tx, &code) {
                Ok(()) => inserted += 1,
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    warn!(row_number = row_number, code = %code.code, "条码重复,跳过");
                    violations.push(RowViolation {
                        row: row_number,
                        field: Some("code".to_string()),
                        message: format!("条码重复: {}", code.code),
                    });
                }
                Err(e) => {
                    error!(error = %e, "条码落库失败");
                    return Err(Box::new(e));
                }
            }
        }

        tx.commit()?;

        let skipped = violations.len();
        info!(
            total = total_rows,
            inserted = inserted,
            skipped = skipped,
            elapsed_ms = start_time.elapsed().as_millis(),
            "条码库存导入完成"
        );

        Ok(ImportSummary {
            total_rows,
            inserted,
            skipped,
            violations,
        })
    }

    /// 批量导入多个条码文件（并发执行）
    async fn batch_import_barcodes<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Result<Vec<Result<ImportSummary, String>>, Box<dyn Error>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入条码文件");

        // 为每个文件创建导入任务
        let import_tasks = file_paths.into_iter().map(|path| {
            let path_str = path.as_ref().to_str().unwrap_or("unknown").to_string();
            async move {
                info!(file = %path_str, "开始导入文件");
                match self.import_barcodes(path).await {
                    Ok(summary) => {
                        info!(
                            file = %path_str,
                            inserted = summary.inserted,
                            "文件导入成功"
                        );
                        Ok(summary)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        // 并发执行所有导入任务
        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        Ok(results)
    }
}

// ==========================================
// 行映射辅助函数
// ==========================================

/// 取必填字段(缺失或空白视为映射失败)
fn required_field<'a>(
    row: &'a HashMap<String, String>,
    key: &str,
    row_number: usize,
) -> Result<&'a str, ImportError> {
    match row.get(key).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ImportError::FieldMappingError {
            row: row_number,
            message: format!("缺少必填字段: {}", key),
        }),
    }
}

/// 取可选字段(缺失或空白视为 None)
fn optional_field<'a>(row: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    row.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// 解析整数字段
fn parse_i64_field(value: &str, field: &str, row_number: usize) -> Result<i64, ImportError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ImportError::TypeConversionError {
            row: row_number,
            field: field.to_string(),
            message: format!("无法解析为整数: {}", value),
        })
}

/// 将一行原始记录映射为尺寸规则
fn map_band_record(
    row: &HashMap<String, String>,
    row_number: usize,
) -> Result<SizeBand, ImportError> {
    let band_id = required_field(row, "band_id", row_number)?.to_string();
    let name = required_field(row, "name", row_number)?.to_string();
    let min_width_mm = parse_i64_field(
        required_field(row, "min_width_mm", row_number)?,
        "min_width_mm",
        row_number,
    )?;

    let max_width_mm = match optional_field(row, "max_width_mm") {
        Some(v) => Some(parse_i64_field(v, "max_width_mm", row_number)?),
        None => None,
    };

    let height_threshold_mm = parse_i64_field(
        required_field(row, "height_threshold_mm", row_number)?,
        "height_threshold_mm",
        row_number,
    )?;

    // 等高集合竖线分隔,留空表示无
    let equal_heights_mm = match optional_field(row, "equal_heights_mm") {
        Some(raw) => raw
            .split('|')
            .map(|part| parse_i64_field(part, "equal_heights_mm", row_number))
            .collect::<Result<Vec<i64>, ImportError>>()?,
        None => Vec::new(),
    };

    Ok(SizeBand {
        band_id,
        name,
        min_width_mm,
        max_width_mm,
        height_threshold_mm,
        equal_heights_mm,
        created_at: None,
        updated_at: None,
    })
}

/// 将一行原始记录映射为条码条目
fn map_code_record(
    row: &HashMap<String, String>,
    row_number: usize,
) -> Result<BarcodeCode, ImportError> {
    let raw_code = required_field(row, "code", row_number)?;
    let parsed = parse_code(raw_code).ok_or_else(|| ImportError::TypeConversionError {
        row: row_number,
        field: "code".to_string(),
        message: format!("条码格式无效: {}", raw_code),
    })?;

    let rank_in_series = match optional_field(row, "rank_in_series") {
        Some(v) => Some(parse_i64_field(v, "rank_in_series", row_number)?),
        None => None,
    };

    let band_id = optional_field(row, "band_id").map(|v| v.to_string());

    Ok(BarcodeCode {
        code_id: 0, // 由数据库自增分配
        code: parsed.full_code(),
        series: parsed.letters,
        band_id,
        status: CodeStatus::Available,
        rank_in_series,
        created_at: None,
        updated_at: None,
    })
}

/// 将导入错误降级为行级违规(不阻断文件)
fn row_violation_from(row_number: usize, err: ImportError) -> RowViolation {
    match err {
        ImportError::TypeConversionError {
            row,
            field,
            message,
        } => RowViolation {
            row,
            field: Some(field),
            message,
        },
        ImportError::FieldMappingError { row, message } => RowViolation {
            row,
            field: None,
            message,
        },
        other => RowViolation {
            row: row_number,
            field: None,
            message: other.to_string(),
        },
    }
}
