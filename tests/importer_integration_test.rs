// ==========================================
// 库存导入集成测试
// ==========================================
// 验证: CSV 导入尺寸规则与条码、逐行违规收集、重复跳过、批量并发导入
// ==========================================


use book_barcode_inventory::db;
use book_barcode_inventory::importer::{InventoryImporter, InventoryImporterImpl};
use book_barcode_inventory::logging;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};
use test_helpers::create_test_db;

fn setup_importer() -> (NamedTempFile, Arc<Mutex<Connection>>, InventoryImporterImpl) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = Arc::new(Mutex::new(
        db::open_sqlite_connection(&db_path).expect("打开数据库失败"),
    ));
    let importer = InventoryImporterImpl::new(conn.clone());
    (temp_file, conn, importer)
}

fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("写入测试 CSV 失败");
    path
}

#[tokio::test]
async fn test_import_size_bands_from_csv() {
    logging::init_test();
    let (_temp_file, conn, importer) = setup_importer();
    let dir = tempfile::tempdir().expect("创建临时目录失败");

    let bands_path = write_csv(
        &dir,
        "bands.csv",
        "band_id,name,min_width_mm,max_width_mm,height_threshold_mm,equal_heights_mm\n\
         B-GK,gk,100,130,200,205|210|215\n\
         B-HK,hk,130,,200,\n",
    );

    // 1. 首次导入: 全部入库
    let summary = importer
        .import_size_bands(&bands_path)
        .await
        .expect("导入应成功");
    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.skipped, 0);
    assert!(summary.violations.is_empty());

    // 2. 落库内容核对
    {
        let guard = conn.lock().unwrap();
        let (min_width, max_width, equal_heights): (i64, Option<i64>, String) = guard
            .query_row(
                "SELECT min_width_mm, max_width_mm, equal_heights_mm
                 FROM size_band WHERE band_id = 'B-GK'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("查询分段失败");
        assert_eq!(min_width, 100);
        assert_eq!(max_width, Some(130));
        assert_eq!(equal_heights, "[205,210,215]");

        let max_width: Option<i64> = guard
            .query_row(
                "SELECT max_width_mm FROM size_band WHERE band_id = 'B-HK'",
                [],
                |row| row.get(0),
            )
            .expect("查询分段失败");
        assert!(max_width.is_none(), "空上界落库为 NULL");
    }

    // 3. 重复导入同一文件: 全部按重复跳过,不报错
    let summary = importer
        .import_size_bands(&bands_path)
        .await
        .expect("重复导入应成功返回");
    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.violations.len(), 2);
    assert!(summary.violations[0].message.contains("尺寸规则重复"));

    println!("✅ 尺寸规则导入测试通过");
}

#[tokio::test]
async fn test_import_size_bands_collects_row_violations() {
    logging::init_test();
    let (_temp_file, conn, importer) = setup_importer();
    let dir = tempfile::tempdir().expect("创建临时目录失败");

    // 行 1 缺必填下限,行 2 阈值非数字,行 3 合法
    let bands_path = write_csv(
        &dir,
        "bands_bad.csv",
        "band_id,name,min_width_mm,height_threshold_mm\n\
         B-EK,ek,,200\n\
         B-GK,gk,100,abc\n\
         B-HK,hk,130,200\n",
    );

    let summary = importer
        .import_size_bands(&bands_path)
        .await
        .expect("导入应成功返回");
    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.violations.len(), 2);

    // 违规行号按数据行计(从 1 起)
    assert_eq!(summary.violations[0].row, 1);
    assert!(summary.violations[0].field.is_none(), "缺字段类违规不定位到字段");
    assert_eq!(summary.violations[1].row, 2);
    assert_eq!(
        summary.violations[1].field.as_deref(),
        Some("height_threshold_mm")
    );

    // 合法行照常入库
    {
        let guard = conn.lock().unwrap();
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM size_band", [], |row| row.get(0))
            .expect("统计失败");
        assert_eq!(count, 1, "只有合法行入库");
    }

    println!("✅ 尺寸规则违规收集测试通过");
}

#[tokio::test]
async fn test_import_barcodes_with_duplicates_and_malformed() {
    logging::init_test();
    let (_temp_file, conn, importer) = setup_importer();
    let dir = tempfile::tempdir().expect("创建临时目录失败");

    // 先建档尺寸规则,条码的 band_id 外键才有归属
    let bands_path = write_csv(
        &dir,
        "bands.csv",
        "band_id,name,min_width_mm,height_threshold_mm,equal_heights_mm\n\
         B-GK,gk,100,200,205|210|215\n",
    );
    importer
        .import_size_bands(&bands_path)
        .await
        .expect("分段导入应成功");

    // 行 4 无数字后缀非法,行 6 与行 1 重复(仅排位不同)
    let codes_path = write_csv(
        &dir,
        "codes.csv",
        "code,rank_in_series,band_id\n\
         lgk001,1,B-GK\n\
         lgk002,2,B-GK\n\
         LGK003,3,\n\
         abc,,\n\
         dgk001,1,B-GK\n\
         lgk001,9,\n",
    );

    let summary = importer
        .import_barcodes(&codes_path)
        .await
        .expect("条码导入应成功返回");
    assert_eq!(summary.total_rows, 6);
    assert_eq!(summary.inserted, 4);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.violations.len(), 2);

    assert_eq!(summary.violations[0].row, 4);
    assert_eq!(summary.violations[0].field.as_deref(), Some("code"));
    assert!(summary.violations[0].message.contains("条码格式无效"));
    assert_eq!(summary.violations[1].row, 6);
    assert!(summary.violations[1].message.contains("条码重复"));

    // 落库核对: 大写归一、系列由字母前缀推导、首行排位保留
    {
        let guard = conn.lock().unwrap();
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM barcode_code", [], |row| row.get(0))
            .expect("统计失败");
        assert_eq!(count, 4);

        let (series, status): (String, String) = guard
            .query_row(
                "SELECT series, status FROM barcode_code WHERE code = 'lgk003'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("大写输入应归一为小写入库");
        assert_eq!(series, "lgk");
        assert_eq!(status, "AVAILABLE");

        let series: String = guard
            .query_row(
                "SELECT series FROM barcode_code WHERE code = 'dgk001'",
                [],
                |row| row.get(0),
            )
            .expect("查询失败");
        assert_eq!(series, "dgk");

        let rank: Option<i64> = guard
            .query_row(
                "SELECT rank_in_series FROM barcode_code WHERE code = 'lgk001'",
                [],
                |row| row.get(0),
            )
            .expect("查询失败");
        assert_eq!(rank, Some(1), "重复行不得覆盖已入库的排位");
    }

    // 跨文件重复: 单独文件再导一次 lgk002
    let repeat_path = write_csv(
        &dir,
        "codes_repeat.csv",
        "code,rank_in_series\nlgk002,5\n",
    );
    let summary = importer
        .import_barcodes(&repeat_path)
        .await
        .expect("导入应成功返回");
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.violations[0].row, 1);

    println!("✅ 条码导入去重与违规测试通过");
}

#[tokio::test]
async fn test_import_barcodes_file_level_errors() {
    logging::init_test();
    let (_temp_file, _conn, importer) = setup_importer();
    let dir = tempfile::tempdir().expect("创建临时目录失败");

    // 1. 文件不存在: 整体失败
    let missing = dir.path().join("no_such.csv");
    let result = importer.import_barcodes(&missing).await;
    match result {
        Err(e) => assert!(e.to_string().contains("文件解析失败"), "实际: {}", e),
        Ok(_) => panic!("缺失文件必须导入失败"),
    }

    // 2. 扩展名不支持: 整体失败
    let wrong_ext = write_csv(&dir, "codes.xlsx", "code\nlgk001\n");
    let result = importer.import_barcodes(&wrong_ext).await;
    match result {
        Err(e) => assert!(e.to_string().contains("仅支持 .csv"), "实际: {}", e),
        Ok(_) => panic!("非 CSV 扩展名必须导入失败"),
    }

    println!("✅ 文件级错误测试通过");
}

#[tokio::test]
async fn test_batch_import_barcodes() {
    logging::init_test();
    let (_temp_file, conn, importer) = setup_importer();
    let dir = tempfile::tempdir().expect("创建临时目录失败");

    let file_a = write_csv(
        &dir,
        "codes_a.csv",
        "code,rank_in_series\nlgk001,1\nlgk002,2\n",
    );
    let file_b = write_csv(&dir, "codes_b.csv", "code,rank_in_series\ndgk001,1\n");
    let missing = dir.path().join("codes_missing.csv");

    // 批量导入: 单文件失败不拖垮整批,结果按输入顺序返回
    let results = importer
        .batch_import_barcodes(vec![file_a, file_b, missing])
        .await
        .expect("批量导入应成功返回");
    assert_eq!(results.len(), 3);

    match &results[0] {
        Ok(summary) => assert_eq!(summary.inserted, 2),
        Err(e) => panic!("文件 A 应导入成功: {}", e),
    }
    match &results[1] {
        Ok(summary) => assert_eq!(summary.inserted, 1),
        Err(e) => panic!("文件 B 应导入成功: {}", e),
    }
    match &results[2] {
        Ok(_) => panic!("缺失文件应导入失败"),
        Err(e) => assert!(e.contains("导入失败"), "实际: {}", e),
    }

    {
        let guard = conn.lock().unwrap();
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM barcode_code", [], |row| row.get(0))
            .expect("统计失败");
        assert_eq!(count, 3, "两份成功文件的条码都应入库");
    }

    println!("✅ 批量导入测试通过");
}
