// ==========================================
// API 层端到端集成测试
// ==========================================
// 验证: 从 AppState 组装到登记/释放/预览/校验/统计的完整业务闭环
// ==========================================


use book_barcode_inventory::api::ApiError;
use book_barcode_inventory::app::AppState;
use book_barcode_inventory::db;
use book_barcode_inventory::domain::types::{CodeStatus, PositionCode};
use rusqlite::Connection;
use std::collections::HashMap;
use tempfile::NamedTempFile;
use test_helpers::{create_test_db, insert_code, insert_standard_bands};

/// 建立端到端环境: AppState + 用于种子和核对的独立连接
fn setup_app() -> (NamedTempFile, AppState, Connection) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = AppState::new(db_path.clone()).expect("初始化 AppState 失败");
    let seed_conn = db::open_sqlite_connection(&db_path).expect("打开种子连接失败");
    (temp_file, app, seed_conn)
}

#[test]
fn test_e2e_auto_assignment_resolves_band() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "lgk001", Some(1)).expect("插入条码失败");

    // 1. 预览: 宽 120mm 命中 gk,高 210mm 命中等高集合
    let preview = app
        .inventory_api
        .preview(12.0, 21.0)
        .expect("预览应成功");
    assert_eq!(preview.requested_series, "lgk");
    assert_eq!(preview.candidate.as_deref(), Some("lgk001"));

    // 2. 自动登记
    let outcome = app
        .assignment_api
        .assign_auto("book-001", 12.0, 21.0, Some("tester"))
        .expect("分配应成功");
    assert_eq!(outcome.band_name, "gk");
    assert_eq!(outcome.position, PositionCode::Level);
    assert_eq!(outcome.series, "lgk");
    assert_eq!(outcome.code, "lgk001");

    // 3. 池侧状态同步翻转
    let code = app
        .inventory_api
        .get_code("lgk001")
        .expect("查询失败")
        .expect("条码应在池内");
    assert_eq!(code.status, CodeStatus::Assigned);

    println!("✅ 端到端自动登记测试通过");
}

#[test]
fn test_e2e_pool_consumed_in_rank_order() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "lgk001", Some(1)).expect("插入条码失败");
    insert_code(&seed_conn, "lgk002", Some(2)).expect("插入条码失败");

    let first = app
        .assignment_api
        .assign_auto("book-001", 12.0, 21.0, None)
        .expect("第一次分配应成功");
    assert_eq!(first.code, "lgk001");

    let second = app
        .assignment_api
        .assign_auto("book-002", 12.0, 21.0, None)
        .expect("第二次分配应成功");
    assert_eq!(second.code, "lgk002");

    let third = app.assignment_api.assign_auto("book-003", 12.0, 21.0, None);
    match third {
        Err(ApiError::PoolExhausted { series, allowed }) => {
            assert_eq!(series, "lgk");
            assert_eq!(allowed, vec!["lgk".to_string()]);
        }
        other => panic!("应返回 PoolExhausted,实际: {:?}", other.map(|o| o.code)),
    }

    println!("✅ 端到端池顺序消耗测试通过");
}

#[test]
fn test_e2e_exact_code_case_insensitive_once() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "lgk001", Some(1)).expect("插入条码失败");

    // 1. 大写输入命中小写库存
    let outcome = app
        .assignment_api
        .assign_exact("book-001", "LGK001", 12.0, 21.0, Some("tester"))
        .expect("指定分配应成功");
    assert_eq!(outcome.code, "lgk001");

    // 2. 立即重复占用被拒绝
    let repeat = app
        .assignment_api
        .assign_exact("book-002", "lgk001", 12.0, 21.0, Some("tester"));
    match repeat {
        Err(ApiError::CodeNotAvailable(code)) => assert_eq!(code, "lgk001"),
        other => panic!("应返回 CodeNotAvailable,实际: {:?}", other.map(|o| o.code)),
    }

    println!("✅ 端到端指定登记测试通过");
}

#[test]
fn test_e2e_fallback_series_reported_to_caller() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    // 主系列 dai 无库存,回退系列只有 daik005
    insert_code(&seed_conn, "daik005", Some(5)).expect("插入条码失败");

    // 1. 提交前校验也接受回退系列候选
    let check = app
        .inventory_api
        .validate_candidate(32.0, 19.0, "daik005")
        .expect("校验应成功返回");
    assert!(check.ok);
    assert_eq!(check.series.as_deref(), Some("dai"));
    assert_eq!(check.matched_series.as_deref(), Some("daik"));

    // 2. 自动登记走回退,对外报告实际系列
    let outcome = app
        .assignment_api
        .assign_auto("book-001", 32.0, 19.0, Some("tester"))
        .expect("回退分配应成功");
    assert_eq!(outcome.code, "daik005");
    assert_eq!(outcome.series, "daik");
    assert_eq!(outcome.requested_series, "dai");
    assert!(outcome.fallback_used);

    println!("✅ 端到端回退报告测试通过");
}

#[test]
fn test_e2e_release_then_reassign_same_code() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "dak007", Some(7)).expect("插入条码失败");

    // 1. 书目 B 占用 dak007
    let outcome = app
        .assignment_api
        .assign_auto("book-B", 25.0, 19.0, Some("tester"))
        .expect("分配应成功");
    assert_eq!(outcome.code, "dak007");
    assert_eq!(outcome.series, "dak");

    // 2. 注销书目: 台账关闭,条码翻回 AVAILABLE
    let released = app
        .assignment_api
        .release_for_book("book-B", Some("tester"))
        .expect("释放应成功");
    assert_eq!(released, vec!["dak007".to_string()]);

    let code = app
        .inventory_api
        .get_code("dak007")
        .expect("查询失败")
        .expect("条码应在池内");
    assert_eq!(code.status, CodeStatus::Available);

    // 3. 新书目能再次拿到同一条码
    let outcome = app
        .assignment_api
        .assign_auto("book-C", 25.0, 19.0, Some("tester"))
        .expect("再分配应成功");
    assert_eq!(outcome.code, "dak007");

    println!("✅ 端到端释放复用测试通过");
}

#[test]
fn test_e2e_alias_fields_accepted_at_boundary() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "lgk001", Some(1)).expect("插入条码失败");

    // 1. 别名字段 + 小数逗号在边界处一次性归一
    let mut fields = HashMap::new();
    fields.insert("BBreite".to_string(), "12,0".to_string());
    fields.insert("BHoehe".to_string(), "21".to_string());
    let preview = app
        .inventory_api
        .preview_with_fields(&fields)
        .expect("别名预览应成功");
    assert_eq!(preview.candidate.as_deref(), Some("lgk001"));

    let outcome = app
        .assignment_api
        .assign_auto_with_fields("book-001", &fields, Some("tester"))
        .expect("别名登记应成功");
    assert_eq!(outcome.series, "lgk");

    // 2. 缺高度: 未触库即拒绝
    let mut incomplete = HashMap::new();
    incomplete.insert("w".to_string(), "12".to_string());
    let missing = app
        .assignment_api
        .assign_auto_with_fields("book-002", &incomplete, Some("tester"));
    assert!(
        matches!(missing, Err(ApiError::InvalidDimensions(_))),
        "缺高度应判尺寸非法"
    );

    // 3. 非数值: 同样在边界处拒绝
    let mut invalid = HashMap::new();
    invalid.insert("width".to_string(), "abc".to_string());
    invalid.insert("height".to_string(), "21".to_string());
    let bad = app
        .assignment_api
        .assign_auto_with_fields("book-002", &invalid, Some("tester"));
    match bad {
        Err(ApiError::InvalidDimensions(msg)) => {
            assert!(msg.contains("width"), "错误应指明出错字段: {}", msg);
        }
        other => panic!("应返回 InvalidDimensions,实际: {:?}", other.map(|o| o.code)),
    }

    // 4. 两次失败调用没有产生任何占用
    let open = app
        .assignment_api
        .get_open_assignment("book-002")
        .expect("查询失败");
    assert!(open.is_none(), "失败的登记不得留下台账行");

    println!("✅ 端到端别名边界测试通过");
}

#[test]
fn test_e2e_series_stats_reports_low_stock() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "lgk001", Some(1)).expect("插入条码失败");
    insert_code(&seed_conn, "lgk002", Some(2)).expect("插入条码失败");
    for i in 1..=6 {
        insert_code(&seed_conn, &format!("dgk{:03}", i), Some(i)).expect("插入条码失败");
    }

    app.assignment_api
        .assign_auto("book-001", 12.0, 21.0, Some("tester"))
        .expect("分配应成功");

    let stats = app.inventory_api.series_stats().expect("统计应成功");

    let lgk = stats
        .iter()
        .find(|s| s.series == "lgk")
        .expect("应有 lgk 统计行");
    assert_eq!(lgk.total, 2);
    assert_eq!(lgk.available, 1);
    assert_eq!(lgk.assigned, 1);
    assert!(lgk.low_stock, "可用 1 低于默认阈值 5");

    let dgk = stats
        .iter()
        .find(|s| s.series == "dgk")
        .expect("应有 dgk 统计行");
    assert_eq!(dgk.total, 6);
    assert_eq!(dgk.available, 6);
    assert!(!dgk.low_stock);

    // 状态过滤查询与统计一致
    let available = app
        .inventory_api
        .list_codes("lgk", Some("AVAILABLE"), Some(10))
        .expect("查询应成功");
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].code, "lgk002");

    println!("✅ 端到端系列统计测试通过");
}

#[test]
fn test_e2e_admin_release_bypasses_ledger() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "lgk001", Some(1)).expect("插入条码失败");

    app.assignment_api
        .assign_auto("book-001", 12.0, 21.0, Some("tester"))
        .expect("分配应成功");

    // 1. 管理端释放只翻状态,不碰台账
    let released = app.inventory_api.admin_release("lgk001").expect("释放应成功");
    assert!(released, "释放前处于 ASSIGNED");

    let code = app
        .inventory_api
        .get_code("lgk001")
        .expect("查询失败")
        .expect("条码应在池内");
    assert_eq!(code.status, CodeStatus::Available);

    // 2. 留下的未关闭台账行会被一致性扫描报出
    let findings = app.assignment_api.scan_ledger().expect("扫描应成功");
    assert_eq!(findings.len(), 1, "逃生口释放必然造成台账不一致");

    // 3. 台账侧补关闭后对账干净
    let closed = app
        .assignment_api
        .close_open_assignment("lgk001", Some("tester"))
        .expect("关闭应成功");
    assert!(closed);
    let findings = app.assignment_api.scan_ledger().expect("扫描应成功");
    assert!(findings.is_empty());

    // 4. 幂等与未建档两条边界
    let released = app.inventory_api.admin_release("lgk001").expect("释放应成功");
    assert!(!released, "已是 AVAILABLE 时返回 false");
    let unknown = app.inventory_api.admin_release("zzz999");
    assert!(matches!(unknown, Err(ApiError::NotFound(_))));

    println!("✅ 端到端管理释放测试通过");
}

#[test]
fn test_e2e_default_actor_from_config() {
    let (_temp_file, app, seed_conn) = setup_app();
    insert_standard_bands(&seed_conn).expect("插入标准分段失败");
    insert_code(&seed_conn, "lgk001", Some(1)).expect("插入条码失败");
    insert_code(&seed_conn, "lgk002", Some(2)).expect("插入条码失败");

    // 1. 未指定操作者时使用内置默认值
    app.assignment_api
        .assign_auto("book-001", 12.0, 21.0, None)
        .expect("分配应成功");
    let open = app
        .assignment_api
        .get_open_assignment("book-001")
        .expect("查询失败")
        .expect("应有未关闭占用");
    assert_eq!(open.assigned_by.as_deref(), Some("system"));

    // 2. 配置覆盖默认操作者
    app.config_manager
        .update_config("default_actor", "librarian")
        .expect("写配置失败");
    app.assignment_api
        .assign_auto("book-002", 12.0, 21.0, None)
        .expect("分配应成功");
    let open = app
        .assignment_api
        .get_open_assignment("book-002")
        .expect("查询失败")
        .expect("应有未关闭占用");
    assert_eq!(open.assigned_by.as_deref(), Some("librarian"));

    println!("✅ 端到端默认操作者测试通过");
}
