// ==========================================
// 数据库迁移与约束集成测试
// ==========================================
// 验证: 迁移幂等、版本记录、大小写唯一约束、部分唯一索引、外键
// ==========================================


use book_barcode_inventory::db;
use test_helpers::{create_test_db, insert_code};

#[test]
fn test_migrations_reach_current_version() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = db::open_sqlite_connection(&db_path).expect("打开数据库失败");

    let version = db::read_schema_version(&conn).expect("读取版本失败");
    assert_eq!(version, Some(db::CURRENT_SCHEMA_VERSION));

    println!("✅ 迁移版本测试通过: v{}", db::CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_migrations_are_idempotent() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = db::open_sqlite_connection(&db_path).expect("打开数据库失败");

    // 1. 先写入业务数据
    insert_code(&conn, "lgk001", Some(1)).expect("插入条码失败");

    // 2. 重复执行迁移: 不报错,不清数据,版本行不增殖
    db::run_migrations(&conn).expect("重复迁移应成功");
    db::run_migrations(&conn).expect("第三次迁移应成功");

    let code_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM barcode_code", [], |row| row.get(0))
        .expect("统计失败");
    assert_eq!(code_count, 1, "迁移不得清除业务数据");

    let version_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .expect("统计失败");
    assert_eq!(version_rows, 1, "版本记录不得重复插入");

    let scope_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM config_scope WHERE scope_id = 'global'",
            [],
            |row| row.get(0),
        )
        .expect("统计失败");
    assert_eq!(scope_rows, 1, "全局配置范围只播种一次");

    println!("✅ 迁移幂等测试通过");
}

#[test]
fn test_code_uniqueness_is_case_insensitive() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = db::open_sqlite_connection(&db_path).expect("打开数据库失败");

    conn.execute(
        "INSERT INTO barcode_code (code, series) VALUES ('lgk001', 'lgk')",
        [],
    )
    .expect("插入条码失败");

    // NOCASE 唯一约束: 大写同名条码被拒绝
    let duplicate = conn.execute(
        "INSERT INTO barcode_code (code, series) VALUES ('LGK001', 'lgk')",
        [],
    );
    assert!(duplicate.is_err(), "大小写不同的同名条码必须拒绝");

    println!("✅ 大小写唯一约束测试通过");
}

#[test]
fn test_single_open_assignment_per_code_and_book() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = db::open_sqlite_connection(&db_path).expect("打开数据库失败");
    insert_code(&conn, "lgk001", Some(1)).expect("插入条码失败");
    insert_code(&conn, "lgk002", Some(2)).expect("插入条码失败");

    conn.execute(
        "INSERT INTO assignment (assignment_id, code, book_id, assigned_at)
         VALUES ('A-1', 'lgk001', 'book-001', datetime('now'))",
        [],
    )
    .expect("插入台账行失败");

    // 1. 同一条码第二条在用行: 违反部分唯一索引
    let same_code = conn.execute(
        "INSERT INTO assignment (assignment_id, code, book_id, assigned_at)
         VALUES ('A-2', 'lgk001', 'book-002', datetime('now'))",
        [],
    );
    assert!(same_code.is_err(), "每个条码至多一条在用占用");

    // 2. 同一本书第二条在用行: 同样拒绝
    let same_book = conn.execute(
        "INSERT INTO assignment (assignment_id, code, book_id, assigned_at)
         VALUES ('A-3', 'lgk002', 'book-001', datetime('now'))",
        [],
    );
    assert!(same_book.is_err(), "每本书至多一条在用占用");

    // 3. 关闭旧行后,同一条码允许新的在用行
    conn.execute(
        "UPDATE assignment SET freed_at = datetime('now') WHERE assignment_id = 'A-1'",
        [],
    )
    .expect("关闭台账行失败");
    conn.execute(
        "INSERT INTO assignment (assignment_id, code, book_id, assigned_at)
         VALUES ('A-4', 'lgk001', 'book-002', datetime('now'))",
        [],
    )
    .expect("历史行不应阻塞新的占用");

    println!("✅ 在用占用唯一索引测试通过");
}

#[test]
fn test_band_foreign_key_enforced() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = db::open_sqlite_connection(&db_path).expect("打开数据库失败");

    // band_id 指向不存在的尺寸分段: 外键拒绝
    let orphan = conn.execute(
        "INSERT INTO barcode_code (code, series, band_id) VALUES ('lgk001', 'lgk', 'NO-SUCH')",
        [],
    );
    assert!(orphan.is_err(), "未建档分段不得被条码引用");

    println!("✅ 外键约束测试通过");
}
