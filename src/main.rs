// ==========================================
// 藏书编目系统 - CLI 主入口
// ==========================================
// 子命令: migrate(默认) / seed <bands.csv> <codes.csv> / stats / scan
// ==========================================

use book_barcode_inventory::app::{get_default_db_path, AppState};
use book_barcode_inventory::domain::import_report::RowViolation;
use book_barcode_inventory::i18n;
use book_barcode_inventory::importer::InventoryImporter;
use book_barcode_inventory::logging;

#[tokio::main]
async fn main() {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", book_barcode_inventory::APP_NAME);
    tracing::info!("系统版本: {}", book_barcode_inventory::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("migrate");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState（迁移在其中显式执行）
    let app_state = AppState::new(db_path).expect("无法初始化AppState");

    match command {
        "migrate" => {
            println!("{}", i18n::t("cli.migrate_done"));
        }
        "seed" => run_seed(&app_state, &args).await,
        "stats" => run_stats(&app_state),
        "scan" => run_scan(&app_state),
        other => {
            eprintln!(
                "{}",
                i18n::t_with_args("cli.unknown_command", &[("command", other)])
            );
            eprintln!("{}", i18n::t("cli.usage"));
            std::process::exit(1);
        }
    }
}

/// seed 子命令: 导入尺寸规则与条码库存
async fn run_seed(app_state: &AppState, args: &[String]) {
    let (Some(bands_path), Some(codes_path)) = (args.get(2), args.get(3)) else {
        eprintln!("{}", i18n::t("cli.seed_usage"));
        std::process::exit(1);
    };

    // 路径先行检查,避免导入中途才失败
    for path in [bands_path, codes_path] {
        if !std::path::Path::new(path).exists() {
            eprintln!(
                "{}",
                i18n::t_with_args("import.file_not_found", &[("path", path)])
            );
            std::process::exit(1);
        }
    }

    match app_state.importer.import_size_bands(bands_path).await {
        Ok(summary) => {
            println!(
                "{}",
                i18n::t_with_args(
                    "import.bands_summary",
                    &[
                        ("total", &summary.total_rows.to_string()),
                        ("inserted", &summary.inserted.to_string()),
                        ("skipped", &summary.skipped.to_string()),
                    ],
                )
            );
            print_violations(&summary.violations);
        }
        Err(e) => {
            eprintln!(
                "{}",
                i18n::t_with_args("import.failed", &[("error", &e.to_string())])
            );
            std::process::exit(1);
        }
    }

    match app_state.importer.import_barcodes(codes_path).await {
        Ok(summary) => {
            println!(
                "{}",
                i18n::t_with_args(
                    "import.codes_summary",
                    &[
                        ("total", &summary.total_rows.to_string()),
                        ("inserted", &summary.inserted.to_string()),
                        ("skipped", &summary.skipped.to_string()),
                    ],
                )
            );
            print_violations(&summary.violations);
        }
        Err(e) => {
            eprintln!(
                "{}",
                i18n::t_with_args("import.failed", &[("error", &e.to_string())])
            );
            std::process::exit(1);
        }
    }
}

/// stats 子命令: 输出各系列库存统计
fn run_stats(app_state: &AppState) {
    match app_state.inventory_api.series_stats() {
        Ok(stats) => {
            println!("{}", i18n::t("inventory.stats_header"));
            for s in &stats {
                println!(
                    "{}",
                    i18n::t_with_args(
                        "inventory.stats_row",
                        &[
                            ("series", &s.series),
                            ("total", &s.total.to_string()),
                            ("available", &s.available.to_string()),
                            ("assigned", &s.assigned.to_string()),
                        ],
                    )
                );
                if s.low_stock {
                    println!(
                        "{}",
                        i18n::t_with_args("inventory.low_stock", &[("series", &s.series)])
                    );
                }
            }
        }
        Err(e) => {
            eprintln!(
                "{}",
                i18n::t_with_args("common.failed", &[("error", &e.to_string())])
            );
            std::process::exit(1);
        }
    }
}

/// scan 子命令: 台账与条码池一致性校验
fn run_scan(app_state: &AppState) {
    match app_state.assignment_api.scan_ledger() {
        Ok(findings) if findings.is_empty() => {
            println!("{}", i18n::t("ledger.scan_clean"));
        }
        Ok(findings) => {
            println!(
                "{}",
                i18n::t_with_args("ledger.scan_found", &[("count", &findings.len().to_string())])
            );
            for f in &findings {
                println!("  - [{:?}] {}: {}", f.kind, f.code, f.detail);
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!(
                "{}",
                i18n::t_with_args("common.failed", &[("error", &e.to_string())])
            );
            std::process::exit(1);
        }
    }
}

fn print_violations(violations: &[RowViolation]) {
    for v in violations {
        println!(
            "{}",
            i18n::t_with_args(
                "import.violation",
                &[("row", &v.row.to_string()), ("message", &v.message)],
            )
        );
    }
}
