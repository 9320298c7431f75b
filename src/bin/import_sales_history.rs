// Small dev utility: import a sales history file (CSV/XLSX) into the database.
//
// Usage:
//   cargo run --bin import_sales_history -- <file> [db_path]
//
// 导入成功后预测缓存自动失效, 下次推进/查询按新历史重训。

use thaw_inventory_dss::app::{get_default_db_path, AppState};
use thaw_inventory_dss::i18n::t_with_args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    thaw_inventory_dss::logging::init();

    let mut args = std::env::args().skip(1);
    let file_path = args
        .next()
        .ok_or("用法: import_sales_history <file> [db_path]")?;
    let db_path = args.next().unwrap_or_else(get_default_db_path);

    let state = AppState::new(db_path)?;
    let summary = state.import_sales_history(&file_path)?;

    println!(
        "{}",
        t_with_args(
            "cli.import.success",
            &[
                ("imported", summary.imported_rows.to_string().as_str()),
                ("skipped", summary.skipped_rows.to_string().as_str()),
            ],
        )
    );
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        println!("日期范围: {} ~ {}", first, last);
    }
    for failure in &summary.failures {
        eprintln!("  行 {}: {}", failure.row, failure.message);
    }

    Ok(())
}
