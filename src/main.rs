// ==========================================
// 解冻库存滚动系统 - CLI 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 决策支持系统
// ==========================================
// 用法:
//   thaw-inventory-dss advance <sales_kg>   收市录入销量并推进一天
//   thaw-inventory-dss report [YYYY-MM-DD]  查看日报(缺省最近一次)
//   thaw-inventory-dss projections          查看横向预测表
//   thaw-inventory-dss metrics              查看预测模型指标
//   thaw-inventory-dss reset-last           撤销最近一天
//   thaw-inventory-dss reset-all            清空库存链
// ==========================================

use chrono::NaiveDate;

use thaw_inventory_dss::app::{get_default_db_path, AppState};
use thaw_inventory_dss::domain::{DailyReportRow, NoticeCode, ResetScope, RunNotice};
use thaw_inventory_dss::i18n::{self, t, t_with_args};
use thaw_inventory_dss::logging;

fn main() {
    // 初始化日志系统
    logging::init();

    // 语言可用环境变量覆盖(默认 zh-CN)
    if let Ok(locale) = std::env::var("THAW_INVENTORY_LOCALE") {
        if !locale.trim().is_empty() {
            i18n::set_locale(locale.trim());
        }
    }

    tracing::info!("==================================================");
    tracing::info!("解冻库存滚动系统 - 决策支持系统");
    tracing::info!("系统版本: {}", thaw_inventory_dss::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first() {
        Some(cmd) => cmd.as_str(),
        None => {
            print_usage();
            std::process::exit(2);
        }
    };

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    let result = match command {
        "advance" => cmd_advance(&state, &args[1..]),
        "report" => cmd_report(&state, &args[1..]),
        "projections" => cmd_projections(&state),
        "metrics" => cmd_metrics(&state),
        "reset-last" => cmd_reset(&state, ResetScope::LastDay),
        "reset-all" => cmd_reset(&state, ResetScope::All),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("未知命令: {}", other);
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(message) = result {
        eprintln!("{}", message);
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("解冻库存滚动系统 - 决策支持系统 v{}", thaw_inventory_dss::VERSION);
    eprintln!();
    eprintln!("用法: thaw-inventory-dss <命令> [参数]");
    eprintln!();
    eprintln!("命令:");
    eprintln!("  advance <sales_kg>   收市录入当日销量(公斤)并推进一天");
    eprintln!("  report [YYYY-MM-DD]  查看日报(缺省最近一次推演)");
    eprintln!("  projections          查看横向预测表");
    eprintln!("  metrics              查看预测模型指标");
    eprintln!("  reset-last           撤销最近一天");
    eprintln!("  reset-all            清空库存链(保留销量历史与配置)");
    eprintln!();
    eprintln!("环境变量:");
    eprintln!("  THAW_INVENTORY_DB_PATH  数据库文件路径");
    eprintln!("  THAW_INVENTORY_LOCALE   输出语言(zh-CN/en)");
    eprintln!("  RUST_LOG                日志级别(默认 info)");
}

// ==========================================
// 子命令实现
// ==========================================

fn cmd_advance(state: &AppState, rest: &[String]) -> Result<(), String> {
    let raw = rest
        .first()
        .ok_or_else(|| "用法: advance <sales_kg>".to_string())?;
    let sales_kg: f64 = raw
        .parse()
        .map_err(|_| format!("销量参数无法解析为数值: {}", raw))?;

    let summary = state
        .simulation_api
        .advance_day(sales_kg)
        .map_err(|e| e.to_string())?;

    println!(
        "{}",
        t_with_args(
            "cli.advance.success",
            &[
                ("date", summary.closed_date.to_string().as_str()),
                ("pull_kg", format_kg(summary.report.recommended_pull_kg).as_str()),
                ("boxes", summary.report.recommended_pull_boxes.to_string().as_str()),
            ],
        )
    );
    if summary.bootstrapped {
        println!("(首次推演, 库存链已按预测初始化)");
    }
    print_report(&summary.report);
    Ok(())
}

fn cmd_report(state: &AppState, rest: &[String]) -> Result<(), String> {
    let report = match rest.first() {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| format!("日期格式应为 YYYY-MM-DD, 实际 {}", raw))?;
            state
                .report_api
                .daily_report(date)
                .map_err(|e| e.to_string())?
        }
        None => state
            .report_api
            .latest_daily_report()
            .map_err(|e| e.to_string())?,
    };

    match report {
        Some(row) => print_report(&row),
        None => println!("{}", t("cli.report.none")),
    }
    Ok(())
}

fn cmd_projections(state: &AppState) -> Result<(), String> {
    let projections = state
        .report_api
        .horizon_projections()
        .map_err(|e| e.to_string())?;

    if projections.is_empty() {
        println!("{}", t("cli.projections.none"));
        return Ok(());
    }

    println!("日期          可售(kg)    解冻中(kg)  应出冻(kg)");
    for p in &projections {
        println!(
            "{}    {:>8}    {:>8}    {:>8}",
            p.projection_date,
            format_kg(p.available_kg),
            format_kg(p.thawing_kg),
            format_kg(p.pull_kg)
        );
    }
    Ok(())
}

fn cmd_metrics(state: &AppState) -> Result<(), String> {
    let status = state
        .report_api
        .forecast_model_status()
        .map_err(|e| e.to_string())?;

    let status = match status {
        Some(s) => s,
        None => {
            println!("{}", t("cli.metrics.none"));
            return Ok(());
        }
    };

    println!("模型类型:     {}", status.model_kind.as_str());
    println!("训练样本数:   {}", status.metrics.sample_count);
    println!("训练截止日:   {}", status.metrics.trained_through);
    match status.metrics.mape_pct {
        Some(mape) => println!("MAPE:         {:.2}%", mape),
        None => println!("MAPE:         - (样本不足或全为零)"),
    }
    match status.metrics.rmse_kg {
        Some(rmse) => println!("RMSE:         {:.2} kg", rmse),
        None => println!("RMSE:         -"),
    }
    if let Some(end) = status.horizon_end {
        println!("预测窗末日:   {}", end);
    }
    Ok(())
}

fn cmd_reset(state: &AppState, scope: ResetScope) -> Result<(), String> {
    let outcome = state
        .simulation_api
        .reset(scope)
        .map_err(|e| e.to_string())?;

    match scope {
        ResetScope::LastDay => match outcome.removed_date {
            Some(date) => println!(
                "{}",
                t_with_args("cli.reset.last_done", &[("date", date.to_string().as_str())])
            ),
            None => println!("{}", t("cli.reset.empty")),
        },
        ResetScope::All => {
            if outcome.removed_states == 0 {
                println!("{}", t("cli.reset.empty"));
            } else {
                println!(
                    "{}",
                    t_with_args(
                        "cli.reset.all_done",
                        &[("count", outcome.removed_states.to_string().as_str())],
                    )
                );
            }
        }
    }
    Ok(())
}

// ==========================================
// 输出辅助
// ==========================================

fn print_report(row: &DailyReportRow) {
    println!("  报表日期:   {}", row.report_date);
    println!("  SKU:        {}", row.sku_code);
    println!(
        "  建议出冻:   {} 公斤 ({} 箱)",
        format_kg(row.recommended_pull_kg),
        row.recommended_pull_boxes
    );
    println!("  解冻中:     {} 公斤", format_kg(row.thawing_kg));
    println!("  可售库存:   {} 公斤", format_kg(row.available_kg));
    println!("  批次库龄:   {}", t(row.lot_age.label_key()));
    println!(
        "  预计报废:   {} 公斤 ({} 箱)",
        format_kg(row.projected_loss_kg),
        row.projected_loss_boxes
    );
    for notice in &row.notices {
        println!("  [{}] {}", notice.level, render_notice(notice));
    }
}

// 提示文案: 按代码取 i18n 模板, 参数来自结构化明细
fn render_notice(notice: &RunNotice) -> String {
    let detail = &notice.detail;
    match notice.code {
        NoticeCode::MissingForecast => t_with_args(
            notice.code.label_key(),
            &[("date", detail["date"].as_str().unwrap_or("-"))],
        ),
        NoticeCode::DemandExceededStock => t_with_args(
            notice.code.label_key(),
            &[(
                "excess_kg",
                format_kg(detail["excess_kg"].as_f64().unwrap_or(0.0)).as_str(),
            )],
        ),
        NoticeCode::CalendarOverrideApplied => t_with_args(
            notice.code.label_key(),
            &[(
                "override_kg",
                format_kg(detail["override_kg"].as_f64().unwrap_or(0.0)).as_str(),
            )],
        ),
        NoticeCode::ReportRefreshFailed => t(notice.code.label_key()),
    }
}

fn format_kg(kg: f64) -> String {
    format!("{:.1}", kg)
}
