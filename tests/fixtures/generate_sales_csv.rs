// ==========================================
// 销量测试数据生成器
// ==========================================
// 用途: 生成销量历史CSV数据集, 供导入器手工验证
// 输出: tests/fixtures/datasets/*.csv
// ==========================================

use chrono::{Datelike, Duration, NaiveDate};
use csv::Writer;
use std::error::Error;
use std::fs::File;

// CSV 表头（葡语原始列名）
const CSV_HEADER: &[&str] = &["data_dia", "total_venda_dia_kg"];

const DATASET_DIR: &str = "tests/fixtures/datasets";

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).expect("固定起始日期")
}

// 确定性日销量: 基础量 + 线性趋势 + 周内形状(周末高峰)
fn demand_kg(date: NaiveDate, day_index: usize) -> f64 {
    let weekday_bump = [0.0, 4.0, 2.0, 6.0, 12.0, 30.0, 20.0];
    let bump = weekday_bump[date.weekday().num_days_from_monday() as usize];
    80.0 + 0.5 * day_index as f64 + bump
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("开始生成销量测试数据集...");

    std::fs::create_dir_all(DATASET_DIR)?;

    // 1. 干净的ISO记法数据 (60天)
    generate_normal_sales()?;

    // 2. 巴西记法数据 (30天, DD/MM/YYYY + 小数逗号)
    generate_brazilian_notation()?;

    // 3. 含问题行的数据 (坏日期/负值/非数值/重复日期)
    generate_problem_rows()?;

    println!("✓ 所有销量数据集生成完成！");
    Ok(())
}

fn generate_normal_sales() -> Result<(), Box<dyn Error>> {
    let path = format!("{}/01_normal_sales.csv", DATASET_DIR);
    let file = File::create(&path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(CSV_HEADER)?;

    for i in 0..60 {
        let date = start_date() + Duration::days(i as i64);
        let kg = demand_kg(date, i);
        wtr.write_record(&[date.to_string(), format!("{:.1}", kg)])?;
    }

    wtr.flush()?;
    println!("✓ 生成 01_normal_sales.csv (60条)");
    Ok(())
}

fn generate_brazilian_notation() -> Result<(), Box<dyn Error>> {
    let path = format!("{}/02_brazilian_notation.csv", DATASET_DIR);
    let file = File::create(&path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(CSV_HEADER)?;

    for i in 0..30 {
        let date = start_date() + Duration::days(60 + i as i64);
        let kg = demand_kg(date, 60 + i);
        // 小数点换成逗号, csv::Writer 自动加引号
        let kg_br = format!("{:.1}", kg).replace('.', ",");
        wtr.write_record(&[date.format("%d/%m/%Y").to_string(), kg_br])?;
    }

    wtr.flush()?;
    println!("✓ 生成 02_brazilian_notation.csv (30条)");
    Ok(())
}

fn generate_problem_rows() -> Result<(), Box<dyn Error>> {
    let path = format!("{}/03_problem_rows.csv", DATASET_DIR);
    let file = File::create(&path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(CSV_HEADER)?;

    // 正常行 (10条)
    for i in 0..10 {
        let date = start_date() + Duration::days(90 + i as i64);
        let kg = demand_kg(date, 90 + i);
        wtr.write_record(&[date.to_string(), format!("{:.1}", kg)])?;
    }

    // 坏日期 (2条)
    wtr.write_record(&["2024-13-45", "50.0"])?;
    wtr.write_record(&["31/02/2024", "55.0"])?;

    // 负值与非数值 (3条)
    wtr.write_record(&["2024-06-20", "-5.0"])?;
    wtr.write_record(&["2024-06-21", "abc"])?;
    wtr.write_record(&["2024-06-22", ""])?;

    // 重复日期 (取后行, 2条)
    wtr.write_record(&["2024-06-25", "70.0"])?;
    wtr.write_record(&["25/06/2024", "99.0"])?;

    wtr.flush()?;
    println!("✓ 生成 03_problem_rows.csv (17条，含7条问题行)");
    Ok(())
}
