// Small dev utility: force-retrain the forecast model and rebuild horizon projections.
//
// Usage:
//   cargo run --bin rebuild_forecast -- [db_path]

use thaw_inventory_dss::app::{get_default_db_path, AppState};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    thaw_inventory_dss::logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(get_default_db_path);

    let state = AppState::new(db_path)?;

    // 丢弃缓存, 强制按当前销量历史重训
    state.forecast.invalidate();
    let rows = state.simulation_api.rebuild_projections()?;

    match state.report_api.forecast_model_status()? {
        Some(status) => {
            println!("model_kind={}", status.model_kind.as_str());
            println!("sample_count={}", status.metrics.sample_count);
            println!("trained_through={}", status.metrics.trained_through);
            println!("projection_rows={}", rows);
        }
        None => println!("销量历史为空, 无模型可训练"),
    }

    Ok(())
}
