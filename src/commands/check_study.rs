use anyhow::Result;
use std::path::Path;
use tracing::info;

use legwatch::study_config::{load_study, study_config_path};

/// Load and validate the study file, then log what it defines
pub fn handle_check_study(study: Option<&Path>) -> Result<()> {
    let path = study_config_path(study);
    info!("Checking study configuration {:?}", path);

    let context = load_study(&path)?;
    context.log_summary();

    if context.zones.is_empty() {
        info!("Study defines no zones; every trace will produce zero events");
    }
    if context.windows.is_empty() {
        info!("Study defines no windows; every trace will produce zero events");
    }
    info!("Study configuration is valid");
    Ok(())
}
