use std::fs;
use std::path::Path;

use locsync_core::Result;

pub fn run_schema(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    macro_rules! dump {
        ($ty:ty, $name:literal) => {{
            let schema = schemars::schema_for!($ty);
            let path = out_dir.join($name);
            let f = fs::File::create(&path)?;
            serde_json::to_writer_pretty(f, &schema)?;
        }};
    }
    dump!(locsync_domain::SyncSummary, "sync_summary.schema.json");
    dump!(locsync_domain::ProjectReport, "project_report.schema.json");
    dump!(locsync_domain::ProjectStats, "project_stats.schema.json");
    crate::ui_ok!("schemas written to {}", out_dir.display());
    Ok(())
}
