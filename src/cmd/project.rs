//! Project initialization: `stagehand init`.

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use stagehand::init::{init_project, is_initialized};

    let was_initialized = is_initialized(project_dir);

    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized stagehand project at {}",
            result.stagehand_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .stagehand/");
        println!("  ├── stagehand.toml   # Configuration (use `stagehand config`)");
        println!("  └── pipeline.json    # Pipeline state (written by `stagehand start`)");
        println!();
        println!("Next steps:");
        println!("  1. Run `stagehand start <feature> \"<description>\"` to open a pipeline");
        println!("  2. Run `stagehand continue` to execute the spec stage");
        println!("  3. Run `stagehand run` to walk the remaining stages interactively");
    } else if was_initialized {
        println!(
            "Stagehand project already initialized at {}",
            result.stagehand_dir.display()
        );
        if result.wrote_config {
            println!("Wrote missing stagehand.toml.");
        } else {
            println!("Existing configuration kept.");
        }
    }

    Ok(())
}
