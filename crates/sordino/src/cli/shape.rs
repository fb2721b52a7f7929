use crate::config::JobConfig;
use anyhow::{Context, Result};
use clap::Args;
use sordino_core::{
    func_manager::{FuncManager, Segment, SegmentSink},
    shaper::AxisInputShaper,
};
use std::{collections::BTreeMap, fs, path::PathBuf};

#[derive(Args)]
pub struct ShapeArgs {
    /// Path to the job file (TOML or JSON).
    pub job: PathBuf,

    /// Path where the segment stream will be written as JSON.
    ///
    /// Defaults to stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl ShapeArgs {
    pub fn run(&self) -> Result<()> {
        tracing_subscriber::fmt::init();

        let config = JobConfig::from_file(&self.job)?;
        config.validate()?;
        let (queue, first, last) = config.build_queue()?;

        let mut streams: BTreeMap<&'static str, Vec<Segment>> = BTreeMap::new();
        for (axis, shaper_config) in config.axes() {
            let mut shaper = AxisInputShaper::new(axis, shaper_config);
            let mut manager = FuncManager::new();
            shaper.generate_func_params(&queue, &mut manager, first, last);
            tracing::info!(
                axis = axis.name(),
                kind = ?shaper_config.kind,
                segments = manager.len(),
                until = manager.last_time(),
                "shaped axis"
            );
            streams.insert(axis.name(), manager.segments().copied().collect());
        }

        let json = serde_json::to_string_pretty(&streams)?;
        match &self.output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create output directory {}", parent.display())
                    })?;
                }
                fs::write(path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Wrote segments to {}", path.display());
            }
            None => println!("{json}"),
        }

        Ok(())
    }
}
