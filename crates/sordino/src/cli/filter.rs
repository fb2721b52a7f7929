use anyhow::{Context, Result};
use clap::Args;
use sordino_core::shaper::{PulseSet, ShaperConfig, ShaperKind};

#[derive(Args)]
pub struct FilterArgs {
    /// Shaper kind (none, zv, mzv, zvd, ei3).
    pub kind: String,

    /// Natural frequency in Hz.
    #[arg(long, default_value_t = 50.0)]
    pub frequency: f64,

    /// Damping ratio.
    #[arg(long, default_value_t = 0.1)]
    pub zeta: f64,
}

impl FilterArgs {
    pub fn run(&self) -> Result<()> {
        let kind = ShaperKind::parse(&self.kind)
            .with_context(|| format!("unknown shaper kind {:?}", self.kind))?;
        let config = ShaperConfig {
            kind,
            frequency: self.frequency,
            zeta: self.zeta,
            ..ShaperConfig::default()
        };
        let set = PulseSet::new(&config);

        println!(
            "{:?} @ {} Hz, zeta {}: {} pulse(s), window {:.4} ms (left {:.4}, right {:.4})",
            kind,
            self.frequency,
            self.zeta,
            set.shift.len(),
            set.delta_window,
            set.left_delta,
            set.right_delta,
        );
        for (i, (amplitude, offset)) in set.shift.iter().enumerate() {
            println!("  [{i}] amplitude {amplitude:+.6}  offset {offset:+.4} ms");
        }

        Ok(())
    }
}
