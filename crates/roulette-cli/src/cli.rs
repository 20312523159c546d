//! Command line arguments.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use roulette_core::RouletteOptions;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a weighted marble roulette race", long_about = None)]
pub struct Args {
    /// Marble names, `name[/weight][*count]`
    pub names: Vec<String>,
    /// File with one name per line
    #[arg(long)]
    pub names_file: Option<PathBuf>,
    /// JSON options file; flags below override it
    #[arg(long)]
    pub options: Option<PathBuf>,
    /// Zero-based winning rank
    #[arg(long)]
    pub rank: Option<usize>,
    /// Number of winners (range mode when above one)
    #[arg(long)]
    pub range: Option<usize>,
    /// Count each name once in range mode
    #[arg(long)]
    pub no_duplicates: bool,
    #[arg(long)]
    pub skills: bool,
    #[arg(long)]
    pub map: Option<usize>,
    #[arg(long)]
    pub speed: Option<f64>,
    /// Restart the race after each finish
    #[arg(long = "loop")]
    pub infinite_loop: bool,
    #[arg(long)]
    pub loop_delay_ms: Option<u64>,
    /// Stop after this many races in loop mode
    #[arg(long)]
    pub max_races: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Advance time as fast as possible instead of in real time
    #[arg(long)]
    pub virtual_time: bool,
    /// Give up on a race after this many seconds of race time
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
    /// Shake the pack whenever the leader is stuck
    #[arg(long)]
    pub auto_shake: bool,
    /// Write render snapshots as JSON lines while recording
    #[arg(long)]
    pub record: Option<PathBuf>,
    /// Print the available maps and exit
    #[arg(long)]
    pub list_maps: bool,
}

impl Args {
    /// Name lines from the file first, then positional names.
    pub fn name_lines(&self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        if let Some(path) = &self.names_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read names file {}", path.display()))?;
            lines.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            );
        }
        lines.extend(self.names.iter().cloned());
        Ok(lines)
    }

    /// Options file merged with command line overrides.
    pub fn options(&self) -> Result<RouletteOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("read options {}", path.display()))?;
                RouletteOptions::from_json(&json)
                    .with_context(|| format!("parse options {}", path.display()))?
            }
            None => RouletteOptions::default(),
        };

        if let Some(rank) = self.rank {
            options.winning_rank = rank;
        }
        if let Some(range) = self.range {
            options.winning_range = range;
        }
        if let Some(map) = self.map {
            options.map = map;
        }
        if let Some(speed) = self.speed {
            options.speed = speed;
        }
        if let Some(delay) = self.loop_delay_ms {
            options.loop_delay_ms = delay;
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        options.prevent_duplicate_winners |= self.no_duplicates;
        options.use_skills |= self.skills;
        options.infinite_loop |= self.infinite_loop;
        // Without a snapshot file there is nothing to arm
        options.auto_recording &= self.record.is_some();
        Ok(options)
    }
}
