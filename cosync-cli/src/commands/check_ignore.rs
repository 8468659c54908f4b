//! `cosync check-ignore` — report which paths the ignore file excludes.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use cosync_sync::filter::IGNORE_FILE_NAME;

use crate::changes;

/// Arguments for `cosync check-ignore`.
#[derive(Args, Debug)]
pub struct CheckIgnoreArgs {
    /// Repository-relative paths to test.
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Working-tree root holding the ignore file.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Ignore file (default: `<root>/.syncignore`).
    #[arg(long, value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,
}

impl CheckIgnoreArgs {
    pub fn run(self) -> Result<()> {
        let ignore_path = self
            .ignore_file
            .unwrap_or_else(|| self.root.join(IGNORE_FILE_NAME));
        let filter = changes::load_ignore_filter(&ignore_path);

        for path in &self.paths {
            match filter.matching_pattern(path) {
                Some(pattern) => println!("{}  {path}  (matched {pattern:?})", "ignored".yellow()),
                None => println!("{}  {path}", "synced ".green()),
            }
        }
        Ok(())
    }
}
