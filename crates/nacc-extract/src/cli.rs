use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nacc_archive::NormalizeOptions;

#[derive(Clone, Debug, Parser)]
#[command(name = "nacc-extract", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct App {
    /// Directory of archives, or one outer archive holding them
    pub source: Option<PathBuf>,

    /// Root of the identifier-keyed output tree
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Where an outer archive is unpacked (temporary directory when omitted)
    #[arg(short, long)]
    pub staging: Option<PathBuf>,

    /// TOML file with normalization options; flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Four-letter identifier prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Hex characters in collision suffixes
    #[arg(long)]
    pub digest_len: Option<usize>,

    /// Longest file name kept before shortening
    #[arg(long)]
    pub max_filename_len: Option<usize>,

    /// Underscore-separated name segments kept when shortening
    #[arg(long)]
    pub keep_segments: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl App {
    /// Config file first, then command-line overrides.
    pub fn options(&self) -> Result<NormalizeOptions> {
        let mut options = match &self.config {
            Some(path) => NormalizeOptions::from_toml_file(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => NormalizeOptions::default(),
        };

        if let Some(source) = &self.source {
            options = options.source(source);
        } else if self.config.is_none() {
            anyhow::bail!("no source given: pass a directory or archive, or --config");
        }
        if let Some(output) = &self.output {
            options = options.output_dir(output);
        }
        if let Some(staging) = &self.staging {
            options = options.staging_dir(staging);
        }
        if let Some(prefix) = &self.prefix {
            options = options.id_prefix(prefix);
        }
        if let Some(len) = self.digest_len {
            options = options.digest_len(len);
        }
        if let Some(len) = self.max_filename_len {
            options = options.max_filename_len(len);
        }
        if let Some(count) = self.keep_segments {
            options = options.keep_segments(count);
        }
        Ok(options)
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
