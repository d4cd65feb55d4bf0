// photoprep/src/cli.rs
use crate::core::{OutputMode, ProcessConfig};
use clap::{ArgGroup, Parser};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "photoprep")]
#[command(about = "Prepare a directory of photos for web publishing", version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["sql_insert_mode", "no_output_mode"])
))]
pub struct Cli {
    /// Directory containing the source photos
    #[arg(short = 'p', long)]
    pub photo_dir: PathBuf,

    /// URL path to the root photos directory, ex: images
    #[arg(short = 'w', long)]
    pub web_photo_root: Option<String>,

    /// Name of the category for these photos
    #[arg(short = 'c', long)]
    pub category: Option<String>,

    /// Year the pictures were taken
    #[arg(short = 'y', long)]
    pub year: Option<u16>,

    /// Mark the category as private
    #[arg(short = 'x', long)]
    pub private: bool,

    /// Path to the output SQL file that will be generated
    #[arg(short = 'o', long)]
    pub out_file: Option<PathBuf>,

    /// Generate an insert script
    #[arg(short = 'i', long)]
    pub sql_insert_mode: bool,

    /// Do not generate an output file, useful when reprocessing
    #[arg(short = 'n', long)]
    pub no_output_mode: bool,

    /// Worker threads (default: processors - 1)
    #[arg(short = 't', long, default_value_t = 0)]
    pub threads: usize,

    /// Skip lossless re-compression (no jpegtran needed)
    #[arg(long)]
    pub no_minify: bool,

    /// Be quiet and do not emit status messages
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.sql_insert_mode {
            OutputMode::Insert
        } else {
            OutputMode::NoOutput
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }

    pub fn to_config(&self) -> ProcessConfig {
        ProcessConfig {
            photo_dir: self.photo_dir.clone(),
            web_photo_root: self.web_photo_root.clone(),
            category: self.category.clone(),
            year: self.year,
            is_private: self.private,
            output_mode: self.output_mode(),
            out_file: self.out_file.clone(),
            threads: self.threads,
            minify: !self.no_minify,
            quiet: self.quiet,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_mode_flags() {
        let cli = Cli::try_parse_from([
            "photoprep", "-p", "/photos/2024/trip", "-w", "images", "-c", "Trip", "-y", "2024",
            "-o", "trip.sql", "-i", "-x",
        ])
        .unwrap();

        let config = cli.to_config();
        assert_eq!(config.output_mode, OutputMode::Insert);
        assert_eq!(config.year, Some(2024));
        assert!(config.is_private);
        assert!(config.minify);
        assert!(config.validate().is_ok());
        assert_eq!(cli.log_level(), LevelFilter::Info);
    }

    #[test]
    fn exactly_one_output_mode() {
        assert!(Cli::try_parse_from(["photoprep", "-p", "/photos"]).is_err());
        assert!(Cli::try_parse_from(["photoprep", "-p", "/photos", "-i", "-n"]).is_err());

        let cli = Cli::try_parse_from(["photoprep", "-p", "/photos", "-n", "-q", "--no-minify"])
            .unwrap();
        assert_eq!(cli.output_mode(), OutputMode::NoOutput);
        assert_eq!(cli.log_level(), LevelFilter::Warn);
        assert!(!cli.to_config().minify);
    }
}
