use clap::{Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "main-dex-list")]
#[command(about = "Compute the classes that must be packaged in the main dex")]
pub struct Cli {
    /// Archive whose class entries are the main dex roots.
    #[arg(value_name = "ROOTS")]
    pub roots: PathBuf,

    /// Archives and directories searched for classes, separated like PATH.
    #[arg(value_name = "CLASSPATH")]
    pub classpath: OsString,

    /// Keeping runtime-annotated classes is not implemented; accepted for compatibility.
    #[arg(long)]
    pub disable_annotation_resolution_workaround: bool,

    #[arg(long, value_name = "FILE")]
    pub keep_list: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
