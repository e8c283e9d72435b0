use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "tradehub",
    version,
    about = "Customs trade spreadsheet conversion and publishing tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Convert(ConvertArgs),
    Status(StatusArgs),
    Publish(PublishArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FlowKind {
    Imports,
    Exports,
    EndUse,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::Exports => "exports",
            Self::EndUse => "end-use",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long)]
    pub source_dir: PathBuf,

    #[arg(long, value_enum)]
    pub flow: FlowKind,

    #[arg(long, default_value = "xlsx")]
    pub extension: String,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value = ".cache/tradehub/manifests")]
    pub manifest_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[arg(long)]
    pub source_dir: PathBuf,

    #[arg(long = "flow", value_enum, required = true)]
    pub flows: Vec<FlowKind>,

    #[arg(long, default_value = "public/data")]
    pub output_root: PathBuf,

    #[arg(long, default_value_t = 40)]
    pub header_scan_rows: usize,

    #[arg(long, default_value = "xlsx")]
    pub extension: String,

    #[arg(long, default_value = ".cache/tradehub/manifests")]
    pub manifest_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub publish: bool,

    #[arg(long)]
    pub commit_message: Option<String>,

    #[command(flatten)]
    pub git: GitArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "public/data")]
    pub output_root: PathBuf,

    #[arg(long, default_value = ".cache/tradehub/manifests")]
    pub manifest_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    #[arg(long, default_value = "public/data")]
    pub output_root: PathBuf,

    #[arg(long = "flow", value_enum, required = true)]
    pub flows: Vec<FlowKind>,

    #[arg(long)]
    pub message: Option<String>,

    #[command(flatten)]
    pub git: GitArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GitArgs {
    #[arg(long, default_value = ".")]
    pub repo_path: PathBuf,

    #[arg(long, default_value = "origin")]
    pub remote: String,

    #[arg(long, default_value = "main")]
    pub branch: String,
}
