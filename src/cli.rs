use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the heading table of contents of a case study.
    Toc(TocArgs),
    /// Split a case study into its top-level sections.
    Sections(SectionsArgs),
    /// Render a case study to an HTML fragment with heading anchors.
    Render(RenderArgs),
    /// Compute reading progress for a container/viewport geometry.
    Progress(ProgressArgs),
    /// Validate a content data directory.
    Check(CheckArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Output file path (default: stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite `--out` if it already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Serialization format for structured output.
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct TocArgs {
    /// Input markdown file.
    #[arg(long)]
    pub input: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct SectionsArgs {
    /// Input markdown file.
    #[arg(long)]
    pub input: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Input markdown file.
    #[arg(long)]
    pub input: String,

    // HTML only; there is no `--format`.
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Args)]
pub struct ProgressArgs {
    /// Document offset of the container's top edge.
    #[arg(long, allow_negative_numbers = true)]
    pub container_top: f64,

    /// Rendered height of the container.
    #[arg(long)]
    pub container_height: f64,

    /// Height of the viewport.
    #[arg(long)]
    pub viewport_height: f64,

    /// Current vertical scroll offset.
    #[arg(long, allow_negative_numbers = true)]
    pub scroll_y: f64,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Directory holding projects.json, experiences.json, certifications.json and skills.json.
    #[arg(long)]
    pub data_dir: String,
}
