use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use serde::Serialize;

use crate::cli::{OutputArgs, OutputFormat, TargetArgs};

pub fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).context("serialize yaml"),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value).context("serialize json")?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Writes `value` to `--out`, or stdout when no path is given.
pub fn write_output<T: Serialize + ?Sized>(value: &T, args: &OutputArgs) -> anyhow::Result<()> {
    let text = render(value, args.format)?;
    write_text(&text, &args.target)
}

/// Writes `text` as-is to `--out`, or stdout when no path is given.
pub fn write_text(text: &str, args: &TargetArgs) -> anyhow::Result<()> {
    let Some(out) = &args.out else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes()).context("write stdout")?;
        stdout.flush().context("flush stdout")?;
        return Ok(());
    };

    let out_path = PathBuf::from(out);
    if out_path.exists() && !args.force {
        anyhow::bail!("output already exists: {}", out_path.display());
    }
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if args.force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(&out_path)
        .with_context(|| format!("open output: {}", out_path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("write output: {}", out_path.display()))?;
    file.flush()
        .with_context(|| format!("flush output: {}", out_path.display()))?;

    Ok(())
}
