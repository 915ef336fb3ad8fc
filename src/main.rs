use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    folio::logging::init().context("init logging")?;

    let cli = folio::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        folio::cli::Command::Toc(args) => {
            folio::toc::run(args).context("toc")?;
        }
        folio::cli::Command::Sections(args) => {
            folio::sections::run(args).context("sections")?;
        }
        folio::cli::Command::Render(args) => {
            folio::render::run(args).context("render")?;
        }
        folio::cli::Command::Progress(args) => {
            folio::progress::run(args).context("progress")?;
        }
        folio::cli::Command::Check(args) => {
            folio::content::check(args).await.context("check")?;
        }
    }

    Ok(())
}
