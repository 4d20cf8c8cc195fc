use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    nikayabook::logging::init().context("init logging")?;

    let cli = nikayabook::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        nikayabook::cli::Command::Index(args) => {
            nikayabook::build::index(args).context("index")?;
        }
        nikayabook::cli::Command::Tree(args) => {
            nikayabook::build::tree(args).context("tree")?;
        }
        nikayabook::cli::Command::Book(args) => {
            nikayabook::build::book(args).context("book")?;
        }
        nikayabook::cli::Command::Build(args) => {
            nikayabook::build::run(args).context("build")?;
        }
    }

    Ok(())
}
