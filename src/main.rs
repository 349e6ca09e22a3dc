use clap::Parser;

use backgrounder::background::cli::BackgroundCommands;
use backgrounder::background::commands::handle_background_command;
use backgrounder::ui::{self, prelude::*};

/// Set the GNOME wallpaper, lock screen and login screen background
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print the commands that would run instead of changing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: BackgroundCommands,
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);

    if let Err(e) = handle_background_command(cli.command, cli.dry_run) {
        emit(
            Level::Error,
            "backgrounder.error",
            &format!("{} {e:#}", char::from(NerdFont::CrossCircle)),
            None,
        );
        std::process::exit(1);
    }
}
