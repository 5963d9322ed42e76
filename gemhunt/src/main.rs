use colored::Colorize;
use commands::command_argument_builder;
use gemhunt::handlers::{handle_download, handle_enrich, handle_metadata, handle_sources, init_logging};
use gemhunt_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose")
        || chosen_command
            .subcommand()
            .is_some_and(|(_, sub)| sub.get_flag("verbose"));

    init_logging(verbose);

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("enrich", primary_command)) => handle_enrich(primary_command, quiet).await,
        Some(("download", primary_command)) => handle_download(primary_command, quiet).await,
        Some(("metadata", primary_command)) => handle_metadata(primary_command),
        Some(("sources", primary_command)) => handle_sources(primary_command).await,
        // No subcommand provided, just show the banner
        None => return,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    // Only fatal file I/O and unusable configuration end up here
    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
