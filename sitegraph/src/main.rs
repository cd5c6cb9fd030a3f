use colored::Colorize;
use sitegraph::commands::command_argument_builder;
use sitegraph::handlers::{
    handle_analyze, handle_crawl, handle_init, handle_sessions_list, handle_sessions_show,
    init_logging,
};
use sitegraph_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    init_logging(verbose, quiet);

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("analyze", primary_command)) => handle_analyze(primary_command),
        Some(("sessions", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handle_sessions_list(secondary_command),
            Some(("show", secondary_command)) => handle_sessions_show(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
