use commands::command_argument_builder;
use tracing_subscriber::EnvFilter;
use xmlnexus_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // NDJSON output goes to stdout, so the banner would corrupt the stream
    let ndjson = matches!(
        chosen_command.subcommand(),
        Some(("scan" | "parse", sub)) if sub.get_flag("ndjson")
    );

    // Show banner unless --quiet flag is set
    if !quiet && !ndjson {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    match chosen_command.subcommand() {
        Some(("scan", primary_command)) => xmlnexus::handlers::handle_scan(primary_command).await,
        Some(("parse", primary_command)) => xmlnexus::handlers::handle_parse(primary_command).await,
        Some(("analyze", primary_command)) => {
            xmlnexus::handlers::handle_analyze(primary_command).await
        }
        Some(("history", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => {
                xmlnexus::handlers::handle_history_list(secondary_command)
            }
            Some(("clear", secondary_command)) => {
                xmlnexus::handlers::handle_history_clear(secondary_command)
            }
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
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
