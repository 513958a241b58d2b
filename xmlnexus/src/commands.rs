use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("xmlnexus")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("xmlnexus")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about("Discover a site's sitemaps and map their full hierarchy")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The site to scan (scheme optional, https assumed)"),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum sitemap nesting depth to follow")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(-m --"max-urls" <COUNT>)
                        .required(false)
                        .help("Stop counting page URLs once this many have been seen")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10000"),
                )
                .arg(
                    arg!(-c --"concurrency" <NUM_FETCHES>)
                        .required(false)
                        .help("Maximum number of sitemap fetches in flight at once")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"ndjson")
                        .required(false)
                        .help("Emit newline-delimited JSON events instead of a report")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the report to a file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"no-save")
                        .required(false)
                        .help("Do not record this scan in the history database")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Location of the history database")
                        .default_value("~/.config/xmlnexus/history.db"),
                ),
        )
        .subcommand(
            command!("parse")
                .about("Parse a local sitemap file without fetching it")
                .arg(
                    arg!(-f --"file" <PATH>)
                        .required(true)
                        .help("Path to the sitemap document to parse")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-b --"base" <URL>)
                        .required(true)
                        .help("URL the document stands in for; child references resolve against it"),
                )
                .arg(
                    arg!(--"ndjson")
                        .required(false)
                        .help("Emit newline-delimited JSON events instead of a report")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("analyze")
                .about("Fetch a single page and report its SEO metadata")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The page to analyze")
                        .value_parser(clap::value_parser!(Url)),
                ),
        )
        .subcommand(
            command!("history")
                .about("Inspect previously scanned sites")
                .subcommand(
                    command!("list")
                        .about("Show the most recently scanned sites")
                        .arg(
                            arg!(-n --"limit" <COUNT>)
                                .required(false)
                                .help("Maximum number of rows to show")
                                .value_parser(clap::value_parser!(usize))
                                .default_value("20"),
                        )
                        .arg(
                            arg!(--"db" <PATH>)
                                .required(false)
                                .help("Location of the history database")
                                .default_value("~/.config/xmlnexus/history.db"),
                        ),
                )
                .subcommand(
                    command!("clear")
                        .about("Delete all scan history")
                        .arg(
                            arg!(--"db" <PATH>)
                                .required(false)
                                .help("Location of the history database")
                                .default_value("~/.config/xmlnexus/history.db"),
                        ),
                ),
        )
}
