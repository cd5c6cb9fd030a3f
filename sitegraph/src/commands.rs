use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub const DEFAULT_DATA_DIR: &str = "~/.config/sitegraph/";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegraph")
        .about("Crawl a site breadth-first, map its internal links, find orphans and broken links")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and informational logging")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log every fetch and queueing decision")
                .required(false)
                .global(true)
                .conflicts_with("quiet"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the sitegraph database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the sitegraph database")
                        .default_value(DEFAULT_DATA_DIR),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Replace any existing database at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl a site from a root URL and report orphan pages and broken links")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required_unless_present("config")
                        .help("The root URL to crawl. Only pages on its host are followed")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"config" <PATH>)
                        .required(false)
                        .help("JSON crawl configuration. Flags given on the command line override it"),
                )
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum number of pages to fetch [default: 500]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum link distance from the root to follow")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds [default: 10]")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"delay" <MILLIS>)
                        .required(false)
                        .help("Pause between requests in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"exclude" <SELECTOR>)
                        .required(false)
                        .help("CSS selector of a region whose links are ignored (repeatable). Replaces the default nav/header/footer set")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"robots")
                        .required(false)
                        .help("Honor robots.txt")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"sitemap")
                        .required(false)
                        .help("Seed the crawl with same-host URLs from the site's sitemaps")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-c --"concurrency" <NUM>)
                        .required(false)
                        .help("Number of pages fetched at once [default: 1]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-duration" <SECONDS>)
                        .required(false)
                        .help("Stop the crawl after this many seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"user-agent" <AGENT>)
                        .required(false)
                        .help("User-agent sent with every request"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the link graph to a file")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Graph file format: edges, graph, dot")
                        .value_parser(["edges", "graph", "dot"])
                        .default_value("edges"),
                )
                .arg(
                    arg!(--"save")
                        .required(false)
                        .help("Store the crawl in the sitegraph database")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Database file [default: ~/.config/sitegraph/sitegraph.db]"),
                ),
        )
        .subcommand(
            command!("analyze")
                .about("Report orphan pages and broken links of an exported edge list")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("Edge list JSON written by `crawl -f edges`")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"root" <URL>)
                        .required(false)
                        .help("Root page, exempt from orphan detection [default: first source]")
                        .value_parser(clap::value_parser!(Url)),
                ),
        )
        .subcommand(
            command!("sessions")
                .about("Inspect crawls stored with `crawl --save`")
                .subcommand_required(true)
                .subcommand(
                    command!("list").about("List stored crawl sessions").arg(
                        arg!(--"db" <PATH>)
                            .required(false)
                            .help("Database file [default: ~/.config/sitegraph/sitegraph.db]"),
                    ),
                )
                .subcommand(
                    command!("show")
                        .about("Print the report of a stored crawl session")
                        .arg(arg!(<ID>).required(true).help("Session id"))
                        .arg(
                            arg!(--"db" <PATH>)
                                .required(false)
                                .help("Database file [default: ~/.config/sitegraph/sitegraph.db]"),
                        ),
                ),
        )
}
