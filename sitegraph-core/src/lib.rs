pub mod analyze;
pub mod crawl;
pub mod data;
pub mod export;
pub mod report;

use colored::Colorize;

const BANNER: &str = r#"
     _ _                             _
 ___(_) |_ ___  __ _ _ __ __ _ _ __ | |__
/ __| | __/ _ \/ _` | '__/ _` | '_ \| '_ \
\__ \ | ||  __/ (_| | | | (_| | |_) | | | |
|___/_|\__\___|\__, |_|  \__,_| .__/|_| |_|
               |___/          |_|
"#;

pub fn print_banner() {
    eprintln!("{}", BANNER.bright_cyan());
    eprintln!(
        "  {} {}\n",
        "sitegraph".bold(),
        format!("v{} - map the links of a site", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
