pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{build_crawl_config, expand_path, init_logging, resolve_db_path};

// Re-export crawl functionality from sitegraph-core
pub use sitegraph_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl};
pub use sitegraph_core::report::generate_crawl_report;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
