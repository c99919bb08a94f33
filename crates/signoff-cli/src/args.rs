//! Command-line surface for `signoff-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "signoff-cli", version, about = "signoff publishing API CLI", long_about = None)]
pub struct Cli {
    /// Service base URL, e.g. <https://signoff.example.com>
    #[arg(long, env = "SIGNOFF_SITE_URL")]
    pub site: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish a report JSON file and print the artifact URLs
    Publish {
        /// Report document to publish
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Publish under the report id verbatim, replacing earlier artifacts
        #[arg(long)]
        force: bool,
    },
    /// Convert a published HTML artifact to PDF
    Pdf {
        /// Public URL of the HTML artifact
        #[arg(value_name = "URL")]
        url: String,
        #[arg(long, value_enum, default_value_t = ProviderArg::Headless)]
        provider: ProviderArg,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Headless,
    Docraptor,
}

impl ProviderArg {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderArg::Headless => "headless",
            ProviderArg::Docraptor => "docraptor",
        }
    }
}

impl fmt::Display for ProviderArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
