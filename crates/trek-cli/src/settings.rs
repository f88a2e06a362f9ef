use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Trek - inspect, profile and export multi-route treks from a saved store
pub struct Settings {
    /// JSON store file written by the trek library
    #[clap(short, long, env = "TREK_STORE", default_value = "trek-store.json")]
    pub store: PathBuf,

    /// Sphere radius in meters used for elevation profile distances
    #[clap(long, env = "TREK_EARTH_RADIUS", default_value = "6371000")]
    pub earth_radius: f64,

    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long, default_value = "false")]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List every trek with its owner and route count
    List,

    /// Totals, bounds and per-route state of one trek
    Summary {
        /// Trek name
        trek: String,
    },

    /// Distance (km) versus elevation (m) samples of one trek
    Profile {
        /// Trek name
        trek: String,

        /// Print a JSON array instead of CSV
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Write one trek as `<trek name>.gpx`
    Export {
        /// Trek name
        trek: String,

        /// Directory the document is written to
        #[clap(short, long, default_value = ".")]
        output: PathBuf,
    },
}
