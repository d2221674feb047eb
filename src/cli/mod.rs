use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tubetrace",
    about = "TubeTrace - YouTube metadata, downloads and music recognition over HTTP",
    version,
    long_about = "A small HTTP service that looks up YouTube video metadata, streams progressive or audio-only downloads, and identifies the music in a video with ACRCloud. Uses yt-dlp for extraction and ffmpeg to cut recognition samples."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind (overrides TUBETRACE_HOST and the config file)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides TUBETRACE_PORT, PORT and the config file)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,

        /// Configuration file (YAML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Inspect the resolved configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Configuration file (YAML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}
