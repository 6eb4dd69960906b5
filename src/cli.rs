use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidserve")]
#[command(author, version, about = "Range-request video and cover streaming server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Register a video whose media and cover objects are already stored
    AddVideo {
        /// Video title
        #[arg(long)]
        title: String,

        /// Creator name
        #[arg(long)]
        creator: String,

        /// Object key of the media file in the video bucket
        #[arg(long)]
        video: String,

        /// Object key of the cover image in the cover bucket
        #[arg(long)]
        cover: String,

        /// Optional description
        #[arg(long)]
        description: Option<String>,

        /// Explicit video id (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// MIME type of the media file
        #[arg(long, default_value = "video/mp4")]
        video_mime: String,

        /// MIME type of the cover image
        #[arg(long, default_value = "image/jpeg")]
        cover_mime: String,

        /// Skip checking that both objects exist in the store
        #[arg(long)]
        no_verify: bool,
    },

    /// Display version information
    Version,
}
