use anyhow::{anyhow, Result};
use clap::Parser;
use log::debug;

pub mod archive;
pub mod docker;
pub mod path;

use docker::{Client, Endpoint};
use path::{PathSpec, Transfer};

// 8 KiB
const DEFAULT_BUFFER_SIZE: usize = 8192;

#[derive(Parser, Debug)]
#[command(about = "Copy files from/to Docker containers")]
pub struct Args {
    /// source file or directory to copy.
    /// [CONTAINER:]<path>
    #[clap(required = true)]
    src: String,

    /// destination the source should be copied into.
    /// [CONTAINER:]<path>
    #[clap(required = true)]
    dest: String,

    /// buffer size (bytes) used to copy to/from the container
    #[clap(short, long, default_value_t = DEFAULT_BUFFER_SIZE, value_parser = parse_buffer_size)]
    buffer_size: usize,

    /// docker daemon to talk to.
    /// defaults to DOCKER_HOST, then the local socket
    #[clap(short = 'H', long)]
    host: Option<String>,

    /// timeout for requests to the daemon,
    /// in seconds
    #[clap(short, long = "timeout", default_value_t = 120)]
    timeout_seconds: u64,

    /// silent mode
    #[clap(long)]
    pub silent: bool,

    /// debug
    #[clap(long)]
    pub debug: bool,
}

fn parse_buffer_size(size: &str) -> Result<usize> {
    let size: usize = size
        .parse()
        .map_err(|_| anyhow!("buffer size must be a number of bytes: {}", size))?;
    if size == 0 {
        return Err(anyhow!("buffer size must be greater than zero"));
    }
    Ok(size)
}

pub fn run(args: Args) -> Result<()> {
    let src = PathSpec::parse(&args.src)?;
    let dest = PathSpec::parse(&args.dest)?;
    debug!("copying {} -> {}", src, dest);
    let transfer = Transfer::new(src, dest)?;
    let endpoint = Endpoint::parse(args.host.as_deref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let client = Client::connect(&endpoint, args.timeout_seconds)?;
        client.ping().await?;
        client.copy(&transfer, args.buffer_size).await
    })
}
