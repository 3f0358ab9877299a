use clap::Parser;
use dockercp::{Args, run};
use env_logger::Builder;
use log::LevelFilter;

fn main() {
    let args = Args::parse();
    let mut builder = Builder::new();
    let level = if args.silent {
        LevelFilter::Off
    } else if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    builder.filter_level(level);
    builder.init();

    if let Err(e) = run(args) {
        println!("error: {e:#}");
        println!("Use the -h option to see the usage help");
        std::process::exit(1);
    }
}
