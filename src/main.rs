use anyhow::Result;
use quadslice_rs::{run, Config};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cfg = Config::new()?;
    run(cfg)
}
