use anyhow::Context;

use extent_replay::replay_main;

fn main() -> anyhow::Result<()> {
    replay_main().context("replay failed")?;
    logger::debug!("replay done");
    Ok(())
}
