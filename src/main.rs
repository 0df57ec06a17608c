use anyhow::Context;

fn main() -> anyhow::Result<()> {
    fibermap::run().context("fibermap failed")
}
