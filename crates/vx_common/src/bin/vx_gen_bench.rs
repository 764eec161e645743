use anyhow::Result;
use vx_common::gen_bench::run_gen_bench;

fn main() -> Result<()> {
    run_gen_bench()
}
