// src/main.rs

fn main() -> anyhow::Result<()> {
    cutline_lib::run()
}
