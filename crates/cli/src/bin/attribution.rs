use anyhow::Result;

fn main() -> Result<()> {
    attribution_cli::main_entry()
}
