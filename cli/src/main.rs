use anyhow::Result;

fn main() -> Result<()> {
    ontotree_cli::run()
}
