use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let summary = bidding_cli::run().await.map_err(|e| anyhow::anyhow!(e))?;
    println!("{summary}");
    Ok(())
}
