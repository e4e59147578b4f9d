#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fuse_agent::run().await
}
