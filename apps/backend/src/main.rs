#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wanikani_cache_backend::run().await
}
