mod dashboard;
mod driver;
#[cfg(feature = "esp32")]
mod esp;
mod feedback;
mod hardware;
#[cfg(not(feature = "esp32"))]
mod host;
mod http;
mod response;
mod server;

#[cfg(not(feature = "esp32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    host::run().await
}

#[cfg(feature = "esp32")]
fn main() -> anyhow::Result<()> {
    esp::run()
}
