#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    blanki_server::run().await
}
