#[tokio::main]
async fn main() {
    if let Err(err) = dmsweep_cli::cli::app::run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
