use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present; missing/unreadable
    // .env is not fatal, unlike a missing GITHUB_TOKEN later on.
    let _ = dotenvy::dotenv();

    match cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
