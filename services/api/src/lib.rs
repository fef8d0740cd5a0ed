mod cli;
mod demo;
mod infra;
mod routes;
mod server;
mod sync;

use leave_desk::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
