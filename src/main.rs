use clap::Parser;
use tracefix::cli::{self, Args};
use tracefix::core::error::{AppError, DefaultErrorReporter, ErrorReporter};
use tracefix::logging;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let guard = match logging::init(&args.command) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: logging disabled: {:#}", err);
            None
        }
    };

    if let Err(err) = cli::run(args).await {
        match err.downcast_ref::<AppError>() {
            Some(app_error) => DefaultErrorReporter::new().report_error(app_error),
            None => eprintln!("Error: {:#}", err),
        }
        // Flush the file sink before exiting.
        drop(guard);
        std::process::exit(1);
    }
}
