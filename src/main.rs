//! filetidy - Bulk Filesystem Maintenance
//!
//! Entry point for the filetidy CLI application.

use clap::Parser;
use filetidy::{
    cli::Cli,
    config::ConfigError,
    error::{ExitCode, StructuredError},
};

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    // Run the application logic
    match filetidy::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            // Configuration problems are refused before anything is touched
            let exit_code = if err.downcast_ref::<ConfigError>().is_some() {
                ExitCode::ConfigurationError
            } else {
                ExitCode::GeneralError
            };

            // Report the error
            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else {
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
