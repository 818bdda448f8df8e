//! Langforge command-line client.
//!
//! Provides the `langforge` binary with subcommands for working with
//! generated language toolchains:
//! - `generate` submits a description to the server and drives the
//!   bounded status poll loop until the package is ready (or the bound
//!   runs out, which is reported as an unknown outcome, not a failure);
//! - `run` executes a program against a downloaded package in the
//!   sandbox, printing the transcript;
//! - `unpack` extracts package entries to disk.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use serde_json::json;

use langforge_core::package::{
    ENTRY_EXAMPLE, ENTRY_INTERPRETER_SOURCE, ENTRY_LOADER, ENTRY_MODULE, ENTRY_README,
};
use langforge_core::LanguagePackage;
use langforge_sandbox::{Interpreter, SessionOutcome};

/// Exit code for an unknown outcome (poll bound exhausted).
const EXIT_UNKNOWN_OUTCOME: i32 = 2;

/// Langforge client and sandbox runner.
#[derive(Parser)]
#[command(name = "langforge", about = "Generate and run custom language toolchains")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Submit a language description and wait for the built package.
    Generate {
        /// Natural-language description of the language.
        description: String,

        /// Langforge server base URL.
        #[arg(long, default_value = "http://localhost:3000")]
        server: String,

        /// Seconds between status polls.
        #[arg(long, default_value_t = 3)]
        interval: u64,

        /// Give up after this many status checks.
        #[arg(long, default_value_t = 200)]
        max_checks: u32,

        /// Where to write the built package.
        #[arg(short, long, default_value = "language-package.json")]
        output: PathBuf,
    },

    /// Run a program against a built package in the sandbox.
    Run {
        /// Path to the package file.
        #[arg(short, long)]
        package: PathBuf,

        /// Program source to run; the package's example runs if omitted.
        program: Option<PathBuf>,
    },

    /// Extract package entries into a directory.
    Unpack {
        /// Path to the package file.
        #[arg(short, long)]
        package: PathBuf,

        /// Directory to extract into.
        #[arg(short, long, default_value = "./language")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Generate {
            description,
            server,
            interval,
            max_checks,
            output,
        } => run_generate(&description, &server, interval, max_checks, &output).await,
        Commands::Run { package, program } => run_program(&package, program.as_deref()),
        Commands::Unpack { package, out_dir } => run_unpack(&package, &out_dir),
    };

    process::exit(exit_code);
}

/// Terminal result of the status poll loop.
#[derive(Debug, PartialEq, Eq)]
enum PollResult {
    Complete { package: Vec<u8> },
    Errored { diagnostic: String },
    Terminated,
    /// The check bound ran out before a terminal status appeared. The run
    /// may still finish server-side; this is unknown, not failed.
    TimedOut { checks: u32 },
}

/// Client-driven cooperative status poll: fixed interval, bounded checks,
/// stops at the first terminal status without issuing another request.
async fn poll_status<F, Fut>(
    mut fetch: F,
    interval: Duration,
    max_checks: u32,
) -> Result<PollResult, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, String>>,
{
    for check in 0..max_checks {
        let body = fetch().await?;
        match body["status"].as_str().unwrap_or_default() {
            "complete" => {
                let encoded = body["output"]
                    .as_str()
                    .ok_or("status is complete but no output was returned")?;
                let package = BASE64
                    .decode(encoded)
                    .map_err(|err| format!("package payload is not valid base64: {err}"))?;
                return Ok(PollResult::Complete { package });
            }
            "errored" => {
                return Ok(PollResult::Errored {
                    diagnostic: body["error"].as_str().unwrap_or("unknown error").to_string(),
                });
            }
            "terminated" => return Ok(PollResult::Terminated),
            _ => {}
        }
        if check + 1 < max_checks {
            tokio::time::sleep(interval).await;
        }
    }
    Ok(PollResult::TimedOut { checks: max_checks })
}

async fn run_generate(
    description: &str,
    server: &str,
    interval: u64,
    max_checks: u32,
    output: &Path,
) -> i32 {
    let client = reqwest::Client::new();

    let submit = async {
        let response = client
            .post(format!("{server}/generate"))
            .json(&json!({ "prompt": description }))
            .send()
            .await
            .map_err(|err| format!("submit failed: {err}"))?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| format!("submit response was not JSON: {err}"))?;
        body["workflowId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("submit was rejected: {body}"))
    };
    let workflow_id = match submit.await {
        Ok(id) => id,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    println!("Submitted run {workflow_id}, polling for the built package...");

    let status_url = format!("{server}/generate/status?workflowId={workflow_id}");
    let result = poll_status(
        || {
            let client = client.clone();
            let url = status_url.clone();
            async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|err| format!("status poll failed: {err}"))?;
                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|err| format!("status response was not JSON: {err}"))
            }
        },
        Duration::from_secs(interval),
        max_checks,
    )
    .await;

    match result {
        Ok(PollResult::Complete { package }) => {
            if let Err(err) = std::fs::write(output, &package) {
                eprintln!("failed to write {}: {err}", output.display());
                return 1;
            }
            println!("Package written to {}.", output.display());
            println!("Try it: langforge run --package {}", output.display());
            0
        }
        Ok(PollResult::Errored { diagnostic }) => {
            eprintln!("Run failed:\n{diagnostic}");
            1
        }
        Ok(PollResult::Terminated) => {
            eprintln!("Run was terminated.");
            1
        }
        Ok(PollResult::TimedOut { checks }) => {
            eprintln!(
                "No terminal status after {checks} checks; the run may still \
                 finish. Poll again later with the same workflow id: {workflow_id}"
            );
            EXIT_UNKNOWN_OUTCOME
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

fn run_program(package_path: &Path, program_path: Option<&Path>) -> i32 {
    let package = match read_package(package_path) {
        Ok(package) => package,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    let program = match program_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(program) => program,
            Err(err) => {
                eprintln!("failed to read {}: {err}", path.display());
                return 1;
            }
        },
        None => {
            println!("No program given; running the package example.\n");
            package.example.clone()
        }
    };

    let mut interpreter = match Interpreter::load(&package) {
        Ok(interpreter) => interpreter,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    match interpreter.run_program(&program) {
        SessionOutcome::Completed { transcript, .. } => {
            println!("{transcript}");
            0
        }
        SessionOutcome::Failed { diagnostic } => {
            eprintln!("Execution failed:\n{diagnostic}");
            1
        }
    }
}

fn run_unpack(package_path: &Path, out_dir: &Path) -> i32 {
    let package = match read_package(package_path) {
        Ok(package) => package,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    if let Err(err) = std::fs::create_dir_all(out_dir) {
        eprintln!("failed to create {}: {err}", out_dir.display());
        return 1;
    }

    let entries: [(&str, &[u8]); 5] = [
        (ENTRY_INTERPRETER_SOURCE, package.interpreter_source.as_bytes()),
        (ENTRY_LOADER, package.loader_script.as_bytes()),
        (ENTRY_MODULE, &package.module),
        (ENTRY_README, package.readme.as_bytes()),
        (ENTRY_EXAMPLE, package.example.as_bytes()),
    ];
    for (name, bytes) in entries {
        let path = out_dir.join(name);
        if let Err(err) = std::fs::write(&path, bytes) {
            eprintln!("failed to write {}: {err}", path.display());
            return 1;
        }
        println!("wrote {}", path.display());
    }
    0
}

fn read_package(path: &Path) -> Result<LanguagePackage, String> {
    let bytes =
        std::fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    LanguagePackage::decode(&bytes).map_err(|err| format!("not a usable package: {err}"))
}
