use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Exactly one operation per invocation: probe redis, submit a file, or
/// query the status of an existing task.
#[derive(Parser, Debug)]
#[command(
    name = "pandora",
    version,
    about = "Submit files to a Pandora instance and query analysis results.",
    group(ArgGroup::new("operation").required(true))
)]
pub struct Args {
    /// URL of the instance to query.
    #[arg(
        long,
        default_value = "https://pandora.circl.lu",
        env = "PANDORA_URL"
    )]
    pub url: String,

    /// API key used to authenticate the session.
    #[arg(long, env = "PANDORA_APIKEY")]
    pub apikey: Option<String>,

    /// Request timeout in seconds. No timeout when unset.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Check if redis is up.
    #[arg(long = "redis_up", group = "operation")]
    pub redis_up: bool,

    /// Path to the file to submit.
    #[arg(short, long, group = "operation")]
    pub file: Option<PathBuf>,

    /// Seed validity in seconds; the seed never expires when 0.
    #[arg(long = "seed_expire", requires = "file")]
    pub seed_expire: Option<u64>,

    /// Id of the task to get the status of.
    #[arg(long = "task_id", group = "operation")]
    pub task_id: Option<String>,

    /// Seed returned when the task was submitted.
    #[arg(long, requires = "task_id")]
    pub seed: Option<String>,

    /// Show the status of every worker.
    #[arg(long = "all_workers", requires = "task_id", conflicts_with = "worker_name")]
    pub all_workers: bool,

    /// Show the status of a single worker.
    #[arg(long = "worker_name", requires = "task_id")]
    pub worker_name: Option<String>,

    /// Include the full report of each worker.
    #[arg(long, requires = "task_id")]
    pub details: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RedisUp,
    Submit {
        file: PathBuf,
        seed_expire: Option<u64>,
    },
    TaskStatus {
        task_id: String,
        seed: Option<String>,
        details: bool,
    },
    WorkerStatus {
        worker_name: Option<String>,
        all_workers: bool,
        details: bool,
    },
}

impl Args {
    /// Resolve the parsed flags into the one operation to run. Called
    /// once at startup, before any request is made.
    pub fn command(&self) -> Result<Command> {
        if self.redis_up {
            return Ok(Command::RedisUp);
        }
        if let Some(file) = &self.file {
            return Ok(Command::Submit {
                file: file.clone(),
                seed_expire: self.seed_expire,
            });
        }
        if let Some(task_id) = &self.task_id {
            if self.all_workers || self.worker_name.is_some() {
                return Ok(Command::WorkerStatus {
                    worker_name: self.worker_name.clone(),
                    all_workers: self.all_workers,
                    details: self.details,
                });
            }
            return Ok(Command::TaskStatus {
                task_id: task_id.clone(),
                seed: self.seed.clone(),
                details: self.details,
            });
        }
        Err(Error::InvalidArguments(
            "one of --redis_up, --file or --task_id is required".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_operation_is_rejected() {
        assert!(Args::try_parse_from(["pandora"]).is_err());
    }

    #[test]
    fn conflicting_operations_are_rejected() {
        assert!(Args::try_parse_from(["pandora", "--redis_up", "-f", "sample.bin"]).is_err());
        assert!(Args::try_parse_from(["pandora", "--redis_up", "--task_id", "t"]).is_err());
    }

    #[test]
    fn worker_selectors_conflict() {
        assert!(Args::try_parse_from([
            "pandora",
            "--task_id",
            "t",
            "--all_workers",
            "--worker_name",
            "clamav",
        ])
        .is_err());
    }

    #[test]
    fn worker_flags_require_a_task() {
        assert!(Args::try_parse_from(["pandora", "--all_workers"]).is_err());
        assert!(Args::try_parse_from(["pandora", "--redis_up", "--details"]).is_err());
    }

    #[test]
    fn seed_expire_requires_a_file() {
        assert!(Args::try_parse_from(["pandora", "--redis_up", "--seed_expire", "60"]).is_err());
    }

    #[test]
    fn submit_command() {
        let args =
            Args::try_parse_from(["pandora", "-f", "sample.bin", "--seed_expire", "600"]).unwrap();
        assert_eq!(
            args.command().unwrap(),
            Command::Submit {
                file: PathBuf::from("sample.bin"),
                seed_expire: Some(600),
            }
        );
    }

    #[test]
    fn task_status_command() {
        let args =
            Args::try_parse_from(["pandora", "--task_id", "t", "--seed", "s", "--details"])
                .unwrap();
        assert_eq!(
            args.command().unwrap(),
            Command::TaskStatus {
                task_id: "t".into(),
                seed: Some("s".into()),
                details: true,
            }
        );
    }

    #[test]
    fn worker_selector_routes_to_worker_status() {
        let args = Args::try_parse_from(["pandora", "--task_id", "t", "--all_workers"]).unwrap();
        assert_eq!(
            args.command().unwrap(),
            Command::WorkerStatus {
                worker_name: None,
                all_workers: true,
                details: false,
            }
        );

        let args =
            Args::try_parse_from(["pandora", "--task_id", "t", "--worker_name", "clamav"]).unwrap();
        assert_eq!(
            args.command().unwrap(),
            Command::WorkerStatus {
                worker_name: Some("clamav".into()),
                all_workers: false,
                details: false,
            }
        );
    }
}
