use crate::api_client::{ApiClient, TaskStatus, WorkerReport};
use crate::args::Command;
use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug)]
pub struct Runner {
    client: ApiClient,
}

impl Runner {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn run(&self, command: &Command) -> Result<()> {
        match command {
            Command::RedisUp => {
                let up = self.client.redis_up()?;
                println!("redis: {}", if up { "up" } else { "down" });
            }
            Command::Submit { file, seed_expire } => {
                let submission = self.client.submit_file(file, *seed_expire)?;
                println!("task_id: {}", submission.task_id);
                println!("seed:    {}", submission.seed);
                if let Some(link) = &submission.link {
                    println!("link:    {link}");
                }
            }
            Command::TaskStatus {
                task_id,
                seed,
                details,
            } => {
                let status = self
                    .client
                    .task_status(task_id, seed.as_deref(), *details)?;
                print_task_status(&status);
            }
            Command::WorkerStatus {
                worker_name,
                all_workers,
                details,
            } => {
                let workers =
                    self.client
                        .worker_status(worker_name.as_deref(), *all_workers, *details)?;
                print_workers(&workers);
            }
        }

        Ok(())
    }
}

fn print_task_status(status: &TaskStatus) {
    println!("task_id: {}", status.task_id);
    println!("state:   {}", status.state);
    if let Some(workers) = &status.workers {
        print_workers(workers);
    }
}

fn print_workers(workers: &HashMap<String, WorkerReport>) {
    let mut names: Vec<&String> = workers.keys().collect();
    names.sort();

    for name in names {
        let report = &workers[name];
        println!("{:<20} {}", format!("{name}:"), report.status);

        let mut findings: Vec<(&String, &serde_json::Value)> = report.findings.iter().collect();
        findings.sort_by_key(|(key, _)| *key);
        for (key, value) in findings {
            println!("    {key}: {value}");
        }

        if let Some(details) = &report.details {
            let rendered =
                serde_json::to_string_pretty(details).unwrap_or_else(|_| details.to_string());
            for line in rendered.lines() {
                println!("    {line}");
            }
        }
    }
}
