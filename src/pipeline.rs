//! Declaration of the scheduled pipeline that triggers the offboarding job.
//!
//! The orchestration platform owns scheduling and operator execution; this
//! module only describes what it should run, as an immutable value.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use thiserror::Error;

pub const PIPELINE_NAME: &str = "cauldron-offboarding-test";

/// Template variable replaced by the run date as `YYYYMMDD`
const DS_NODASH: &str = "{{ ds_nodash }}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pipeline has no tasks")]
    Empty,
    #[error("Duplicate task id '{0}'")]
    DuplicateTask(String),
    #[error("Dependency references unknown task '{0}'")]
    UnknownTask(String),
    #[error("Task dependencies form a cycle")]
    Cycle,
    #[error("Invalid cron schedule '{0}' (expected five fields)")]
    InvalidSchedule(String),
}

/// Whole-task retry behaviour applied by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    pub retries: u32,
    #[serde(rename = "retry_delay_seconds", serialize_with = "as_seconds")]
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), `None` once exhausted
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        (attempt >= 1 && attempt <= self.retries).then_some(self.retry_delay)
    }
}

fn as_seconds<S: serde::Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(delay.as_secs())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultArgs {
    pub owner: String,
    pub start_date: NaiveDate,
    pub email: Vec<String>,
    pub email_on_failure: bool,
    pub email_on_retry: bool,
    #[serde(flatten)]
    pub retry_policy: RetryPolicy,
    pub queue: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Operator {
    ExperimentCreation {
        name: String,
        pipeline: String,
        cloud: String,
    },
    SparkJobCreation {
        pipeline: String,
        experiment: String,
        job_name: String,
        cloud: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    pub task_id: String,
    #[serde(flatten)]
    pub operator: Operator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub upstream: String,
    pub downstream: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDefinition {
    pub name: String,
    /// Five-field cron expression
    pub schedule: String,
    pub max_active_runs: u32,
    pub default_args: DefaultArgs,
    pub tasks: Vec<TaskDefinition>,
    pub dependencies: Vec<Dependency>,
}

impl PipelineDefinition {
    /// The production pipeline: create the experiment, then run the job
    /// that sweeps deactivated accounts.
    pub fn cauldron_offboarding(owner: &str, email: &str) -> Self {
        let experiment_name = format!("{PIPELINE_NAME}-{DS_NODASH}");
        let experiment_task = format!("experiment-{PIPELINE_NAME}");
        let job_task = "spark-store-deactivated-accounts".to_string();

        Self {
            name: PIPELINE_NAME.to_string(),
            schedule: "20 01 * * *".to_string(),
            max_active_runs: 1,
            default_args: DefaultArgs {
                owner: owner.to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 8, 26).unwrap_or_default(),
                email: vec![email.to_string()],
                email_on_failure: false,
                email_on_retry: false,
                retry_policy: RetryPolicy {
                    retries: 3,
                    retry_delay: Duration::from_secs(3 * 60),
                },
                queue: "default".to_string(),
            },
            tasks: vec![
                TaskDefinition {
                    task_id: experiment_task.clone(),
                    operator: Operator::ExperimentCreation {
                        name: experiment_name.clone(),
                        pipeline: PIPELINE_NAME.to_string(),
                        cloud: "aws".to_string(),
                    },
                },
                TaskDefinition {
                    task_id: job_task.clone(),
                    operator: Operator::SparkJobCreation {
                        pipeline: PIPELINE_NAME.to_string(),
                        experiment: experiment_name,
                        job_name: "store-deactivated-accounts".to_string(),
                        cloud: "aws".to_string(),
                    },
                },
            ],
            dependencies: vec![Dependency {
                upstream: experiment_task,
                downstream: job_task,
            }],
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.schedule.split_whitespace().count() != 5 {
            return Err(PipelineError::InvalidSchedule(self.schedule.clone()));
        }
        self.execution_order().map(|_| ())
    }

    /// Topological order of task ids; ties keep declaration order
    pub fn execution_order(&self) -> Result<Vec<&str>, PipelineError> {
        if self.tasks.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut ids = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(task.task_id.as_str()) {
                return Err(PipelineError::DuplicateTask(task.task_id.clone()));
            }
        }

        let mut in_degree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
        let mut downstream: HashMap<&str, Vec<&str>> = HashMap::new();
        for dep in &self.dependencies {
            for id in [&dep.upstream, &dep.downstream] {
                if !ids.contains(id.as_str()) {
                    return Err(PipelineError::UnknownTask(id.clone()));
                }
            }
            downstream
                .entry(dep.upstream.as_str())
                .or_default()
                .push(dep.downstream.as_str());
            *in_degree.entry(dep.downstream.as_str()).or_default() += 1;
        }

        let mut ready: VecDeque<&str> = self
            .tasks
            .iter()
            .map(|t| t.task_id.as_str())
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &next in downstream.get(id).into_iter().flatten() {
                let degree = in_degree.entry(next).or_default();
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() != self.tasks.len() {
            return Err(PipelineError::Cycle);
        }
        Ok(order)
    }

    /// Experiment name for a given logical run date
    pub fn render_experiment_name(&self, run_date: NaiveDate) -> Option<String> {
        self.tasks.iter().find_map(|task| match &task.operator {
            Operator::ExperimentCreation { name, .. } => {
                Some(name.replace(DS_NODASH, &run_date.format("%Y%m%d").to_string()))
            }
            _ => None,
        })
    }
}
