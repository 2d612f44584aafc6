use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use taskpool_core::{PoolConfig, Task, TaskError, TaskPool, TaskResult};

/// Demo task: fails `remaining_failures` times, then greets.
struct HelloTask {
    name: String,
    remaining_failures: AtomicU32,
}

impl HelloTask {
    fn new(name: impl Into<String>, failures: u32) -> Self {
        Self {
            name: name.into(),
            remaining_failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Task for HelloTask {
    async fn execute(&self) -> Result<(), TaskError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(TaskError::new(format!("intentional failure (left={left})")).with_kind("demo"));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        println!("Hello, {}!", self.name);
        Ok(())
    }

    fn on_success(&self, result: &TaskResult) {
        info!(
            task_id = %result.task_id(),
            attempts = result.attempts().len(),
            "task succeeded"
        );
    }

    fn on_failure(&self, result: &TaskResult) {
        warn!(
            task_id = %result.task_id(),
            attempts = result.attempts().len(),
            error = ?result.error(),
            "task failed"
        );
    }
}

fn load_config() -> Result<PoolConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(PoolConfig::from_json(&json)?)
        }
        None => Ok(PoolConfig {
            max_io_worker_num: 4,
            max_retry_times: 3,
            ..PoolConfig::default()
        }),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) config: 引数に JSON ファイルがあればそれを読む
    let config = load_config()?;
    info!(?config, "loaded config");

    // (B) pool を起動
    let pool = TaskPool::new(config)?;
    pool.start().await?;

    // (C) タスク投入（奇数番目は一度失敗してからリトライで成功）
    for i in 0..10u32 {
        let task = Arc::new(HelloTask::new(format!("task-{i}"), i % 2));
        match pool.push_task(task).await {
            Ok(id) => info!(%id, "submitted"),
            Err(e) => error!(error = %e, "submit failed"),
        }
    }

    // (D) graceful shutdown: 保留中のリトライも含めて全部終わるまで待つ
    pool.safe_close().await;
    info!(state = %pool.state().await, "done");
    Ok(())
}
