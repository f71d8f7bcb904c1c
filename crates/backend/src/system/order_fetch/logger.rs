use anyhow::Result;
use chrono::Utc;
use contracts::system::order_fetch::OrderFetchTaskId;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Лог выполнения задачи выгрузки: один файл на задачу.
pub struct TaskLogger {
    log_dir: PathBuf,
}

impl TaskLogger {
    pub fn new(base_log_dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: base_log_dir.as_ref().join("task_logs"),
        }
    }

    pub fn log_file_path(&self, task_id: &OrderFetchTaskId) -> PathBuf {
        self.log_dir.join(format!("{}.log", task_id))
    }

    /// Дописывает строку `[timestamp] message` в лог задачи
    pub fn write_log(&self, task_id: &OrderFetchTaskId, message: &str) -> Result<()> {
        fs::create_dir_all(&self.log_dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file_path(task_id))?;

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(file, "[{}] {}", timestamp, message)?;
        Ok(())
    }

    /// Пишет в лог задачи, ошибки записи только предупреждают
    pub fn log(&self, task_id: &OrderFetchTaskId, message: &str) {
        if let Err(e) = self.write_log(task_id, message) {
            tracing::warn!("Failed to write session log for task {}: {}", task_id, e);
        }
    }

    /// Содержимое лога; `None`, если задача ещё ничего не записала
    pub fn read_log(&self, task_id: &OrderFetchTaskId) -> Result<Option<String>> {
        let path = self.log_file_path(task_id);
        if path.exists() {
            Ok(Some(fs::read_to_string(path)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_timestamped_lines_per_task() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TaskLogger::new(dir.path());
        let id = OrderFetchTaskId::new_v4();

        logger.write_log(&id, "Started").unwrap();
        logger.write_log(&id, "Month 1: 10 orders").unwrap();

        let content = logger.read_log(&id).unwrap().unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Started"));
        assert!(lines[1].ends_with("] Month 1: 10 orders"));
        assert!(logger
            .log_file_path(&id)
            .starts_with(dir.path().join("task_logs")));
    }

    #[test]
    fn missing_log_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TaskLogger::new(dir.path());
        assert!(logger
            .read_log(&OrderFetchTaskId::new_v4())
            .unwrap()
            .is_none());
    }
}
