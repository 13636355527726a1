#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use taskhub::attachment::Upload;
use taskhub::config::{
    CommentTypesConfig, Config, DatabaseConfig, ServerConfig, StorageConfig, SweepConfig,
};
use taskhub::entity::{NewProject, NewTask, Project, Task};
use taskhub::Backend;
use tempfile::TempDir;
use uuid::Uuid;

pub const COMMENT_TYPES: &str = r#"[
    {"id": 1, "name": "Rename"},
    {"id": 2, "name": "Reassignment"},
    {"id": 3, "name": "Reschedule"},
    {"id": 4, "name": "Comment"}
]"#;

/// A backend over a throwaway database and blob directory
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub backend: Backend,
}

pub fn config_in(dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            path: dir.join("data").join("taskhub.db"),
            busy_timeout_ms: 5000,
        },
        storage: StorageConfig {
            root: dir.join("storage"),
        },
        comment_types: CommentTypesConfig {
            path: dir.join("comment-types.json"),
        },
        sweep: SweepConfig {
            cron: String::new(),
            grace_secs: 0,
        },
    }
}

pub async fn harness() -> Harness {
    harness_with(|_| {}).await
}

/// Like `harness`, with the configuration adjusted before opening
pub async fn harness_with(adjust: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    adjust(&mut config);
    std::fs::write(&config.comment_types.path, COMMENT_TYPES).expect("write comment types");
    let backend = Backend::open(&config).await.expect("open backend");
    Harness {
        dir,
        config,
        backend,
    }
}

impl Harness {
    pub fn storage_root(&self) -> PathBuf {
        self.config.storage.root.clone()
    }

    pub async fn project(&self, name: &str) -> Project {
        self.backend
            .create_project(&NewProject {
                name: name.to_string(),
                description: Some("initial".to_string()),
                creator_id: Uuid::new_v4(),
                completion_date: None,
            })
            .await
            .expect("create project")
    }

    pub async fn task(&self, project_id: i64, parent_task_id: Option<i64>, name: &str) -> Task {
        self.task_with(project_id, parent_task_id, name, Vec::new()).await.0
    }

    pub async fn task_with(
        &self,
        project_id: i64,
        parent_task_id: Option<i64>,
        name: &str,
        uploads: Vec<Upload>,
    ) -> (Task, Vec<taskhub::attachment::Attachment>) {
        self.backend
            .create_task(
                &NewTask {
                    name: name.to_string(),
                    description: None,
                    project_id,
                    parent_task_id,
                    creator_id: Uuid::new_v4(),
                    executor_id: Some(Uuid::new_v4()),
                    completion_date: None,
                },
                uploads,
            )
            .await
            .expect("create task")
    }
}

pub fn pdf(name: &str) -> Upload {
    Upload {
        file_name: name.to_string(),
        media_type: "application/pdf".to_string(),
        content: b"%PDF-1.4 test".to_vec(),
    }
}

pub fn upload(name: &str, media_type: &str) -> Upload {
    Upload {
        file_name: name.to_string(),
        media_type: media_type.to_string(),
        content: vec![0u8; 16],
    }
}

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("timestamp")
        .with_timezone(&Utc)
}
