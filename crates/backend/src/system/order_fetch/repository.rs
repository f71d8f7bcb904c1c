use async_trait::async_trait;
use chrono::Utc;
use contracts::domain::a006_connection_mp::aggregate::ConnectionMP;
use contracts::enums::MarketplaceType;
use contracts::system::order_fetch::{
    OrderFetchTask, OrderFetchTaskId, PlatformOrderStats, TaskStatus,
};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{OrderFetchError, OrderFetchResult};
use super::store::{ConnectionProvider, TaskListFilter, TaskStore, TaskUpdate};
use crate::domain::{a006_connection_mp, a025_mp_order};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_order_fetch_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub connection_id: String,
    pub platform: String,
    pub task_type: String,
    pub status: String,
    pub config_json: String,
    pub progress_json: String,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub stopped_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for OrderFetchTask {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> anyhow::Result<Self> {
        let id = OrderFetchTaskId::from_string(&m.id).map_err(|e| anyhow::anyhow!(e))?;
        let platform = MarketplaceType::from_code(&m.platform)
            .ok_or_else(|| anyhow::anyhow!("Unknown platform '{}' in task {}", m.platform, m.id))?;
        let status = m
            .status
            .parse::<TaskStatus>()
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok(OrderFetchTask {
            id,
            user_id: m.user_id,
            connection_id: m.connection_id,
            platform,
            task_type: m.task_type,
            status,
            config: serde_json::from_str(&m.config_json)?,
            progress: serde_json::from_str(&m.progress_json)?,
            error: m.error,
            created_at: m.created_at,
            updated_at: m.updated_at,
            stopped_at: m.stopped_at,
            completed_at: m.completed_at,
        })
    }
}

fn to_task(model: Model) -> OrderFetchResult<OrderFetchTask> {
    OrderFetchTask::try_from(model).map_err(OrderFetchError::Internal)
}

fn to_json<T: Serialize>(value: &T) -> OrderFetchResult<String> {
    serde_json::to_string(value).map_err(|e| OrderFetchError::Internal(e.into()))
}

/// Хранилище задач поверх SQLite (sea-orm)
#[derive(Clone)]
pub struct SqliteTaskStore {
    db: DatabaseConnection,
}

impl SqliteTaskStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Набор выражений UPDATE для заданных полей
    fn update_statement(
        &self,
        update: &TaskUpdate,
    ) -> OrderFetchResult<sea_orm::UpdateMany<Entity>> {
        let mut stmt = Entity::update_many().col_expr(Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(progress) = &update.progress {
            stmt = stmt.col_expr(Column::ProgressJson, Expr::value(to_json(progress)?));
        }
        if let Some(error) = &update.error {
            stmt = stmt.col_expr(Column::Error, Expr::value(error.clone()));
        }
        if let Some(stopped_at) = update.stopped_at {
            stmt = stmt.col_expr(Column::StoppedAt, Expr::value(stopped_at));
        }
        if let Some(completed_at) = update.completed_at {
            stmt = stmt.col_expr(Column::CompletedAt, Expr::value(completed_at));
        }
        Ok(stmt)
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, task: &OrderFetchTask) -> OrderFetchResult<()> {
        if let Some(existing) = self
            .find_active_by_connection(&task.user_id, &task.connection_id, &task.task_type)
            .await?
        {
            return Err(OrderFetchError::AlreadyRunning {
                task_id: existing.id,
            });
        }

        let active = ActiveModel {
            id: Set(task.id.as_string()),
            user_id: Set(task.user_id.clone()),
            connection_id: Set(task.connection_id.clone()),
            platform: Set(task.platform.code().to_string()),
            task_type: Set(task.task_type.clone()),
            status: Set(TaskStatus::Running.as_str().to_string()),
            config_json: Set(to_json(&task.config)?),
            progress_json: Set(to_json(&task.progress)?),
            error: Set(None),
            created_at: Set(task.created_at),
            updated_at: Set(task.updated_at),
            stopped_at: Set(None),
            completed_at: Set(None),
        };

        match active.insert(&self.db).await {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // A concurrent start won between our check and the insert
                let existing = self
                    .find_active_by_connection(&task.user_id, &task.connection_id, &task.task_type)
                    .await?;
                match existing {
                    Some(existing) => Err(OrderFetchError::AlreadyRunning {
                        task_id: existing.id,
                    }),
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, task_id: &OrderFetchTaskId) -> OrderFetchResult<Option<OrderFetchTask>> {
        Entity::find_by_id(task_id.as_string())
            .one(&self.db)
            .await?
            .map(to_task)
            .transpose()
    }

    async fn update(
        &self,
        task_id: &OrderFetchTaskId,
        update: TaskUpdate,
    ) -> OrderFetchResult<()> {
        let result = self
            .update_statement(&update)?
            .filter(Column::Id.eq(task_id.as_string()))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(OrderFetchError::TaskNotFound(task_id.as_string()));
        }
        Ok(())
    }

    async fn finish(
        &self,
        task_id: &OrderFetchTaskId,
        status: TaskStatus,
        update: TaskUpdate,
    ) -> OrderFetchResult<bool> {
        if !status.is_terminal() {
            return Err(OrderFetchError::InvalidRequest(format!(
                "{} is not a terminal status",
                status
            )));
        }
        let result = self
            .update_statement(&update)?
            .col_expr(Column::Status, Expr::value(status.as_str()))
            .filter(Column::Id.eq(task_id.as_string()))
            .filter(Column::Status.eq(TaskStatus::Running.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn find_active_by_connection(
        &self,
        user_id: &str,
        connection_id: &str,
        task_type: &str,
    ) -> OrderFetchResult<Option<OrderFetchTask>> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::ConnectionId.eq(connection_id))
            .filter(Column::TaskType.eq(task_type))
            .filter(Column::Status.eq(TaskStatus::Running.as_str()))
            .one(&self.db)
            .await?
            .map(to_task)
            .transpose()
    }

    async fn list(
        &self,
        user_id: &str,
        filter: &TaskListFilter,
    ) -> OrderFetchResult<(Vec<OrderFetchTask>, u64)> {
        let mut query = Entity::find().filter(Column::UserId.eq(user_id));
        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status.as_str()));
        }
        if let Some(platform) = filter.platform {
            query = query.filter(Column::Platform.eq(platform.code()));
        }

        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .offset(filter.offset)
            .limit(filter.limit)
            .all(&self.db)
            .await?;

        let tasks = models
            .into_iter()
            .map(to_task)
            .collect::<OrderFetchResult<Vec<_>>>()?;
        Ok((tasks, total))
    }

    async fn fail_orphaned_running(&self, message: &str) -> OrderFetchResult<u64> {
        let now = Utc::now();
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(TaskStatus::Failed.as_str()))
            .col_expr(Column::Error, Expr::value(message))
            .col_expr(Column::CompletedAt, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Status.eq(TaskStatus::Running.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn order_stats(
        &self,
        user_id: &str,
        connection_id: Option<&str>,
    ) -> OrderFetchResult<Vec<PlatformOrderStats>> {
        Ok(a025_mp_order::repository::order_stats(&self.db, user_id, connection_id).await?)
    }
}

#[async_trait]
impl ConnectionProvider for SqliteTaskStore {
    async fn get_connection(&self, id: Uuid) -> OrderFetchResult<Option<ConnectionMP>> {
        Ok(a006_connection_mp::repository::get_by_id(&self.db, id).await?)
    }
}
