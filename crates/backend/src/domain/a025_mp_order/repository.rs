use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use contracts::enums::MarketplaceType;
use contracts::system::order_fetch::PlatformOrderStats;
use sea_orm::entity::prelude::*;
use sea_orm::{
    ColumnTrait, DatabaseBackend, EntityTrait, FromQueryResult, QueryFilter, Set, Statement,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mp_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub connection_id: String,
    pub platform: String,
    pub order_number: String,
    /// RFC 3339, UTC, секундная точность (сортируется как строка)
    pub order_date: String,
    pub total_amount: Option<f64>,
    pub payload_json: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Нормализованный заказ маркетплейса
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpOrder {
    pub user_id: String,
    pub connection_id: String,
    pub platform: MarketplaceType,
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Option<f64>,
    pub payload: serde_json::Value,
}

fn format_order_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_order_date(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| anyhow::anyhow!("Invalid order_date '{}': {}", s, e))
        })
        .transpose()
}

/// Вставка или обновление заказа по (connection_id, order_number).
/// Возвращает true, если заказ новый.
pub async fn upsert(db: &DatabaseConnection, order: &MpOrder) -> Result<bool> {
    let now = Utc::now();
    let payload_json = serde_json::to_string(&order.payload)?;

    let existing = Entity::find()
        .filter(Column::ConnectionId.eq(order.connection_id.as_str()))
        .filter(Column::OrderNumber.eq(order.order_number.as_str()))
        .one(db)
        .await?;

    match existing {
        Some(model) => {
            let mut active: ActiveModel = model.into();
            active.order_date = Set(format_order_date(&order.order_date));
            active.total_amount = Set(order.total_amount);
            active.payload_json = Set(payload_json);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(false)
        }
        None => {
            let active = ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                user_id: Set(order.user_id.clone()),
                connection_id: Set(order.connection_id.clone()),
                platform: Set(order.platform.code().to_string()),
                order_number: Set(order.order_number.clone()),
                order_date: Set(format_order_date(&order.order_date)),
                total_amount: Set(order.total_amount),
                payload_json: Set(payload_json),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(db).await?;
            Ok(true)
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct OrderStatsRow {
    platform: String,
    oldest_order: Option<String>,
    newest_order: Option<String>,
    total_orders: i64,
}

/// Диапазон дат и количество загруженных заказов по маркетплейсам
pub async fn order_stats(
    db: &DatabaseConnection,
    user_id: &str,
    connection_id: Option<&str>,
) -> Result<Vec<PlatformOrderStats>> {
    let mut sql = String::from(
        r#"
        SELECT platform,
               MIN(order_date) AS oldest_order,
               MAX(order_date) AS newest_order,
               COUNT(*) AS total_orders
        FROM mp_orders
        WHERE user_id = ?
        "#,
    );
    let mut values: Vec<sea_orm::Value> = vec![user_id.into()];
    if let Some(connection_id) = connection_id {
        sql.push_str(" AND connection_id = ?");
        values.push(connection_id.into());
    }
    sql.push_str(" GROUP BY platform ORDER BY platform");

    let stmt = Statement::from_sql_and_values(DatabaseBackend::Sqlite, &sql, values);
    let rows = OrderStatsRow::find_by_statement(stmt).all(db).await?;

    let mut stats = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(platform) = MarketplaceType::from_code(&row.platform) else {
            tracing::warn!("Skipping order stats for unknown platform '{}'", row.platform);
            continue;
        };
        stats.push(PlatformOrderStats {
            platform,
            oldest_order: parse_order_date(row.oldest_order)?,
            newest_order: parse_order_date(row.newest_order)?,
            total_orders: row.total_orders.max(0) as u64,
        });
    }
    Ok(stats)
}
