use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use contracts::domain::a006_connection_mp::aggregate::ConnectionMP;
use contracts::enums::MarketplaceType;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{FetchOrdersResult, NormalizeOrdersResult, OrderWindow, PlatformService, RawOrder};
use crate::domain::a025_mp_order::{repository, MpOrder};

const STATISTICS_API_URL: &str = "https://statistics-api.wildberries.ru";

/// Statistics API отдаёт время по Москве без смещения
const MOSCOW_OFFSET_SECONDS: i32 = 3 * 3600;

/// Строка ответа GET /api/v1/supplier/orders (используемые поля)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WbOrderRow {
    pub srid: String,
    pub date: String,
    #[serde(rename = "lastChangeDate", default)]
    pub last_change_date: Option<String>,
    #[serde(rename = "gNumber", default)]
    pub g_number: Option<String>,
    #[serde(rename = "totalPrice", default)]
    pub total_price: Option<f64>,
    #[serde(rename = "priceWithDisc", default)]
    pub price_with_disc: Option<f64>,
    #[serde(rename = "isCancel", default)]
    pub is_cancel: bool,
}

/// Разбор даты Statistics API: "2024-03-04T18:08:31" (МСК) или RFC 3339
pub fn parse_wb_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive: NaiveDateTime = value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid Wildberries date '{}': {}", value, e))?;
    let moscow = FixedOffset::east_opt(MOSCOW_OFFSET_SECONDS)
        .ok_or_else(|| anyhow::anyhow!("Invalid Moscow offset"))?;
    moscow
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow::anyhow!("Ambiguous Wildberries date '{}'", value))
}

/// Клиент выгрузки заказов Wildberries
pub struct WildberriesOrderService {
    client: reqwest::Client,
    connection: ConnectionMP,
    db: DatabaseConnection,
    base_url: String,
}

impl WildberriesOrderService {
    pub fn new(connection: ConnectionMP, db: DatabaseConnection) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            connection,
            db,
            base_url: STATISTICS_API_URL.to_string(),
        })
    }

    /// Конструктор для `PlatformServiceRegistry`
    pub fn builder(
        db: DatabaseConnection,
    ) -> impl Fn(&ConnectionMP) -> Result<Arc<dyn PlatformService>> + Send + Sync + 'static {
        move |connection| {
            let service = WildberriesOrderService::new(connection.clone(), db.clone())?;
            Ok(Arc::new(service) as Arc<dyn PlatformService>)
        }
    }

    fn api_key(&self) -> String {
        self.connection
            .api_key
            .trim()
            .replace(['\n', '\r', '\t'], "")
    }

    fn to_mp_order(&self, row: WbOrderRow, raw: RawOrder) -> Result<MpOrder> {
        let order_date = parse_wb_date(&row.date)?;
        Ok(MpOrder {
            user_id: self.connection.user_id.clone(),
            connection_id: self.connection.to_string_id(),
            platform: MarketplaceType::Wildberries,
            order_number: row.srid,
            order_date,
            total_amount: row.price_with_disc.or(row.total_price),
            payload: raw,
        })
    }
}

#[async_trait]
impl PlatformService for WildberriesOrderService {
    async fn initialize(&self) -> Result<()> {
        let api_key = self.api_key();
        if api_key.is_empty() {
            anyhow::bail!("API Key is required for Wildberries API");
        }
        if !api_key.is_ascii() {
            anyhow::bail!("API Key contains non-ASCII characters");
        }
        Ok(())
    }

    /// GET /api/v1/supplier/orders?dateFrom=...&flag=0
    ///
    /// Эндпоинт не принимает верхнюю границу и размер страницы:
    /// строки вне окна отбрасываются на клиенте, `limit` не используется.
    async fn fetch_orders(&self, window: &OrderWindow) -> Result<FetchOrdersResult> {
        let url = format!("{}/api/v1/supplier/orders", self.base_url);
        let date_from = window.start.format("%Y-%m-%dT%H:%M:%S").to_string();

        tracing::debug!(
            "GET {}?dateFrom={} (connection {})",
            url,
            date_from,
            self.connection.to_string_id()
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.api_key())
            .query(&[("dateFrom", date_from.as_str()), ("flag", "0")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Wildberries Orders API request failed: {}", body);
            anyhow::bail!("Wildberries Orders API failed with status {}: {}", status, body);
        }

        let rows: Vec<RawOrder> = response.json().await?;
        let data = rows
            .into_iter()
            .filter(|row| {
                row.get("date")
                    .and_then(|d| d.as_str())
                    .and_then(|d| parse_wb_date(d).ok())
                    .map(|d| window.contains(&d))
                    .unwrap_or(false)
            })
            .collect();

        Ok(FetchOrdersResult {
            success: true,
            data,
        })
    }

    async fn normalize_orders(&self, raw: Vec<RawOrder>) -> Result<NormalizeOrdersResult> {
        let total = raw.len();
        let mut normalized = Vec::with_capacity(total);

        for value in raw {
            let row: WbOrderRow = match serde_json::from_value(value.clone()) {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping malformed Wildberries order: {}", e);
                    continue;
                }
            };
            let order = match self.to_mp_order(row, value) {
                Ok(order) => order,
                Err(e) => {
                    tracing::warn!("Skipping Wildberries order: {}", e);
                    continue;
                }
            };
            repository::upsert(&self.db, &order).await?;
            normalized.push(order);
        }

        Ok(NormalizeOrdersResult {
            success: total == 0 || !normalized.is_empty(),
            data: normalized,
        })
    }
}
