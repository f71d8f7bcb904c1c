use anyhow::Result;
use contracts::domain::a006_connection_mp::aggregate::{ConnectionMP, ConnectionMPId};
use contracts::enums::MarketplaceType;
use sea_orm::entity::prelude::*;
use sea_orm::{EntityTrait, Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "a006_connection_mp")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub marketplace: String,
    pub description: String,
    pub api_key: String,
    pub supplier_id: Option<String>,
    pub is_used: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ConnectionMP {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> Result<Self> {
        let id = ConnectionMPId::from_string(&m.id).map_err(|e| anyhow::anyhow!(e))?;
        let marketplace = MarketplaceType::from_code(&m.marketplace)
            .ok_or_else(|| anyhow::anyhow!("Unknown marketplace code '{}'", m.marketplace))?;

        Ok(ConnectionMP {
            id,
            user_id: m.user_id,
            marketplace,
            description: m.description,
            api_key: m.api_key,
            supplier_id: m.supplier_id,
            is_used: m.is_used,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

pub async fn get_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<ConnectionMP>> {
    let model = Entity::find_by_id(id.to_string()).one(db).await?;
    model.map(ConnectionMP::try_from).transpose()
}

pub async fn insert(db: &DatabaseConnection, connection: &ConnectionMP) -> Result<Uuid> {
    connection
        .validate()
        .map_err(|e| anyhow::anyhow!("Validation failed: {}", e))?;

    let active = ActiveModel {
        id: Set(connection.to_string_id()),
        user_id: Set(connection.user_id.clone()),
        marketplace: Set(connection.marketplace.code().to_string()),
        description: Set(connection.description.clone()),
        api_key: Set(connection.api_key.clone()),
        supplier_id: Set(connection.supplier_id.clone()),
        is_used: Set(connection.is_used),
        created_at: Set(connection.created_at),
        updated_at: Set(connection.updated_at),
    };
    active.insert(db).await?;
    Ok(connection.id.value())
}
