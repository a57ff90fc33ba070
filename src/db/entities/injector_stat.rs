use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "injector_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub measurement_config_id: i32,
    pub port_name: String,
    pub is_mirrored_port: bool,
    pub rx_frames: i64,
    pub rx_bytes: i64,
    pub tx_frames: i64,
    pub tx_bytes: i64,
    pub tx_speed_mbit: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::measurement_config::Entity",
        from = "Column::MeasurementConfigId",
        to = "super::measurement_config::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    MeasurementConfig,
}

impl Related<super::measurement_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeasurementConfig.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
