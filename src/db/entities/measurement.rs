use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A named speed-pattern set measured on one device.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "measurements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub device_id: i32,
    pub name: String,
    pub duration_secs: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device::Entity",
        from = "Column::DeviceId",
        to = "super::device::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Device,
    #[sea_orm(has_many = "super::measurement_config::Entity")]
    MeasurementConfig,
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl Related<super::measurement_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeasurementConfig.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
