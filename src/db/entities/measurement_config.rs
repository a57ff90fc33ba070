use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One frame length of a measurement, with the figures derived from its stat rows.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "measurement_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub measurement_id: i32,
    pub frame_len: i32,
    pub created_at: DateTimeUtc,
    pub bandwidth_upstream_mbit: i64,
    pub bandwidth_downstream_mbit: i64,
    pub mirror_dropped_frames: i64,
    pub mirror_dropped_percent: f64,
    pub upstream_dropped_frames: i64,
    pub upstream_dropped_percent: f64,
    pub downstream_dropped_frames: i64,
    pub downstream_dropped_percent: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::measurement::Entity",
        from = "Column::MeasurementId",
        to = "super::measurement::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Measurement,
    #[sea_orm(has_many = "super::mirror_stat::Entity")]
    MirrorStat,
    #[sea_orm(has_many = "super::injector_stat::Entity")]
    InjectorStat,
}

impl Related<super::measurement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Measurement.def()
    }
}

impl Related<super::mirror_stat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MirrorStat.def()
    }
}

impl Related<super::injector_stat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InjectorStat.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
