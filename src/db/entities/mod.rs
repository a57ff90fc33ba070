//! SeaORM entities of the measurement store.
//!
//! A device owns measurements (one per speed-pattern set), a measurement owns one config per
//! frame length, and a config owns the raw capture and injector counters of its run.

pub mod device;
pub mod injector_stat;
pub mod measurement;
pub mod measurement_config;
pub mod mirror_stat;

pub mod prelude {
    pub use super::device::Entity as Device;
    pub use super::device::Model as DeviceModel;
    pub use super::device::ActiveModel as DeviceActiveModel;
    pub use super::device::Column as DeviceColumn;

    pub use super::measurement::Entity as Measurement;
    pub use super::measurement::Model as MeasurementModel;
    pub use super::measurement::ActiveModel as MeasurementActiveModel;
    pub use super::measurement::Column as MeasurementColumn;

    pub use super::measurement_config::Entity as MeasurementConfig;
    pub use super::measurement_config::Model as MeasurementConfigModel;
    pub use super::measurement_config::ActiveModel as MeasurementConfigActiveModel;
    pub use super::measurement_config::Column as MeasurementConfigColumn;

    pub use super::mirror_stat::Entity as MirrorStat;
    pub use super::mirror_stat::Model as MirrorStatModel;
    pub use super::mirror_stat::ActiveModel as MirrorStatActiveModel;
    pub use super::mirror_stat::Column as MirrorStatColumn;

    pub use super::injector_stat::Entity as InjectorStat;
    pub use super::injector_stat::Model as InjectorStatModel;
    pub use super::injector_stat::ActiveModel as InjectorStatActiveModel;
    pub use super::injector_stat::Column as InjectorStatColumn;
}
