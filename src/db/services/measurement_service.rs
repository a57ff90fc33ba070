use std::fmt;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};

use crate::db::StoreError;
use crate::db::entities::{device, injector_stat, measurement, measurement_config, mirror_stat};
use crate::generator::PortCounters;
use crate::measurement::{InterfaceStatistics, RunFigures};

/// Opens the measurement database.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    // an in-memory SQLite database lives and dies with its single connection
    opt.max_connections(1).sqlx_logging(false);
    Database::connect(opt).await
}

fn to_db_int(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidParameter(format!("{what} {value} does not fit a database integer")))
}

fn from_db_int(value: i64, what: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidParameter(format!("stored {what} is negative: {value}")))
}

pub async fn insert_device<C: ConnectionTrait>(db: &C, name: &str) -> Result<device::Model, DbErr> {
    device::ActiveModel {
        name: Set(name.to_owned()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_measurement<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    name: &str,
    duration_secs: u64,
) -> Result<measurement::Model, StoreError> {
    let model = measurement::ActiveModel {
        device_id: Set(device_id),
        name: Set(name.to_owned()),
        duration_secs: Set(to_db_int(duration_secs, "duration")?),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model)
}

pub async fn insert_measurement_config<C: ConnectionTrait>(
    db: &C,
    measurement_id: i32,
    frame_len: u32,
    figures: &RunFigures,
) -> Result<measurement_config::Model, StoreError> {
    let frame_len = i32::try_from(frame_len)
        .map_err(|_| StoreError::InvalidParameter(format!("frame length {frame_len} is too large")))?;

    let model = measurement_config::ActiveModel {
        measurement_id: Set(measurement_id),
        frame_len: Set(frame_len),
        created_at: Set(Utc::now()),
        bandwidth_upstream_mbit: Set(to_db_int(figures.bandwidth.upstream_mbit, "bandwidth")?),
        bandwidth_downstream_mbit: Set(to_db_int(figures.bandwidth.downstream_mbit, "bandwidth")?),
        mirror_dropped_frames: Set(to_db_int(figures.mirror.dropped_total, "drop count")?),
        mirror_dropped_percent: Set(figures.mirror.dropped_percent),
        upstream_dropped_frames: Set(to_db_int(figures.directional.upstream_total, "drop count")?),
        upstream_dropped_percent: Set(figures.directional.upstream_percent),
        downstream_dropped_frames: Set(to_db_int(
            figures.directional.downstream_total,
            "drop count",
        )?),
        downstream_dropped_percent: Set(figures.directional.downstream_percent),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model)
}

pub async fn insert_mirror_stat<C: ConnectionTrait>(
    db: &C,
    measurement_config_id: i32,
    record: &InterfaceStatistics,
) -> Result<mirror_stat::Model, StoreError> {
    let model = mirror_stat::ActiveModel {
        measurement_config_id: Set(measurement_config_id),
        port_name: Set(record.interface_name.clone()),
        rx_frames: Set(to_db_int(record.rx_frames, "rx_frames")?),
        rx_bytes: Set(to_db_int(record.rx_bytes, "rx_bytes")?),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model)
}

pub async fn insert_injector_stat<C: ConnectionTrait>(
    db: &C,
    measurement_config_id: i32,
    record: &InterfaceStatistics,
) -> Result<injector_stat::Model, StoreError> {
    let model = injector_stat::ActiveModel {
        measurement_config_id: Set(measurement_config_id),
        port_name: Set(record.interface_name.clone()),
        is_mirrored_port: Set(record.is_mirrored_source),
        rx_frames: Set(to_db_int(record.rx_frames, "rx_frames")?),
        rx_bytes: Set(to_db_int(record.rx_bytes, "rx_bytes")?),
        tx_frames: Set(to_db_int(record.tx_frames, "tx_frames")?),
        tx_bytes: Set(to_db_int(record.tx_bytes, "tx_bytes")?),
        tx_speed_mbit: Set(to_db_int(record.speed_mbit, "speed")?),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model)
}

pub async fn device_by_name<C: ConnectionTrait>(db: &C, name: &str) -> Result<device::Model, StoreError> {
    device::Entity::find()
        .filter(device::Column::Name.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Unknown or invalid device name '{name}'")))
}

pub async fn measurement_by_name<C: ConnectionTrait>(
    db: &C,
    device: &device::Model,
    name: &str,
) -> Result<measurement::Model, StoreError> {
    measurement::Entity::find()
        .filter(measurement::Column::DeviceId.eq(device.id))
        .filter(measurement::Column::Name.eq(name))
        .order_by_asc(measurement::Column::Id)
        .one(db)
        .await?
        .ok_or_else(|| {
            StoreError::NotFound(format!(
                "Invalid or unknown measurement '{name}' in device '{}'",
                device.name
            ))
        })
}

/// The first config stored for `frame_len`; repeated sweeps append further ones.
pub async fn measurement_config_by_frame_len<C: ConnectionTrait>(
    db: &C,
    measurement: &measurement::Model,
    frame_len: u32,
) -> Result<measurement_config::Model, StoreError> {
    measurement_config::Entity::find()
        .filter(measurement_config::Column::MeasurementId.eq(measurement.id))
        .filter(measurement_config::Column::FrameLen.eq(frame_len))
        .order_by_asc(measurement_config::Column::Id)
        .one(db)
        .await?
        .ok_or_else(|| {
            StoreError::NotFound(format!(
                "Invalid or unknown config frame_len '{frame_len}' in measurement '{}'",
                measurement.name
            ))
        })
}

pub async fn list_devices<C: ConnectionTrait>(db: &C) -> Result<Vec<device::Model>, DbErr> {
    device::Entity::find()
        .order_by_asc(device::Column::Name)
        .all(db)
        .await
}

/// Rebuilds the statistics records of a stored run: injectors first, then capture ports.
pub async fn load_run_statistics<C: ConnectionTrait>(
    db: &C,
    measurement_config_id: i32,
) -> Result<Vec<InterfaceStatistics>, StoreError> {
    let injectors = injector_stat::Entity::find()
        .filter(injector_stat::Column::MeasurementConfigId.eq(measurement_config_id))
        .order_by_asc(injector_stat::Column::Id)
        .all(db)
        .await?;
    let mirrors = mirror_stat::Entity::find()
        .filter(mirror_stat::Column::MeasurementConfigId.eq(measurement_config_id))
        .order_by_asc(mirror_stat::Column::Id)
        .all(db)
        .await?;

    let mut records = Vec::with_capacity(injectors.len() + mirrors.len());
    for row in injectors {
        let counters = PortCounters {
            rx_bytes: from_db_int(row.rx_bytes, "rx_bytes")?,
            rx_frames: from_db_int(row.rx_frames, "rx_frames")?,
            tx_bytes: from_db_int(row.tx_bytes, "tx_bytes")?,
            tx_frames: from_db_int(row.tx_frames, "tx_frames")?,
        };
        records.push(InterfaceStatistics::injector(
            row.port_name,
            row.is_mirrored_port,
            from_db_int(row.tx_speed_mbit, "speed")?,
            counters,
        ));
    }
    for row in mirrors {
        let counters = PortCounters {
            rx_bytes: from_db_int(row.rx_bytes, "rx_bytes")?,
            rx_frames: from_db_int(row.rx_frames, "rx_frames")?,
            ..PortCounters::default()
        };
        records.push(InterfaceStatistics::capture(row.port_name, counters));
    }
    Ok(records)
}

/// Recalculates bandwidth and loss figures from the stored counters of a config.
pub async fn recompute_figures<C: ConnectionTrait>(
    db: &C,
    measurement_config_id: i32,
) -> Result<RunFigures, StoreError> {
    let records = load_run_statistics(db, measurement_config_id).await?;
    Ok(RunFigures::of(&records))
}

/// Outcome of [`persist_run`].
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRun {
    pub device_name: String,
    pub measurement_name: String,
    pub frame_len: u32,
    pub measurement_config_id: i32,
    pub figures: RunFigures,
}

/// Renders `value` with `digits` significant digits: fixed notation keeps at least one
/// fractional digit, and exponents at or above `digits - 1` switch to scientific notation
/// (`44.4`, `5.0`, `1e+02`).
fn significant(value: f64, digits: usize) -> String {
    if !value.is_finite() || digits == 0 {
        return value.to_string();
    }
    if value == 0.0 {
        return "0.0".to_string();
    }

    let scientific = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let trim = |text: &str| -> String {
        if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text.to_string()
        }
    };

    if exponent < -4 || exponent >= digits as i32 - 1 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim(mantissa), exponent.abs())
    } else {
        let decimals = (digits as i32 - 1 - exponent) as usize;
        let mut fixed = trim(&format!("{value:.decimals$}"));
        if !fixed.contains('.') {
            fixed.push_str(".0");
        }
        fixed
    }
}

impl fmt::Display for PersistedRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let RunFigures {
            bandwidth,
            mirror,
            directional,
        } = &self.figures;
        write!(
            f,
            "device: {:<10}, set_name: {:<10}, frame_len: {:<4}, speed_up: {:<3}, speed_down: {:<3}, speed_tot: {:<3}, \
             mirror_drop: {:<8}, mirror_drop_percent: {:<3}, upstream_drop: {:<8}, upstream_drop_percent: {:<3}, \
             downstream_drop: {:<8} downstream_drop_percent: {:<3}",
            self.device_name,
            self.measurement_name,
            self.frame_len,
            bandwidth.upstream_mbit,
            bandwidth.downstream_mbit,
            bandwidth.total_mbit(),
            mirror.dropped_total,
            significant(mirror.dropped_percent, 3),
            directional.upstream_total,
            significant(directional.upstream_percent, 3),
            directional.downstream_total,
            significant(directional.downstream_percent, 3),
        )
    }
}

/// Stores the records of one successful run under device / measurement / frame length.
///
/// The device and the measurement are created on first use. The config row, its stat rows and
/// the derived figures are written in one transaction.
pub async fn persist_run(
    db: &DatabaseConnection,
    device_name: &str,
    measurement_name: &str,
    duration_secs: u64,
    frame_len: u32,
    records: &[InterfaceStatistics],
) -> Result<PersistedRun, StoreError> {
    let figures = RunFigures::of(records);
    let txn = db.begin().await?;

    let device = match device_by_name(&txn, device_name).await {
        Ok(device) => device,
        Err(StoreError::NotFound(_)) => insert_device(&txn, device_name).await?,
        Err(e) => return Err(e),
    };
    let measurement = match measurement_by_name(&txn, &device, measurement_name).await {
        Ok(measurement) => measurement,
        Err(StoreError::NotFound(_)) => {
            insert_measurement(&txn, device.id, measurement_name, duration_secs).await?
        }
        Err(e) => return Err(e),
    };

    let config = insert_measurement_config(&txn, measurement.id, frame_len, &figures).await?;
    for record in records {
        if record.is_capture_port {
            insert_mirror_stat(&txn, config.id, record).await?;
        } else {
            insert_injector_stat(&txn, config.id, record).await?;
        }
    }
    txn.commit().await?;

    debug!(
        device = device_name,
        measurement = measurement_name,
        frame_len,
        measurement_config_id = config.id,
        records = records.len(),
        "Run persisted."
    );

    let persisted = PersistedRun {
        device_name: device.name,
        measurement_name: measurement.name,
        frame_len,
        measurement_config_id: config.id,
        figures,
    };
    info!("{persisted}");
    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::ensure_schema;

    async fn store() -> DatabaseConnection {
        let db = connect("sqlite::memory:").await.unwrap();
        ensure_schema(&db, false).await.unwrap();
        db
    }

    fn injector(name: &str, mirrored: bool, speed: u64, rx: u64, tx: u64) -> InterfaceStatistics {
        InterfaceStatistics::injector(
            name,
            mirrored,
            speed,
            PortCounters {
                rx_bytes: rx + 1,
                rx_frames: rx,
                tx_bytes: tx + 1,
                tx_frames: tx,
            },
        )
    }

    fn reference_run() -> Vec<InterfaceStatistics> {
        vec![
            injector("eth2", true, 5, 1, 15),
            injector("eth4", false, 10, 6, 8),
            injector("eth5", false, 15, 11, 13),
            InterfaceStatistics::capture(
                "eth3",
                PortCounters {
                    rx_bytes: 1022,
                    rx_frames: 20,
                    ..PortCounters::default()
                },
            ),
        ]
    }

    #[tokio::test]
    async fn persist_run_stores_rows_and_figures() {
        let db = store().await;

        let persisted = persist_run(&db, "test-switch", "test data", 10, 765, &reference_run())
            .await
            .unwrap();
        assert_eq!(persisted.figures.bandwidth.upstream_mbit, 5);
        assert_eq!(persisted.figures.bandwidth.downstream_mbit, 25);
        assert_eq!(persisted.figures.mirror.dropped_total, 16);

        let device = device_by_name(&db, "test-switch").await.unwrap();
        let measurement = measurement_by_name(&db, &device, "test data").await.unwrap();
        assert_eq!(measurement.duration_secs, 10);
        let config = measurement_config_by_frame_len(&db, &measurement, 765)
            .await
            .unwrap();
        assert_eq!(config.id, persisted.measurement_config_id);
        assert_eq!(config.bandwidth_upstream_mbit, 5);
        assert_eq!(config.bandwidth_downstream_mbit, 25);
        assert_eq!(config.mirror_dropped_frames, 16);
        assert_eq!(config.mirror_dropped_percent, persisted.figures.mirror.dropped_percent);
        assert_eq!(config.upstream_dropped_frames, 2);
        assert_eq!(config.downstream_dropped_frames, 20);
        assert_eq!(
            config.downstream_dropped_percent,
            persisted.figures.directional.downstream_percent
        );
    }

    #[tokio::test]
    async fn stored_rows_reproduce_the_records() {
        let db = store().await;
        let records = reference_run();
        let persisted = persist_run(&db, "test-switch", "set", 10, 64, &records)
            .await
            .unwrap();

        let loaded = load_run_statistics(&db, persisted.measurement_config_id)
            .await
            .unwrap();
        assert_eq!(loaded, records);

        let figures = recompute_figures(&db, persisted.measurement_config_id)
            .await
            .unwrap();
        assert_eq!(figures, persisted.figures);
    }

    #[tokio::test]
    async fn repeated_runs_reuse_device_and_measurement() {
        let db = store().await;
        let first = persist_run(&db, "dut", "set", 10, 64, &reference_run()).await.unwrap();
        let second = persist_run(&db, "dut", "set", 10, 128, &reference_run()).await.unwrap();
        persist_run(&db, "other", "set", 10, 64, &reference_run()).await.unwrap();

        let names: Vec<String> = list_devices(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|device| device.name)
            .collect();
        assert_eq!(names, ["dut", "other"]);

        let device = device_by_name(&db, "dut").await.unwrap();
        let measurement = measurement_by_name(&db, &device, "set").await.unwrap();
        let by_len = measurement_config_by_frame_len(&db, &measurement, 128)
            .await
            .unwrap();
        assert_eq!(by_len.id, second.measurement_config_id);
        assert_ne!(first.measurement_config_id, second.measurement_config_id);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let db = store().await;
        assert!(matches!(
            device_by_name(&db, "nope").await,
            Err(StoreError::NotFound(_))
        ));

        persist_run(&db, "dut", "set", 10, 64, &reference_run()).await.unwrap();
        let device = device_by_name(&db, "dut").await.unwrap();
        assert!(matches!(
            measurement_by_name(&db, &device, "other set").await,
            Err(StoreError::NotFound(_))
        ));
        let measurement = measurement_by_name(&db, &device, "set").await.unwrap();
        assert!(matches!(
            measurement_config_by_frame_len(&db, &measurement, 1518).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn dropping_the_schema_discards_results() {
        let db = store().await;
        persist_run(&db, "dut", "set", 10, 64, &reference_run()).await.unwrap();

        ensure_schema(&db, false).await.unwrap();
        assert_eq!(list_devices(&db).await.unwrap().len(), 1);

        ensure_schema(&db, true).await.unwrap();
        assert!(list_devices(&db).await.unwrap().is_empty());
    }

    #[test]
    fn summary_line_names_every_figure() {
        let persisted = PersistedRun {
            device_name: "dut".to_string(),
            measurement_name: "set".to_string(),
            frame_len: 64,
            measurement_config_id: 1,
            figures: RunFigures::of(&reference_run()),
        };
        let line = persisted.to_string();
        assert!(line.starts_with("device: dut       , set_name: set       , frame_len: 64  , "));
        assert!(line.contains("speed_up: 5  , speed_down: 25 , speed_tot: 30 , "));
        assert!(line.contains("mirror_drop: 16      , mirror_drop_percent: 44.4, "));
        assert!(line.contains("upstream_drop: 2       , upstream_drop_percent: 13.3, "));
        assert!(line.ends_with("downstream_drop: 20       downstream_drop_percent: 95.2"));
    }

    #[test]
    fn percents_keep_three_significant_digits() {
        let cases = [
            (44.44444444444444, "44.4"),
            (0.0, "0.0"),
            (5.0, "5.0"),
            (9.9999, "10.0"),
            (100.0, "1e+02"),
            (1234.5, "1.23e+03"),
            (0.000123, "0.000123"),
            (0.0000123, "1.23e-05"),
        ];
        for (value, expected) in cases {
            assert_eq!(significant(value, 3), expected, "{value}");
        }
    }
}
