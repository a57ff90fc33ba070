use sea_orm::sea_query::Table;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};
use tracing::{info, warn};

use super::entities::{device, injector_stat, measurement, measurement_config, mirror_stat};

/// Creates every missing table (and its indexes) from the entity definitions.
///
/// With `drop_existing` all measurement tables are dropped first, discarding stored results.
pub async fn ensure_schema<C: ConnectionTrait>(db: &C, drop_existing: bool) -> Result<(), DbErr> {
    if drop_existing {
        warn!("Dropping all stored measurements.");
        // children first
        drop_table(db, injector_stat::Entity).await?;
        drop_table(db, mirror_stat::Entity).await?;
        drop_table(db, measurement_config::Entity).await?;
        drop_table(db, measurement::Entity).await?;
        drop_table(db, device::Entity).await?;
    }

    let schema = Schema::new(db.get_database_backend());
    create_table(db, &schema, device::Entity).await?;
    create_table(db, &schema, measurement::Entity).await?;
    create_table(db, &schema, measurement_config::Entity).await?;
    create_table(db, &schema, mirror_stat::Entity).await?;
    create_table(db, &schema, injector_stat::Entity).await?;

    info!("Database schema is up to date.");
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}

async fn drop_table<C, E>(db: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let statement = Table::drop().table(entity).if_exists().to_owned();
    db.execute(db.get_database_backend().build(&statement)).await?;
    Ok(())
}
