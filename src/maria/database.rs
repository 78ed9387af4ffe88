use crate::utils::errors::{CertListError, Result};
use sqlx::mysql::MySqlPool;
use sqlx::{Connection, Executor};

/// Database the SMS dump is loaded into
pub const DATABASE_NAME: &str = "sms";

/// Round-trip to the server to confirm the pool is usable
pub async fn ping(pool: &MySqlPool) -> Result<()> {
    let mut conn = pool.acquire().await?;
    conn.ping().await?;
    Ok(())
}

/// Drop `name` if it exists and create it empty
pub async fn recreate_database(pool: &MySqlPool, name: &str) -> Result<()> {
    let name = quote_identifier(name)?;
    pool.execute(format!("DROP DATABASE IF EXISTS {name}").as_str())
        .await?;
    pool.execute(format!("CREATE DATABASE {name}").as_str())
        .await?;
    Ok(())
}

fn quote_identifier(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if !valid {
        return Err(CertListError::InvalidInput(format!(
            "Invalid database name: {name:?}"
        )));
    }
    Ok(format!("`{name}`"))
}
