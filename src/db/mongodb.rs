use mongodb::{Client, Database};

use crate::config::DatabaseConfig;

pub async fn get_database(config: &DatabaseConfig) -> mongodb::error::Result<Database> {
    let client = Client::with_uri_str(&config.uri).await?;
    Ok(client.database(&config.name))
}
