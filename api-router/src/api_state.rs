use std::sync::Arc;

use common::{
    compile::TexCompiler,
    storage::{artifacts::ArtifactStore, db::SurrealDbClient},
    utils::config::AppConfig,
};

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub compiler: TexCompiler,
}

impl ApiState {
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.ensure_initialized().await?;

        let artifacts = ArtifactStore::new(config)?;
        let compiler = TexCompiler::new(config, artifacts);

        Ok(Self {
            db: surreal_db_client,
            config: config.clone(),
            compiler,
        })
    }
}
