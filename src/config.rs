use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Archive gateway base URL.
    pub gateway_url: String,
    /// Postgresql connection URI postgresql://[userspec@][hostspec][/dbname][?paramspec]
    pub postgres_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self, &'static str> {
        let gateway_url =
            env::var("HYW_GATEWAY_URL").map_err(|_| "missing HYW_GATEWAY_URL environment variable")?;
        let postgres_uri =
            env::var("HYW_POSTGRES_URI").map_err(|_| "missing HYW_POSTGRES_URI environment variable")?;
        Ok(Self {
            gateway_url,
            postgres_uri,
        })
    }
}
