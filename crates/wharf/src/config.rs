use serde::Deserialize;
use std::path::PathBuf;
use wharf_auth::AuthProvider;
use wharf_server::ServiceConfig;

#[derive(Deserialize)]
#[serde(bound = "A::Config: serde::de::DeserializeOwned")]
pub struct Config<A: AuthProvider> {
    pub service: ServiceConfig,
    pub repo: RepoConfig,
    pub store: StoreConfig,
    #[serde(flatten)]
    pub auth_config: A::Config,
}

#[derive(Deserialize)]
pub struct RepoConfig {
    /// Prefixed to `{name}-{version}.tgz` when composing the `urls` field of
    /// index records. Example: <https://charts.example.com/>
    pub base_url: String,
}

#[derive(Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}
