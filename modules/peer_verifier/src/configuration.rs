use anyhow::Result;
use config::Config;

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VerifierConfig {
    pub peer_status_topic: String,
    pub publish_verified_topic: String,
    pub chain_query_topic: String,
    pub peer_query_topic: String,

    /// Batch size of the common-height search; how many heights one peer
    /// request may carry
    pub n_ary: usize,

    pub delegates_per_round: u64,

    /// Seconds before an in-flight verification is abandoned
    pub verification_timeout: u64,

    pub result_cache_size: usize,
    pub verified_blocks_cache_size: usize,
}

impl VerifierConfig {
    pub fn try_load(config: &Config) -> Result<Self> {
        let full_config = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        Ok(full_config.try_deserialize()?)
    }
}
