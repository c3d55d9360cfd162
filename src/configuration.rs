use serde::Deserialize;

use crate::domain::keywords::KeywordGroup;
use crate::services::scrape::DelayBounds;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub politeness: PolitenessSettings,
    pub output: OutputSettings,
    pub sites: SiteToggles,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub webdriver_url: String,
    pub wait_timeout_secs: u64,
    pub profile: String,
}

#[derive(Deserialize, Clone)]
pub struct PolitenessSettings {
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl PolitenessSettings {
    pub fn bounds(&self) -> DelayBounds {
        DelayBounds {
            min_secs: self.min_delay_secs,
            max_secs: self.max_delay_secs,
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct OutputSettings {
    pub unify_dir: String,
    pub local_dir: String,
    pub combined_file: String,
}

#[derive(Deserialize, Clone)]
pub struct SiteToggles {
    pub umich: bool,
    pub higher_ed: bool,
    pub idealist: bool,
}

/// Keyword profile: what to search for per site and which role titles to
/// exclude everywhere.
#[derive(Deserialize, Clone)]
pub struct Profile {
    pub exclusion_role_kw: Vec<String>,
    pub search_kw_individual: Vec<String>,
    pub search_kw_highered_remote: Vec<KeywordGroup>,
    pub search_kw_highered_lab: Vec<KeywordGroup>,
    pub search_kw_idealist: Vec<String>,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::Environment::with_prefix("SCOUT")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub fn get_profile(path: &str) -> Result<Profile, config::ConfigError> {
    let profile = config::Config::builder()
        .add_source(config::File::from(std::path::Path::new(path)))
        .build()?;
    let mut profile: Profile = profile.try_deserialize()?;

    profile.search_kw_highered_remote = KeywordGroup::ranked(profile.search_kw_highered_remote);
    profile.search_kw_highered_lab = KeywordGroup::ranked(profile.search_kw_highered_lab);

    Ok(profile)
}
