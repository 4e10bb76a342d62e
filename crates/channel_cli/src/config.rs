use std::fs;
use std::path::Path;

use anyhow::Context;
use channel_core::{CatalogFile, LocaleCatalog};
use channel_engine::{CrawlError, ServiceSettings};
use crawl_logging::crawl_info;
use url::Url;

use crate::cli::GatewayArgs;

pub const GATEWAY_URL_VAR: &str = "HARVESTER_GATEWAY_URL";
pub const API_TOKEN_VAR: &str = "HARVESTER_API_TOKEN";

/// Gateway settings from flags or environment. Anything missing is a setup error.
pub fn service_settings(args: &GatewayArgs) -> Result<ServiceSettings, CrawlError> {
    let raw_url = non_blank(args.url.as_deref()).ok_or_else(|| {
        CrawlError::setup(
            "gateway address is not configured",
            format!("set {GATEWAY_URL_VAR} or pass --gateway"),
        )
    })?;
    let token = non_blank(args.token.as_deref()).ok_or_else(|| {
        CrawlError::setup(
            "API token is not configured",
            format!("set {API_TOKEN_VAR} or pass --token"),
        )
    })?;
    let base_url = Url::parse(raw_url).map_err(|err| {
        CrawlError::setup(
            format!("gateway address {raw_url:?} is invalid: {err}"),
            format!("set {GATEWAY_URL_VAR} to an http(s) URL"),
        )
    })?;
    Ok(ServiceSettings::new(base_url, token))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The built-in catalog, or the one in `path` when given.
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<LocaleCatalog> {
    let Some(path) = path else {
        return Ok(LocaleCatalog::builtin().clone());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading locale catalog {}", path.display()))?;
    let file: CatalogFile = ron::from_str(&content)
        .with_context(|| format!("parsing locale catalog {}", path.display()))?;
    let catalog = LocaleCatalog::from_profiles(file.locales)
        .with_context(|| format!("validating locale catalog {}", path.display()))?;
    crawl_info!("Loaded locales {:?} from {}", catalog.codes(), path.display());
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn gateway(url: Option<&str>, token: Option<&str>) -> GatewayArgs {
        GatewayArgs {
            url: url.map(String::from),
            token: token.map(String::from),
        }
    }

    #[test]
    fn missing_credentials_name_the_variable() {
        let err = service_settings(&gateway(None, Some("t"))).unwrap_err();
        assert!(err.is_setup());
        assert!(err.to_string().contains(GATEWAY_URL_VAR));

        let err = service_settings(&gateway(Some("http://localhost:8080"), Some("  "))).unwrap_err();
        assert!(err.to_string().contains(API_TOKEN_VAR));
    }

    #[test]
    fn invalid_url_is_a_setup_error() {
        let err = service_settings(&gateway(Some("not a url"), Some("t"))).unwrap_err();
        assert!(err.is_setup());
    }

    #[test]
    fn builds_settings_from_credentials() {
        let settings =
            service_settings(&gateway(Some("http://localhost:8080/api/"), Some("abc"))).unwrap();
        assert_eq!(settings.base_url.as_str(), "http://localhost:8080/api/");
        assert_eq!(settings.api_token, "abc");
    }

    #[test]
    fn catalog_file_replaces_builtin() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.ron");
        fs::write(
            &path,
            r##"(locales: [(code: "KZ", seeds: ["kz_market"], queries: ["#продам"], currencies: ["тг"])])"##,
        )
        .unwrap();

        let catalog = load_catalog(Some(&path)).unwrap();

        assert_eq!(catalog.codes(), vec!["kz".to_string()]);
        assert_eq!(catalog.seeds("kz").unwrap().len(), 1);
        assert!(catalog.get("kg").is_err());
    }

    #[test]
    fn builtin_catalog_without_path() {
        let catalog = load_catalog(None).unwrap();
        assert!(catalog.get("kg").is_ok());
    }
}
