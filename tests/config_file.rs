// Copyright 2021 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0

// Loading of the configuration file shipped with the tool.
#[cfg(test)]
mod tests {
    use log::LevelFilter;
    use pkcs11_certsign::provider::SearchLimits;
    use pkcs11_certsign::utils::config::Config;
    use std::path::Path;

    #[test]
    fn shipped_configuration_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml");
        let config = Config::load(&path).unwrap();

        assert_eq!(config.core_settings.log_level, Some(LevelFilter::Info));
        assert_eq!(config.core_settings.log_error_details, Some(false));
        assert_eq!(config.search_limits(), SearchLimits::default());
        assert!(config.pin.user_pin.is_none());
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = Config::load(Path::new("/nonexistent/pkcs11-certsign.toml")).unwrap();

        assert!(config.core_settings.log_level.is_none());
        assert_eq!(config.search_limits(), SearchLimits::default());
    }

    #[test]
    fn unreadable_toml_is_rejected() {
        assert!(Config::from_toml("[search]\nmax_objects_per_search = \"many\"").is_err());
    }
}
