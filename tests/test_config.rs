use std::path::PathBuf;

use tideway::config::{Config, ConfigError};

#[test]
fn test_config_defaults_match_stock_layout() {
    let cfg = Config::default();

    assert_eq!(cfg.listen_addr, "0.0.0.0");
    assert_eq!(cfg.listen_port, 8888);
    assert_eq!(cfg.backlog, 5);
    assert_eq!(cfg.document_root, PathBuf::from("."));
    assert_eq!(cfg.static_folder, "static");
    assert_eq!(cfg.dynamic_folder, "dynamic");
    assert_eq!(cfg.chunk_size, 8192);
    assert_eq!(cfg.aio_max_events, 128);
}

#[test]
fn test_config_empty_yaml_is_default() {
    assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
}

#[test]
fn test_config_partial_yaml_keeps_other_defaults() {
    let cfg = Config::from_yaml("listen_port: 9000\nchunk_size: 4096\ndocument_root: /srv/www\n")
        .unwrap();

    assert_eq!(cfg.listen_port, 9000);
    assert_eq!(cfg.chunk_size, 4096);
    assert_eq!(cfg.document_root, PathBuf::from("/srv/www"));
    assert_eq!(cfg.static_folder, "static");
    assert_eq!(cfg.backlog, 5);
}

#[test]
fn test_config_not_found_path_is_under_root() {
    let cfg = Config::from_yaml("document_root: /srv/www\nnot_found_page: errors/404.html\n").unwrap();
    assert_eq!(cfg.not_found_path(), PathBuf::from("/srv/www/errors/404.html"));
}

#[test]
fn test_config_rejects_unparsable_yaml() {
    let result = Config::from_yaml("listen_port: [not, a, port]\n");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_config_rejects_zero_chunk_size() {
    let result = Config::from_yaml("chunk_size: 0\n");
    assert!(matches!(result, Err(ConfigError::ZeroChunkSize)));
}

#[test]
fn test_config_rejects_same_folders() {
    let result = Config::from_yaml("static_folder: files\ndynamic_folder: files\n");
    assert!(matches!(result, Err(ConfigError::OverlappingFolders)));
}

#[test]
fn test_config_rejects_nested_or_relative_folders() {
    for folder in ["", ".", "..", "a/b"] {
        let cfg = Config {
            dynamic_folder: folder.to_string(),
            ..Config::default()
        };
        assert!(
            matches!(cfg.validate(), Err(ConfigError::InvalidFolder(_))),
            "{:?} should be rejected",
            folder
        );
    }
}

#[test]
fn test_config_rejects_non_ipv4_address() {
    let result = Config::from_yaml("listen_addr: \"::1\"\n");
    assert!(matches!(result, Err(ConfigError::InvalidAddress(_))));
}

#[test]
fn test_config_from_missing_file() {
    let result = Config::from_file("/nonexistent/tideway.yaml");
    assert!(matches!(result, Err(ConfigError::Read(_))));
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1, cfg2);
}
