use std::path::{Path, PathBuf};

use tideway::resource::{Classifier, ResourceType};

fn classifier() -> Classifier {
    Classifier::new("static", "dynamic")
}

#[test]
fn test_classify_static_and_dynamic() {
    let c = classifier();

    assert_eq!(c.classify("/static/index.html"), ResourceType::Static);
    assert_eq!(c.classify("/static/css/site.css"), ResourceType::Static);
    assert_eq!(c.classify("/dynamic/report.bin"), ResourceType::Dynamic);
}

#[test]
fn test_classify_unknown_folder() {
    let c = classifier();

    assert_eq!(c.classify("/missing/x"), ResourceType::None);
    assert_eq!(c.classify("/"), ResourceType::None);
    assert_eq!(c.classify(""), ResourceType::None);
}

#[test]
fn test_classify_requires_segment_prefix() {
    let c = classifier();

    assert_eq!(c.classify("/notstatic/x"), ResourceType::None);
    assert_eq!(c.classify("/static2/x"), ResourceType::None);
    assert_eq!(c.classify("/files/dynamic/x"), ResourceType::None);
    assert_eq!(c.classify("static/x"), ResourceType::None);
}

#[test]
fn test_classify_custom_folders() {
    let c = Classifier::new("assets", "reports");

    assert_eq!(c.classify("/assets/a.png"), ResourceType::Static);
    assert_eq!(c.classify("/reports/q3.bin"), ResourceType::Dynamic);
    assert_eq!(c.classify("/static/a.png"), ResourceType::None);
}

#[test]
fn test_resolve_joins_under_root() {
    let c = classifier();

    assert_eq!(
        c.resolve(Path::new("/srv"), "/dynamic/a/b.bin"),
        Some(PathBuf::from("/srv/dynamic/a/b.bin"))
    );
    assert_eq!(
        c.resolve(Path::new("."), "/static/./x"),
        Some(PathBuf::from("./static/x"))
    );
}

#[test]
fn test_resolve_refuses_to_escape_root() {
    let c = classifier();

    assert_eq!(c.resolve(Path::new("/srv"), "/static/../../etc/passwd"), None);
    assert_eq!(c.resolve(Path::new("/srv"), "//etc/passwd"), None);
}
