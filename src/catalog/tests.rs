use super::*;
use crate::platform::PlatformTag;
use serde_json::json;

fn document() -> String {
    json!({
        "schemaVersion": "1",
        "plugins": {
            "poly": {"versions": [
                {"version": "1.0.0", "abstract": "Polyphony", "opcodes": ["poly"],
                 "binaries": [{"platform": "linux", "url": "libpoly.so"}]},
                {"version": "1.10.0", "abstract": "Polyphony", "opcodes": ["poly", "polyseq"],
                 "binaries": [{"platform": "linux", "hostVersion": ">=6.14", "url": "libpoly.so"}]}
            ]},
            "else": {"versions": [
                {"version": "1.18.2", "binaries": [
                    {"platform": "macos", "url": "else.zip", "extractPath": "libelse.dylib"}
                ]}
            ]},
            "broken": {"versions": [{"version": "not-a-version", "binaries": []}]},
            "beosc": {"versions": [
                {"version": "1.0.0", "binaries": [{"platform": "windows", "url": "beosc.dll"}]}
            ]}
        }
    })
    .to_string()
}

#[test]
fn test_strict_parse_rejects_any_invalid_plugin() {
    let err = Catalog::parse(&document(), None).unwrap_err();
    assert!(matches!(err, OpmError::CatalogFormat { plugin: Some(ref p), .. } if p == "broken"));
}

#[test]
fn test_lenient_parse_quarantines_invalid_plugin() {
    let catalog = Catalog::parse_lenient(&document(), None).unwrap();
    assert_eq!(catalog.schema_version(), "1");
    assert_eq!(catalog.all_plugins().len(), 3);
    assert_eq!(catalog.invalid_plugins().len(), 1);
    assert_eq!(catalog.invalid_plugins()[0].name, "broken");

    let err = catalog.require("broken").unwrap_err();
    assert!(matches!(err, OpmError::CatalogFormat { .. }));
    assert!(catalog.require("poly").is_ok());
}

#[test]
fn test_declaration_order_is_preserved() {
    let catalog = Catalog::parse_lenient(&document(), None).unwrap();
    let names: Vec<&str> = catalog.all_plugins().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["poly", "else", "beosc"]);
    let declared: Vec<&str> = catalog.declared_names().collect();
    assert_eq!(declared, vec!["poly", "else", "broken", "beosc"]);
}

#[test]
fn test_lookup_is_case_insensitive() {
    let catalog = Catalog::parse_lenient(&document(), None).unwrap();
    assert_eq!(catalog.lookup("POLY").map(|p| p.name.as_str()), Some("poly"));
    assert!(catalog.lookup("missing").is_none());
}

#[test]
fn test_require_unknown_suggests_close_name() {
    let catalog = Catalog::parse_lenient(&document(), None).unwrap();
    match catalog.require("pol") {
        Err(OpmError::PluginNotFound { name, suggestion }) => {
            assert_eq!(name, "pol");
            assert_eq!(suggestion.as_deref(), Some("poly"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_schema_version_checks() {
    let missing = json!({"plugins": {}}).to_string();
    assert!(matches!(
        Catalog::parse(&missing, None),
        Err(OpmError::CatalogFormat { plugin: None, .. })
    ));

    let unsupported = json!({"schemaVersion": "2.0", "plugins": {}}).to_string();
    assert!(Catalog::parse_lenient(&unsupported, None).is_err());

    let numeric = json!({"schemaVersion": 1, "plugins": {}}).to_string();
    assert!(Catalog::parse(&numeric, None).is_ok());

    let dotted = json!({"schemaVersion": "1.2", "plugins": {}}).to_string();
    assert_eq!(Catalog::parse(&dotted, None).unwrap().schema_version(), "1.2");
}

#[test]
fn test_document_level_errors_are_fatal_even_when_lenient() {
    assert!(Catalog::parse_lenient("not json", None).is_err());
    assert!(Catalog::parse_lenient("[]", None).is_err());
    assert!(Catalog::parse_lenient(r#"{"schemaVersion": "1"}"#, None).is_err());
    assert!(Catalog::parse_lenient(r#"{"schemaVersion": "1", "plugins": []}"#, None).is_err());
}

#[test]
fn test_resolve_url_against_base() {
    let catalog = Catalog::parse(
        &json!({"schemaVersion": "1", "plugins": {}}).to_string(),
        Some("https://example.org/plugins/"),
    )
    .unwrap();
    assert_eq!(catalog.resolve_url("poly.zip"), "https://example.org/plugins/poly.zip");
    assert_eq!(catalog.resolve_url("https://cdn.org/x.zip"), "https://cdn.org/x.zip");

    let local = Catalog::parse(
        &json!({"schemaVersion": "1", "baseUrl": "/srv/catalog", "plugins": {}}).to_string(),
        Some("ignored"),
    )
    .unwrap();
    #[cfg(unix)]
    assert_eq!(local.resolve_url("linux/libpoly.so"), "/srv/catalog/linux/libpoly.so");
    assert_eq!(local.base(), Some("/srv/catalog"));
}

#[test]
fn test_plugin_listable_but_not_installable() {
    let catalog = Catalog::parse_lenient(&document(), None).unwrap();
    let beosc = catalog.lookup("beosc").unwrap();
    assert!(!beosc.has_platform(PlatformTag::Linux));
    assert!(beosc.has_platform(PlatformTag::Windows));
}
