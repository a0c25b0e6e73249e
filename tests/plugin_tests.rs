// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for models declared inside the configuration.

mod common;

use common::{bare_builder, builder_in, write_file};
use flange::adapters::RegistryResolver;
use flange::domain::model::{PLUGIN_MODEL_NAME, PLUGIN_TYPE_MARKER};
use flange::domain::{
    factory, factory_fn, register_default_model, ConfigError, ConfigValue, Instance, ModelSpec,
};
use flange::service::{Cfg, CfgBuilder};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Widget {
    size: u64,
}

fn widget_resolver() -> RegistryResolver {
    RegistryResolver::new()
        .with_schema(
            "rust://p1/schema",
            json!({
                "type": "object",
                "properties": {"kind": {"const": "p1"}, "size": {"type": "integer"}},
                "required": ["kind", "size"]
            }),
        )
        .with_factory(
            "rust://p1/build",
            factory_fn(|params| {
                Ok(Widget {
                    size: params["size"].as_u64().ok_or("size must be an integer")?,
                })
            }),
        )
}

fn plugin_data() -> ConfigValue {
    json!({
        "p1_model": {
            "name": "p1",
            "type": PLUGIN_TYPE_MARKER,
            "schema": "rust://p1/schema",
            "factory": "rust://p1/build()"
        },
        "inst1": {"kind": "p1", "size": 3},
        "unrelated": {"kind": "p2", "size": 4}
    })
}

fn plugin_cfg() -> Cfg {
    bare_builder()
        .resolver(Arc::new(widget_resolver()))
        .init_data(plugin_data())
        .build()
        .unwrap()
}

#[test]
fn test_declared_model_is_installed() {
    let cfg = plugin_cfg();

    assert!(cfg.models().any(|name| name == "p1"));
    assert_eq!(cfg.list("p1").unwrap(), vec!["inst1"]);
    assert_eq!(cfg.list(PLUGIN_MODEL_NAME).unwrap(), vec!["p1_model"]);
    assert!(cfg.research_errors().is_empty());

    let widget = cfg.query("inst1").model("p1").obj_as::<Widget>().unwrap().unwrap();
    assert_eq!(*widget, Widget { size: 3 });

    let instance = cfg.obj("inst1", Some("p1")).unwrap().unwrap();
    assert!(Arc::ptr_eq(&(widget as Instance), &instance));
}

#[test]
fn test_unknown_model_name() {
    let cfg = plugin_cfg();
    assert!(matches!(
        cfg.obj("inst1", Some("nonexistent")).unwrap_err(),
        ConfigError::NoSuchModel { name } if name == "nonexistent"
    ));
}

#[test]
fn test_mget_skips_declarations() {
    let cfg = plugin_cfg();
    let widget = cfg
        .mget(None, None, &[], true)
        .unwrap()
        .unwrap()
        .downcast::<Widget>()
        .unwrap();
    assert_eq!(widget.size, 3);
}

#[test]
fn test_unresolvable_declaration_is_recorded() {
    let cfg = bare_builder()
        .init_data(plugin_data())
        .build()
        .unwrap();

    assert!(cfg.model("p1").is_none());
    assert!(cfg
        .research_errors()
        .iter()
        .any(|e| matches!(e, ConfigError::Resolve { .. })));
    assert!(cfg.info().to_string().contains("research errors:"));
}

#[test]
fn test_declaration_with_inline_schema_and_injection() {
    let resolver = RegistryResolver::new().with_factory(
        "rust://greeting/build",
        factory(|ctx| {
            let cfg = ctx.cfg.ok_or("no configuration injected")?;
            let name = cfg
                .value("app.name")?
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let greeting = ctx.params["greeting"].as_str().unwrap_or("hello");
            Ok(Arc::new(format!("{}, {}", greeting, name)) as Instance)
        }),
    );

    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "plugins.yml",
        "greeter_model:\n  name: greeter\n  type: FLANGE.TYPE.PLUGIN\n  schema:\n    type: object\n    required: [greeting]\n  factory: rust://greeting/build\n  inject: flange\n",
    );
    write_file(dir.path(), "app.yml", "app:\n  name: demo\nwelcome:\n  greeting: hi\n");

    let cfg = builder_in(dir.path())
        .resolver(Arc::new(resolver))
        .build()
        .unwrap();

    let greeting = cfg.query("welcome").model("greeter").obj_as::<String>().unwrap().unwrap();
    assert_eq!(greeting.as_str(), "hi, demo");
}

#[test]
fn test_factory_failure_surfaces_with_reraise() {
    let resolver = RegistryResolver::new()
        .with_schema("rust://p1/schema", json!({"type": "object", "required": ["kind", "size"]}))
        .with_factory(
            "rust://p1/build",
            factory_fn(|params| {
                params["size"]
                    .as_u64()
                    .map(|size| Widget { size })
                    .ok_or_else(|| "size must be an integer".into())
            }),
        );
    let cfg = bare_builder()
        .resolver(Arc::new(resolver))
        .init_data(json!({
            "p1_model": {
                "name": "p1",
                "type": PLUGIN_TYPE_MARKER,
                "schema": "rust://p1/schema",
                "factory": "rust://p1/build"
            },
            "bad": {"kind": "p1", "size": "large"}
        }))
        .build()
        .unwrap();

    assert!(cfg.obj("bad", Some("p1")).unwrap().is_none());
    assert!(matches!(
        cfg.query("bad").model("p1").reraise(true).obj().unwrap_err(),
        ConfigError::FactoryConstruction { .. }
    ));
}

#[test]
fn test_default_model_applies_to_later_builds() {
    register_default_model(ModelSpec::identity(
        "plugin_tests_endpoint",
        json!({
            "type": "object",
            "properties": {"plugin_tests_url": {"type": "string"}},
            "required": ["plugin_tests_url"]
        }),
    ));

    let cfg = CfgBuilder::new()
        .base_dirs(Vec::<String>::new())
        .include_os_env(false)
        .init_data(json!({"api": {"plugin_tests_url": "http://localhost"}}))
        .build()
        .unwrap();

    assert_eq!(cfg.list("plugin_tests_endpoint").unwrap(), vec!["api"]);
    let endpoint = cfg
        .obj("api", Some("plugin_tests_endpoint"))
        .unwrap()
        .unwrap()
        .downcast::<ConfigValue>()
        .unwrap();
    assert_eq!(endpoint["plugin_tests_url"], json!("http://localhost"));
}
