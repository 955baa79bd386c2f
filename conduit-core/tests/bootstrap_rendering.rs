//! Bootstrap materialization scenarios, driven without a network.
//!
//! The remote fetch is a thin byte transport; everything interesting about
//! bootstrap (database selection, secret rendering, profile persistence)
//! happens on the fetched bytes and is covered here against fixed template
//! bodies.

use conduit_core::compose::ComposeProject;
use conduit_core::template::{
    bind_database_mount, generate_secret, VariableMap, MASTER_KEY_LENGTH, PASSWORD_LENGTH,
};
use conduit_core::{block_profiles, select_database, Database, EnvFile, ProjectManifest};
use std::path::Path;

const ENV_TEMPLATE: &str = "\
MASTER_KEY={{MasterKey}}
MONGO_PASSWORD={{MongoPassword}}
IMAGE_TAG={{ImageTag}}
UI_IMAGE_TAG={{UiImageTag}}
COMPOSE_PROJECT_NAME={{ProjectName}}
";

const COMPOSE_TEMPLATE: &str = r#"
services:
  api:
    image: conduit/api:latest
  mongodb:
    image: mongo:6
    profiles: [mongodb]
    volumes:
      - mongo:/data/db
  postgres:
    image: postgres:16
    profiles: [postgres]
    volumes:
      - postgres:/var/lib/postgresql/data
  search:
    image: conduit/search:latest
    profiles: [search]
volumes:
  mongo:
  postgres:
"#;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn fresh_bootstrap_with_mongo() {
    let profiles = strings(&["mongodb", "search"]);

    // (a) the selector picks mongodb.
    let database = select_database(&profiles).unwrap().unwrap();
    assert_eq!(database, Database::Mongodb);

    // (b) the rendered env carries a 64-char master key and a 32-char
    // password in their placeholders.
    let master_key = generate_secret(MASTER_KEY_LENGTH);
    let password = generate_secret(PASSWORD_LENGTH);
    let mut vars = VariableMap::new();
    vars.insert("MasterKey", master_key.clone());
    vars.insert(database.password_variable(), password.clone());
    vars.insert("ImageTag", "v1.2.3");
    vars.insert("UiImageTag", "v1.2.3");
    vars.insert("ProjectName", "acme");

    let rendered = vars.substitute(ENV_TEMPLATE);
    let env = EnvFile::parse(rendered.into_bytes()).unwrap();
    assert_eq!(env.get("MASTER_KEY"), Some(master_key.as_str()));
    assert_eq!(env.get("MASTER_KEY").unwrap().len(), 64);
    assert_eq!(env.get("MONGO_PASSWORD"), Some(password.as_str()));
    assert_eq!(env.get("MONGO_PASSWORD").unwrap().len(), 32);
    assert_eq!(env.get("COMPOSE_PROJECT_NAME"), Some("acme"));

    // (c) persisted profiles keep "search" and never a database name.
    let project = ComposeProject::load(
        "acme",
        Path::new("/tmp/acme"),
        COMPOSE_TEMPLATE.as_bytes(),
        env,
        &profiles,
    )
    .unwrap();
    let persisted = project.filter_profiles(&block_profiles(&profiles, &[]));
    assert_eq!(persisted, vec!["search"]);

    let manifest = ProjectManifest::new("acme", conduit_core::TOOL_VERSION, database.as_str(), persisted);
    assert_eq!(manifest.database, "mongodb");
    assert!(!manifest.profiles.contains(&"mongodb".to_string()));
}

#[test]
fn double_database_request_is_rejected_before_any_work() {
    let err = select_database(&strings(&["mongodb", "postgres"])).unwrap_err();
    assert!(err.to_string().contains("cannot use multiple database profiles"));
}

#[test]
fn mounted_database_rewrite_keeps_only_the_selected_engine() {
    let rewritten = bind_database_mount(COMPOSE_TEMPLATE.as_bytes(), Database::Mongodb).unwrap();
    let env = EnvFile::parse(Vec::new()).unwrap();
    let project = ComposeProject::load(
        "acme",
        Path::new("/tmp/acme"),
        &rewritten,
        env,
        &strings(&["mongodb"]),
    )
    .unwrap();

    assert_eq!(project.service_names(), vec!["api", "mongodb"]);
    assert_eq!(
        project.service("mongodb").unwrap().volumes,
        vec!["./database/:/data/db"]
    );
}

#[test]
fn substitution_leaves_foreign_tokens_for_the_other_engine_template() {
    // A mongo bootstrap must not disturb postgres placeholders if the
    // template happens to carry both.
    let mut vars = VariableMap::new();
    vars.insert("MongoPassword", "secret");

    let out = vars.substitute("A={{MongoPassword}}\nB={{PostgresPassword}}\n");
    assert!(out.contains("A=secret"));
    assert!(out.contains("B={{PostgresPassword}}"));
}
