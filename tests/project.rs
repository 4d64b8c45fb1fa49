// tests/project.rs

use std::path::Path;

use devdag::fs::FileSystem;
use devdag::vcs::{TreeVersion, HASHED_VERSION_PREFIX, VERSION_FILE_NAME};
use devdag_test_utils::{module_path, ProjectBuilder, DEFAULT_COMMIT};

fn names(modules: Vec<std::sync::Arc<devdag::project::Module>>) -> Vec<String> {
    modules.into_iter().map(|m| m.name.clone()).collect()
}

#[test]
fn dependants_follow_build_and_runtime_edges() {
    let project = ProjectBuilder::new()
        .module("lib", |m| m)
        .module("api", |m| m.build_deps(&["lib"]).service("api", &[]))
        .module("web", |m| m.service("web", &["api"]))
        .module("e2e", |m| m.test("smoke", &["web"]))
        .module("docs", |m| m)
        .build();

    assert_eq!(names(project.dependants_of("lib")), vec!["api", "e2e", "web"]);
    assert_eq!(names(project.dependants_of("web")), vec!["e2e"]);
    assert!(project.dependants_of("docs").is_empty());
    assert!(project.dependants_of("missing").is_empty());
}

#[test]
fn module_for_path_picks_the_deepest_module() {
    let project = ProjectBuilder::new()
        .module("api", |m| m)
        .module("auth", |m| m.path("api/auth"))
        .build();

    let owner = |p: &str| project.module_for_path(Path::new(p)).map(|m| m.name.clone());
    assert_eq!(owner("/project/api/main.rs").as_deref(), Some("api"));
    assert_eq!(owner("/project/api/auth/lib.rs").as_deref(), Some("auth"));
    assert_eq!(owner("/project/other/file"), None);
}

#[test]
fn versions_are_cached_until_invalidated() {
    let builder = ProjectBuilder::new().module("api", |m| m);
    let vcs = builder.vcs();
    let project = builder.build();

    assert_eq!(project.module_version("api").unwrap().version_string, DEFAULT_COMMIT);

    vcs.set(module_path("api"), TreeVersion::clean("2222222222"));
    assert_eq!(project.module_version("api").unwrap().version_string, DEFAULT_COMMIT);

    project.invalidate_versions();
    assert_eq!(project.module_version("api").unwrap().version_string, "2222222222");
}

#[test]
fn build_dependencies_feed_the_module_version() {
    let project = ProjectBuilder::new()
        .module("lib", |m| m)
        .module("app", |m| m.build_deps(&["lib"]))
        .build();

    let app = project.module_version("app").unwrap();
    assert!(app.version_string.starts_with(HASHED_VERSION_PREFIX));
    assert_eq!(app.version_string.len(), 11);
    assert!(app.dependency_versions.contains_key("lib"));
    assert!(!app.is_dirty());
}

#[test]
fn a_dirty_dependency_makes_the_dependent_dirty() {
    let project = ProjectBuilder::new()
        .module("lib", |m| m)
        .module("app", |m| m.build_deps(&["lib"]))
        .tree("lib", TreeVersion::dirty("abc", 1_700_000_123))
        .build();

    let app = project.module_version("app").unwrap();
    assert!(app.is_dirty());
    assert_eq!(app.version_string, "abc-1700000123");
}

#[test]
fn version_file_overrides_source_control() {
    let builder = ProjectBuilder::new().module("vendor", |m| m);
    let fs = builder.fs();
    fs.write(
        &module_path("vendor").join(VERSION_FILE_NAME),
        br#"{"latestCommit":"vendored1","dirtyTimestamp":null}"#,
    )
    .unwrap();
    let project = builder.build();

    assert_eq!(project.module_version("vendor").unwrap().version_string, "vendored1");
}

#[test]
fn malformed_version_file_is_a_configuration_error() {
    let builder = ProjectBuilder::new().module("vendor", |m| m);
    builder
        .fs()
        .add_file(module_path("vendor").join(VERSION_FILE_NAME), "not json");
    let project = builder.build();

    let err = project.module_version("vendor").unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("not json"));
}

#[tokio::test]
async fn warming_resolves_versions_off_the_calling_thread() {
    let builder = ProjectBuilder::new()
        .module("lib", |m| m)
        .module("app", |m| m.build_deps(&["lib"]));
    let vcs = builder.vcs();
    let project = builder.build();

    project.warm_versions().await;

    let here = std::thread::current().id();
    let lookups = vcs.lookups();
    assert!(lookups.iter().any(|(path, _)| path == &module_path("app")));
    assert!(lookups.iter().all(|(_, thread)| *thread != here));

    vcs.clear_lookups();
    project.module_version("app").unwrap();
    assert!(vcs.lookups().is_empty());
}
