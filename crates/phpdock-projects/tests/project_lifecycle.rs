//! Project creation, rollback, update, and deletion against the in-memory
//! runtime and filesystem-backed stores.

use async_trait::async_trait;
use phpdock_core::project::Framework;
use phpdock_core::{EventBus, PhpVersion, ProjectKind};
use phpdock_projects::{
    CreateProjectRequest, HostsEditor, ProjectError, ProjectOrchestrator, ProjectSource,
    ProjectStore, TemplateContext, TemplateGenerator, UpdateProject,
};
use phpdock_proxy::{ProjectCatalog, ProxySynchronizer};
use phpdock_runtime::fake::FakeRuntime;
use phpdock_runtime::{ContainerRuntime, ContainerSpec};
use phpdock_transfer::{TransferEngine, TransferError, HELPER_PREFIX};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeHosts {
    entries: Mutex<BTreeSet<String>>,
    fail_add: AtomicBool,
}

impl FakeHosts {
    fn contains(&self, domain: &str) -> bool {
        self.entries.lock().unwrap().contains(domain)
    }
}

#[async_trait]
impl HostsEditor for FakeHosts {
    async fn add_entry(&self, domain: &str) -> Result<(), String> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err("hosts file is read-only".to_string());
        }
        self.entries.lock().unwrap().insert(domain.to_string());
        Ok(())
    }

    async fn remove_entry(&self, domain: &str) -> Result<(), String> {
        self.entries.lock().unwrap().remove(domain);
        Ok(())
    }
}

#[derive(Default)]
struct FakeTemplates {
    generated: Mutex<BTreeSet<PathBuf>>,
    fail: AtomicBool,
}

impl FakeTemplates {
    fn mark_existing(&self, dir: &Path) {
        self.generated.lock().unwrap().insert(dir.to_path_buf());
    }
}

#[async_trait]
impl TemplateGenerator for FakeTemplates {
    async fn generate(&self, context: &TemplateContext, overwrite: bool) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("template rendering failed".to_string());
        }
        let mut generated = self.generated.lock().unwrap();
        if generated.contains(&context.project_dir) && !overwrite {
            return Err("a devcontainer configuration already exists".to_string());
        }
        generated.insert(context.project_dir.clone());
        Ok(())
    }
}

struct Fixture {
    fake: FakeRuntime,
    hosts: Arc<FakeHosts>,
    templates: Arc<FakeTemplates>,
    store: Arc<ProjectStore>,
    orchestrator: ProjectOrchestrator,
    dir: tempfile::TempDir,
}

async fn fixture_with(initialize: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeRuntime::new();
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(fake.clone());
    let bus = EventBus::new(256);

    let transfer = Arc::new(TransferEngine::with_timeouts(
        Arc::clone(&runtime),
        bus.clone(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    ));

    let store = Arc::new(ProjectStore::new(dir.path().join("projects.json")));
    if initialize {
        store.initialize().await.unwrap();
    }

    let hosts = Arc::new(FakeHosts::default());
    let templates = Arc::new(FakeTemplates::default());
    let catalog: Arc<dyn ProjectCatalog> = Arc::clone(&store) as Arc<dyn ProjectCatalog>;
    let proxy = Arc::new(ProxySynchronizer::new(Arc::clone(&runtime), catalog));

    let orchestrator = ProjectOrchestrator::new(
        runtime,
        transfer,
        Arc::clone(&store),
        Arc::clone(&hosts) as Arc<dyn HostsEditor>,
        Arc::clone(&templates) as Arc<dyn TemplateGenerator>,
        proxy,
        bus,
    );

    Fixture { fake, hosts, templates, store, orchestrator, dir }
}

async fn fixture() -> Fixture {
    fixture_with(true).await
}

fn new_request(fx: &Fixture, name: &str) -> CreateProjectRequest {
    CreateProjectRequest::new(
        name,
        ProjectSource::New {
            parent_dir: fx.dir.path().join("sites"),
            framework: None,
            scaffold: false,
        },
    )
}

#[tokio::test]
async fn create_sanitizes_name_and_derives_resources() {
    let fx = fixture().await;

    let project = fx
        .orchestrator
        .create_project(new_request(&fx, "My Site!!"))
        .await
        .unwrap();

    assert_eq!(project.name, "my-site");
    assert_eq!(project.volume_name, "proj_my-site");
    assert_eq!(project.domain, "my-site.local");
    assert!(project.files_generated);
    assert!(project.volume_copied);

    assert!(fx.fake.has_volume("proj_my-site"));
    assert!(fx.dir.path().join("sites/my-site").is_dir());
    assert!(fx.hosts.contains("my-site.local"));
    assert!(fx.store.find_by_name("my-site").await.unwrap().is_some());

    // No helper container survived the bulk copy.
    assert!(fx.fake.containers_with_prefix(HELPER_PREFIX).is_empty());
}

#[tokio::test]
async fn failure_at_file_generation_rolls_back_volume_and_folder() {
    let fx = fixture().await;
    fx.templates.fail.store(true, Ordering::SeqCst);

    let err = fx
        .orchestrator
        .create_project(new_request(&fx, "My Site!!"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProjectError::Template(_)));

    assert!(!fx.fake.has_volume("proj_my-site"));
    assert!(!fx.dir.path().join("sites/my-site").exists());
    assert!(!fx.hosts.contains("my-site.local"));
    assert!(fx.store.find_by_name("my-site").await.unwrap().is_none());
}

#[tokio::test]
async fn failure_at_bulk_copy_rolls_back_and_keeps_no_helpers() {
    let fx = fixture().await;
    fx.fake.set_wait_code(HELPER_PREFIX, 1);
    fx.fake.set_logs("tar: disk quota exceeded\n");

    let err = fx
        .orchestrator
        .create_project(new_request(&fx, "shop"))
        .await
        .unwrap_err();
    match err {
        ProjectError::Transfer(TransferError::Failed { logs, .. }) => {
            assert!(logs.contains("disk quota exceeded"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!fx.fake.has_volume("proj_shop"));
    assert!(!fx.dir.path().join("sites/shop").exists());
    assert!(fx.store.find_by_name("shop").await.unwrap().is_none());
    assert!(fx.fake.containers_with_prefix(HELPER_PREFIX).is_empty());
}

#[tokio::test]
async fn imported_folder_survives_rollback() {
    let fx = fixture().await;
    let import_dir = fx.dir.path().join("legacy-app");
    std::fs::create_dir_all(&import_dir).unwrap();
    std::fs::write(import_dir.join("index.php"), "<?php echo 'hi';\n").unwrap();

    // Make the copy step fail after the volume exists.
    fx.fake.set_wait_code(HELPER_PREFIX, 1);

    let request = CreateProjectRequest::new(
        "Legacy App",
        ProjectSource::Import { path: import_dir.clone() },
    );
    fx.orchestrator.create_project(request).await.unwrap_err();

    // The volume is gone, but the user's folder was not created by us and
    // must never be deleted.
    assert!(!fx.fake.has_volume("proj_legacy-app"));
    assert!(import_dir.join("index.php").is_file());
}

#[tokio::test]
async fn import_detects_laravel_with_two_signals() {
    let fx = fixture().await;
    let import_dir = fx.dir.path().join("laravel-app");
    std::fs::create_dir_all(&import_dir).unwrap();
    std::fs::write(
        import_dir.join("composer.json"),
        r#"{"require":{"laravel/framework":"^11.0"}}"#,
    )
    .unwrap();
    std::fs::write(import_dir.join("artisan"), "#!/usr/bin/env php\n").unwrap();

    let project = fx
        .orchestrator
        .create_project(CreateProjectRequest::new(
            "Laravel App",
            ProjectSource::Import { path: import_dir },
        ))
        .await
        .unwrap();

    assert_eq!(project.kind, ProjectKind::Framework(Framework::Laravel));
}

#[tokio::test]
async fn import_with_one_signal_stays_generic() {
    let fx = fixture().await;
    let import_dir = fx.dir.path().join("half-laravel");
    std::fs::create_dir_all(&import_dir).unwrap();
    std::fs::write(
        import_dir.join("composer.json"),
        r#"{"require":{"laravel/framework":"^11.0"}}"#,
    )
    .unwrap();

    let project = fx
        .orchestrator
        .create_project(CreateProjectRequest::new(
            "Half",
            ProjectSource::Import { path: import_dir },
        ))
        .await
        .unwrap();

    assert_eq!(project.kind, ProjectKind::Imported);
}

#[tokio::test]
async fn version_constraint_fails_before_any_side_effect() {
    let fx = fixture().await;

    let mut request = CreateProjectRequest::new(
        "old-app",
        ProjectSource::New {
            parent_dir: fx.dir.path().join("sites"),
            framework: Some(Framework::Laravel),
            scaffold: false,
        },
    );
    request.php_version = PhpVersion::V8_1;

    let err = fx.orchestrator.create_project(request).await.unwrap_err();
    assert!(matches!(err, ProjectError::VersionConstraint { .. }));
    assert!(err.to_string().contains("8.2"));

    assert!(fx.fake.mutation_calls().is_empty());
    assert!(!fx.dir.path().join("sites/old-app").exists());
}

#[tokio::test]
async fn scaffold_runs_a_composer_helper() {
    let fx = fixture().await;

    let request = CreateProjectRequest::new(
        "fresh",
        ProjectSource::New {
            parent_dir: fx.dir.path().join("sites"),
            framework: Some(Framework::Laravel),
            scaffold: true,
        },
    );
    fx.orchestrator.create_project(request).await.unwrap();

    let calls = fx.fake.mutation_calls();
    assert!(
        calls
            .iter()
            .any(|c| c.starts_with("create_container:phpdock_helper_scaffold")),
        "scaffold helper expected, calls: {calls:?}"
    );
    assert!(fx.fake.containers_with_prefix(HELPER_PREFIX).is_empty());
}

#[tokio::test]
async fn hosts_failure_is_advisory() {
    let fx = fixture().await;
    fx.hosts.fail_add.store(true, Ordering::SeqCst);

    let project = fx
        .orchestrator
        .create_project(new_request(&fx, "resilient"))
        .await
        .unwrap();

    assert!(!fx.hosts.contains(&project.domain));
    assert!(fx.store.find_by_name("resilient").await.unwrap().is_some());
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let fx = fixture().await;
    fx.orchestrator.create_project(new_request(&fx, "blog")).await.unwrap();

    let err = fx
        .orchestrator
        .create_project(new_request(&fx, "Blog!"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProjectError::Validation(_)));
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn refuses_to_overwrite_existing_configuration() {
    let fx = fixture().await;
    let folder = fx.dir.path().join("sites/guarded");
    fx.templates.mark_existing(&folder);

    let err = fx
        .orchestrator
        .create_project(new_request(&fx, "guarded"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProjectError::Template(_)));

    // With the explicit flag the same request succeeds.
    let mut request = new_request(&fx, "guarded");
    request.overwrite_files = true;
    fx.orchestrator.create_project(request).await.unwrap();
}

#[tokio::test]
async fn mutating_before_initialization_is_an_error() {
    let fx = fixture_with(false).await;

    let err = fx
        .orchestrator
        .create_project(new_request(&fx, "early"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProjectError::NotInitialized));
}

#[tokio::test]
async fn update_swaps_hosts_entry_when_domain_changes() {
    let fx = fixture().await;
    let project = fx.orchestrator.create_project(new_request(&fx, "blog")).await.unwrap();
    assert!(fx.hosts.contains("blog.local"));

    let patch = UpdateProject {
        domain: Some("blog.dev.local".to_string()),
        ..Default::default()
    };
    let updated = fx.orchestrator.update_project(project.id, patch).await.unwrap();

    assert_eq!(updated.domain, "blog.dev.local");
    assert!(!fx.hosts.contains("blog.local"));
    assert!(fx.hosts.contains("blog.dev.local"));
}

#[tokio::test]
async fn regenerate_revalidates_version_constraints() {
    let fx = fixture().await;
    let request = CreateProjectRequest::new(
        "fw",
        ProjectSource::New {
            parent_dir: fx.dir.path().join("sites"),
            framework: Some(Framework::Symfony),
            scaffold: false,
        },
    );
    let project = fx.orchestrator.create_project(request).await.unwrap();

    let patch = UpdateProject {
        php_version: Some(PhpVersion::V8_1),
        regenerate_files: true,
        ..Default::default()
    };
    let err = fx.orchestrator.update_project(project.id, patch).await.unwrap_err();
    assert!(matches!(err, ProjectError::VersionConstraint { .. }));
}

#[tokio::test]
async fn delete_is_non_destructive_by_default() {
    let fx = fixture().await;
    let project = fx.orchestrator.create_project(new_request(&fx, "keeper")).await.unwrap();

    fx.orchestrator.delete_project(project.id, false, false).await.unwrap();

    assert!(fx.store.get(project.id).await.unwrap().is_none());
    assert!(fx.fake.has_volume("proj_keeper"));
    assert!(fx.dir.path().join("sites/keeper").is_dir());
    assert!(!fx.hosts.contains("keeper.local"));
}

#[tokio::test]
async fn delete_with_flags_removes_volume_and_folder() {
    let fx = fixture().await;
    let project = fx.orchestrator.create_project(new_request(&fx, "goner")).await.unwrap();

    fx.orchestrator.delete_project(project.id, true, true).await.unwrap();

    assert!(!fx.fake.has_volume("proj_goner"));
    assert!(!fx.dir.path().join("sites/goner").exists());
    assert!(fx.store.get(project.id).await.unwrap().is_none());
}

#[tokio::test]
async fn create_triggers_proxy_sync_when_caddy_runs() {
    let fx = fixture().await;
    fx.fake
        .add_container(ContainerSpec::builder("svc_caddy", "caddy:2-alpine").build(), true);

    fx.orchestrator.create_project(new_request(&fx, "routed")).await.unwrap();

    // The sync is fire-and-forget; give it a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = fx.fake.mutation_calls();
    assert!(
        calls.iter().any(|c| c.starts_with("exec:svc_caddy:sh")),
        "expected a proxy configuration write, calls: {calls:?}"
    );
}
