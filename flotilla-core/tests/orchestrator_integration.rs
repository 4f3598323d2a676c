//! End-to-end orchestration tests against in-memory collaborators.

use async_trait::async_trait;
use flotilla_core::clients::{FingerprintSource, FleetClient, ObjectStore};
use flotilla_core::{
    App, ArtifactPublisher, CookbookBuilder, CookbookSource, DeploymentDispatcher,
    DeploymentStatus, Deployer, DeploymentCommand, FleetDeployer, FlotillaError, NullReporter,
    Orchestrator, Result, Stack, StackAnalyzer, StoreLocation,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const LOCAL_FINGERPRINT: &str = "rev-abc123";

/// What the fake fleet does with a command once its deployment is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandOutcome {
    /// Running on the first poll, then Successful.
    Succeed,
    /// Running on the first poll, then Failed.
    Fail,
    /// Status lookups never return a matching record.
    Vanish,
}

#[derive(Default)]
struct FakeFleet {
    stacks: HashMap<String, Stack>,
    apps: HashMap<String, Vec<App>>,
    no_instances: HashSet<String>,
    outcomes: HashMap<(String, String), CommandOutcome>,
    created: Mutex<Vec<(String, String, Option<String>)>>,
    deployments: Mutex<HashMap<String, (CommandOutcome, usize)>>,
    next_id: AtomicUsize,
}

impl FakeFleet {
    fn add_stack(&mut self, stack: Stack, apps: Vec<App>) {
        self.apps.insert(stack.id.clone(), apps);
        self.stacks.insert(stack.id.clone(), stack);
    }

    fn command_log(&self, stack_id: &str) -> Vec<(String, Option<String>)> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|(sid, _, _)| sid == stack_id)
            .map(|(_, command, app)| (command.clone(), app.clone()))
            .collect()
    }
}

#[async_trait]
impl FleetClient for FakeFleet {
    async fn describe_stack(&self, stack_id: &str) -> Result<Stack> {
        self.stacks
            .get(stack_id)
            .cloned()
            .ok_or_else(|| FlotillaError::Remote { reason: format!("no such stack {stack_id}") })
    }

    async fn list_apps(&self, stack_id: &str) -> Result<Vec<App>> {
        self.apps
            .get(stack_id)
            .cloned()
            .ok_or_else(|| FlotillaError::Remote { reason: format!("cannot list apps for {stack_id}") })
    }

    async fn create_deployment(
        &self,
        stack_id: &str,
        app_id: Option<&str>,
        command: &str,
    ) -> Result<Option<String>> {
        if self.no_instances.contains(stack_id) {
            return Ok(None);
        }
        let outcome = self
            .outcomes
            .get(&(stack_id.to_string(), command.to_string()))
            .copied()
            .unwrap_or(CommandOutcome::Succeed);
        let id = format!("dep-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.deployments.lock().unwrap().insert(id.clone(), (outcome, 0));
        self.created.lock().unwrap().push((
            stack_id.to_string(),
            command.to_string(),
            app_id.map(str::to_string),
        ));
        Ok(Some(id))
    }

    async fn deployment_status(&self, deployment_id: &str) -> Result<Option<DeploymentStatus>> {
        let mut deployments = self.deployments.lock().unwrap();
        let Some((outcome, polls)) = deployments.get_mut(deployment_id) else {
            return Ok(None);
        };
        *polls += 1;
        match outcome {
            CommandOutcome::Vanish => Ok(None),
            CommandOutcome::Succeed if *polls > 1 => Ok(Some(DeploymentStatus::Successful)),
            CommandOutcome::Fail if *polls > 1 => Ok(Some(DeploymentStatus::Failed)),
            _ => Ok(Some(DeploymentStatus::Running)),
        }
    }
}

#[derive(Default)]
struct FakeStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    puts: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    fn seed(&self, bucket: &str, key: &str, body: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.as_bytes().to_vec());
    }

    fn put_count(&self, key: &str) -> usize {
        self.puts.lock().unwrap().iter().filter(|(_, k)| k == key).count()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put(&self, location: &StoreLocation, key: &str, body: Vec<u8>) -> Result<()> {
        self.puts.lock().unwrap().push((location.bucket.clone(), key.to_string()));
        self.objects
            .lock()
            .unwrap()
            .insert((location.bucket.clone(), key.to_string()), body);
        Ok(())
    }

    async fn get(&self, location: &StoreLocation, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(location.bucket.clone(), key.to_string()))
            .cloned())
    }
}

struct FakeFingerprints;

#[async_trait]
impl FingerprintSource for FakeFingerprints {
    async fn fingerprint(&self, _path: &Path) -> Result<String> {
        Ok(LOCAL_FINGERPRINT.to_string())
    }
}

fn stack(id: &str, name: &str, source_url: Option<&str>) -> Stack {
    Stack {
        id: id.to_string(),
        name: name.to_string(),
        cookbook_source: source_url.map(|url| CookbookSource {
            kind: "s3".to_string(),
            url: url.to_string(),
        }),
    }
}

fn app(id: &str, name: &str, stack_id: &str) -> App {
    App { id: id.to_string(), name: name.to_string(), stack_id: stack_id.to_string() }
}

struct Harness {
    fleet: Arc<FakeFleet>,
    store: Arc<FakeStore>,
    deployer: Arc<FleetDeployer>,
    orchestrator: Orchestrator,
    _dirs: (tempfile::TempDir, tempfile::TempDir),
}

/// Wire the full pipeline over the fakes, with real cookbook definitions on
/// disk for each `(name, metadata)` pair.
fn harness(fleet: FakeFleet, store: FakeStore, cookbooks: &[(&str, &str)]) -> Harness {
    let cookbook_root = tempfile::tempdir().unwrap();
    for (name, metadata) in cookbooks {
        let dir = cookbook_root.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("metadata.rb"), metadata).unwrap();
    }
    let work = tempfile::tempdir().unwrap();

    let fleet = Arc::new(fleet);
    let store = Arc::new(store);
    let reporter = Arc::new(NullReporter);

    let analyzer = StackAnalyzer::new(
        fleet.clone(),
        store.clone(),
        Arc::new(FakeFingerprints),
        reporter.clone(),
        cookbook_root.path(),
    );
    let builder = CookbookBuilder::new(work.path().join("build"));
    let publisher = ArtifactPublisher::new(store.clone(), reporter.clone());
    let dispatcher = DeploymentDispatcher::new(fleet.clone(), reporter.clone())
        .with_poll_interval(Duration::from_millis(1));

    let deployer = Arc::new(FleetDeployer::new(analyzer, builder, publisher, dispatcher));
    let orchestrator = Orchestrator::new(deployer.clone(), reporter);
    Harness { fleet, store, deployer, orchestrator, _dirs: (cookbook_root, work) }
}

#[tokio::test]
async fn shared_cookbook_is_built_and_published_once() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(
        stack("stack-1", "alpha", Some("s3://artifacts/cookbooks/chef-app.tar.gz")),
        vec![app("app-1", "web", "stack-1")],
    );
    fleet.add_stack(
        stack("stack-2", "beta", Some("s3://artifacts/cookbooks/chef-app.tar.gz")),
        vec![app("app-2", "api", "stack-2")],
    );
    let h = harness(fleet, FakeStore::default(), &[("chef-app", "name 'chef-app'\n")]);

    let report = h.orchestrator.deploy(&["stack-1".into(), "stack-2".into()]).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.succeeded.len(), 2);

    // One artifact referenced by two stacks: exactly one build+publish.
    assert_eq!(h.store.put_count("cookbooks/chef-app.tar.gz"), 1);
    assert_eq!(h.store.put_count("cookbooks/chef-app.fingerprint"), 1);
    let record = h
        .store
        .get(&StoreLocation::new("artifacts"), "cookbooks/chef-app.fingerprint")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record, LOCAL_FINGERPRINT.as_bytes());

    // Both stacks refresh cookbooks before setting up and deploying.
    for stack_id in ["stack-1", "stack-2"] {
        let commands: Vec<String> =
            h.fleet.command_log(stack_id).into_iter().map(|(c, _)| c).collect();
        assert_eq!(commands, vec!["update_custom_cookbooks", "setup", "deploy"]);
    }
}

#[tokio::test]
async fn fresh_cookbook_skips_refresh_and_setup() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(
        stack("stack-1", "alpha", Some("s3://artifacts/cookbooks/chef-app.tar.gz")),
        vec![app("app-1", "web", "stack-1"), app("app-2", "worker", "stack-1")],
    );
    let store = FakeStore::default();
    store.seed("artifacts", "cookbooks/chef-app.fingerprint", LOCAL_FINGERPRINT);
    let h = harness(fleet, store, &[("chef-app", "name 'chef-app'\n")]);

    let report = h.orchestrator.deploy(&["stack-1".into()]).await.unwrap();
    assert!(report.is_success());
    // Nothing stale, nothing republished.
    assert_eq!(h.store.put_count("cookbooks/chef-app.tar.gz"), 0);
    // Apps deploy in declared order, nothing else runs.
    assert_eq!(
        h.fleet.command_log("stack-1"),
        vec![
            ("deploy".to_string(), Some("app-1".to_string())),
            ("deploy".to_string(), Some("app-2".to_string())),
        ]
    );
}

#[tokio::test]
async fn stack_without_cookbook_source_deploys_apps_directly() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(stack("stack-1", "alpha", None), vec![app("app-1", "web", "stack-1")]);
    let h = harness(fleet, FakeStore::default(), &[]);

    let report = h.orchestrator.deploy(&["stack-1".into()]).await.unwrap();
    assert!(report.is_success());
    assert!(h.store.puts.lock().unwrap().is_empty());
    assert_eq!(
        h.fleet.command_log("stack-1"),
        vec![("deploy".to_string(), Some("app-1".to_string()))]
    );
}

#[tokio::test]
async fn no_running_instances_fails_only_that_stack() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(stack("stack-1", "alpha", None), vec![app("app-1", "web", "stack-1")]);
    fleet.add_stack(stack("stack-2", "beta", None), vec![app("app-2", "api", "stack-2")]);
    fleet.no_instances.insert("stack-1".to_string());
    let h = harness(fleet, FakeStore::default(), &[]);

    let report = h.orchestrator.deploy(&["stack-1".into(), "stack-2".into()]).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.succeeded, vec!["beta".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "alpha");
    assert!(matches!(report.failed[0].1, FlotillaError::NoRunningInstances { .. }));
    // The healthy stack still ran its deployment.
    assert_eq!(h.fleet.command_log("stack-2").len(), 1);
}

#[tokio::test]
async fn failed_command_aborts_remaining_commands_for_that_stack() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(
        stack("stack-1", "alpha", Some("s3://artifacts/cookbooks/chef-app.tar.gz")),
        vec![app("app-1", "web", "stack-1")],
    );
    fleet
        .outcomes
        .insert(("stack-1".to_string(), "setup".to_string()), CommandOutcome::Fail);
    let h = harness(fleet, FakeStore::default(), &[("chef-app", "name 'chef-app'\n")]);

    let report = h.orchestrator.deploy(&["stack-1".into()]).await.unwrap();
    assert!(!report.is_success());
    match &report.failed[0].1 {
        FlotillaError::CommandFailed { stack_name, command, deployment_id } => {
            assert_eq!(stack_name, "alpha");
            assert_eq!(command, "setup");
            assert!(!deployment_id.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
    // setup failed, so no deploy command was ever issued.
    let commands: Vec<String> =
        h.fleet.command_log("stack-1").into_iter().map(|(c, _)| c).collect();
    assert_eq!(commands, vec!["update_custom_cookbooks", "setup"]);
}

#[tokio::test]
async fn missing_deployment_record_is_treated_as_failed() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(stack("stack-1", "alpha", None), vec![app("app-1", "web", "stack-1")]);
    fleet
        .outcomes
        .insert(("stack-1".to_string(), "deploy".to_string()), CommandOutcome::Vanish);
    let h = harness(fleet, FakeStore::default(), &[]);

    let report = h.orchestrator.deploy(&["stack-1".into()]).await.unwrap();
    assert!(!report.is_success());
    assert!(matches!(report.failed[0].1, FlotillaError::CommandFailed { .. }));
}

#[tokio::test]
async fn analysis_error_aborts_the_invocation() {
    let h = harness(FakeFleet::default(), FakeStore::default(), &[]);
    let result = h.orchestrator.deploy(&["missing-stack".into()]).await;
    assert!(matches!(result, Err(FlotillaError::Analysis { .. })));
    // No commands dispatched, nothing published.
    assert!(h.fleet.created.lock().unwrap().is_empty());
    assert!(h.store.puts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ambiguous_local_cookbook_is_skipped_but_not_fatal() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(
        stack("stack-1", "alpha", Some("s3://artifacts/cookbooks/chef-app.tar.gz")),
        vec![app("app-1", "web", "stack-1")],
    );
    // Two directories declare the same cookbook name.
    let h = harness(
        fleet,
        FakeStore::default(),
        &[("chef-app", "name 'chef-app'\n"), ("chef-app-fork", "name 'chef-app'\n")],
    );

    let report = h.orchestrator.deploy(&["stack-1".into()]).await.unwrap();
    assert!(report.is_success());
    // Descriptor has no local fingerprint, so nothing is stale and the
    // stack goes straight to its app deployment.
    assert_eq!(h.store.put_count("cookbooks/chef-app.tar.gz"), 0);
    let commands: Vec<String> =
        h.fleet.command_log("stack-1").into_iter().map(|(c, _)| c).collect();
    assert_eq!(commands, vec!["deploy"]);
}

#[tokio::test]
async fn analysis_is_deterministic() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(
        stack("stack-1", "alpha", Some("s3://artifacts/cookbooks/chef-app.tar.gz")),
        vec![app("app-1", "web", "stack-1")],
    );
    let h = harness(fleet, FakeStore::default(), &[("chef-app", "name 'chef-app'\n")]);

    let first = h.deployer.analyze(&["stack-1".into()]).await.unwrap();
    let second = h.deployer.analyze(&["stack-1".into()]).await.unwrap();
    assert_eq!(first.stale_cookbooks, second.stale_cookbooks);
    assert_eq!(first.targets.len(), second.targets.len());
    assert_eq!(
        first.targets[0].cookbook.as_ref().map(|c| c.local_fingerprint.clone()),
        second.targets[0].cookbook.as_ref().map(|c| c.local_fingerprint.clone()),
    );
}

#[tokio::test]
async fn poll_deadline_raises_instead_of_waiting_forever() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(stack("stack-1", "alpha", None), vec![app("app-1", "web", "stack-1")]);
    // A deployment that never leaves Running.
    struct StuckFleet(FakeFleet);
    #[async_trait]
    impl FleetClient for StuckFleet {
        async fn describe_stack(&self, stack_id: &str) -> Result<Stack> {
            self.0.describe_stack(stack_id).await
        }
        async fn list_apps(&self, stack_id: &str) -> Result<Vec<App>> {
            self.0.list_apps(stack_id).await
        }
        async fn create_deployment(
            &self,
            stack_id: &str,
            app_id: Option<&str>,
            command: &str,
        ) -> Result<Option<String>> {
            self.0.create_deployment(stack_id, app_id, command).await
        }
        async fn deployment_status(&self, _id: &str) -> Result<Option<DeploymentStatus>> {
            Ok(Some(DeploymentStatus::Running))
        }
    }

    let fleet = Arc::new(StuckFleet(fleet));
    let dispatcher = DeploymentDispatcher::new(fleet.clone(), Arc::new(NullReporter))
        .with_poll_interval(Duration::from_millis(1))
        .with_deadline(Duration::from_millis(10));

    let target = flotilla_core::DeployTarget {
        stack: stack("stack-1", "alpha", None),
        apps: vec![app("app-1", "web", "stack-1")],
        cookbook: None,
    };
    let err = dispatcher.run(&target, &[]).await.unwrap_err();
    assert!(matches!(err, FlotillaError::DeadlineExceeded { .. }));
}

#[tokio::test]
async fn deploy_command_carries_the_app_id() {
    let mut fleet = FakeFleet::default();
    fleet.add_stack(
        stack("stack-1", "alpha", None),
        vec![app("app-1", "web", "stack-1"), app("app-2", "api", "stack-1")],
    );
    let h = harness(fleet, FakeStore::default(), &[]);

    h.orchestrator.deploy(&["stack-1".into()]).await.unwrap();
    assert_eq!(
        h.fleet.command_log("stack-1"),
        vec![
            ("deploy".to_string(), Some("app-1".to_string())),
            ("deploy".to_string(), Some("app-2".to_string())),
        ]
    );
}

#[test]
fn command_display_names() {
    let command = DeploymentCommand::DeployApp(app("app-1", "web", "stack-1"));
    assert_eq!(command.to_string(), "deploy(web)");
    assert_eq!(DeploymentCommand::RefreshCookbooks.to_string(), "update_custom_cookbooks");
}
