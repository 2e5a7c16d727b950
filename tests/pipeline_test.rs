// tests/pipeline_test.rs
use git_autodeploy::config::RunContext;
use git_autodeploy::domain::AutoDeployBranch;
use git_autodeploy::git::mock::{MockOperation, Mutation};
use git_autodeploy::git::MockProvider;
use git_autodeploy::pipeline::{AutoDeployPipeline, CancellationToken, ProfileStatus};
use git_autodeploy::profile::ReleaseProfile;
use git_autodeploy::propagator::PropagateOutcome;
use git_autodeploy::tagger::TaggerState;
use git_autodeploy::variables::VariablesDocument;

const CORE: &str = "gitlab-org/gitlab";
const OMNIBUS: &str = "gitlab-org/omnibus-gitlab";
const CNG: &str = "gitlab-org/build/CNG";
const HELM: &str = "gitlab-org/charts/gitlab";
const DEPLOYER: &str = "gitlab-com/gl-infra/deployer";
const METADATA: &str = "gitlab-org/release/metadata";
const BRANCH: &str = "12-9-auto-deploy-20200226";

fn setup() -> (MockProvider, String) {
    let provider = MockProvider::new();
    let core = provider.set_branch(
        CORE,
        BRANCH,
        &[
            ("GITALY_SERVER_VERSION", "1.83.0\n"),
            ("GITLAB_ELASTICSEARCH_INDEXER_VERSION", "2.0.0\n"),
            ("GITLAB_PAGES_VERSION", "1.14.0\n"),
            ("GITLAB_SHELL_VERSION", "11.0.0\n"),
            ("GITLAB_WORKHORSE_VERSION", "8.19.0\n"),
            (
                "Gemfile.lock",
                "GEM\n  remote: https://rubygems.org/\n  specs:\n    gitlab-mail_room (0.0.3)\n    rake (12.3.3)\n",
            ),
        ],
    );
    provider.set_branch(OMNIBUS, BRANCH, &[("VERSION", "old\n"), ("README.md", "omnibus\n")]);
    provider.set_branch(
        CNG,
        BRANCH,
        &[(
            "ci_files/variables.yml",
            "variables:\n  GITLAB_VERSION: old\nstages:\n  - build\n",
        )],
    );
    provider.set_branch(HELM, BRANCH, &[]);
    provider.set_branch(DEPLOYER, "master", &[]);
    provider.set_branch(METADATA, "master", &[]);

    (provider, core.id)
}

fn branch() -> AutoDeployBranch {
    AutoDeployBranch::parse(BRANCH).unwrap()
}

#[test]
fn test_full_run_commits_and_tags_every_packager() {
    let (provider, core) = setup();
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::default()).with_workers(Some(2));

    let report = pipeline
        .run(&branch(), None, &ReleaseProfile::all(), &CancellationToken::new())
        .unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.commit, core);
    assert_eq!(report.versions.get("gitlab-mail_room"), Some("0.0.3"));
    assert_eq!(report.profiles.len(), 2);

    // Omnibus: one file per component, manifest packages dropped
    assert_eq!(
        provider.file_at(OMNIBUS, BRANCH, "VERSION"),
        Some(format!("{}\n", core))
    );
    assert_eq!(
        provider.file_at(OMNIBUS, BRANCH, "GITALY_SERVER_VERSION"),
        Some("1.83.0\n".to_string())
    );
    assert_eq!(provider.file_at(OMNIBUS, BRANCH, "gitlab-mail_room"), None);
    assert_eq!(provider.commits_on(OMNIBUS).len(), 1);

    // CNG: merged variables, siblings kept
    let variables = provider
        .file_at(CNG, BRANCH, "ci_files/variables.yml")
        .unwrap();
    let document = VariablesDocument::parse(&variables).unwrap();
    assert_eq!(document.get("GITLAB_VERSION"), Some(core.clone()));
    assert_eq!(document.get("GITLAB_REF_SLUG"), Some(core.clone()));
    assert_eq!(document.get("GITLAB_ASSETS_TAG"), Some(core.clone()));
    assert_eq!(document.get("GITALY_VERSION"), Some("v1.83.0".to_string()));
    assert_eq!(document.get("MAILROOM_VERSION"), Some("0.0.3".to_string()));
    assert!(variables.contains("stages"));

    let omnibus = &report.profiles[0];
    assert_eq!(omnibus.profile, "omnibus");
    let outcome = omnibus.tagging.as_ref().unwrap();
    assert_eq!(outcome.state, TaggerState::DependentTagCreated);
    assert!(outcome.metadata_uploaded);

    let cng = &report.profiles[1];
    let cng_outcome = cng.tagging.as_ref().unwrap();
    assert_eq!(cng_outcome.state, TaggerState::DependentTagCreated);

    // Mirror tag on the tracker carries the packager tag name
    let omnibus_tag = outcome.tag.as_ref().unwrap();
    let mirrored = provider.tags(DEPLOYER);
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].name, omnibus_tag.name);

    let cng_tag = cng_outcome.tag.as_ref().unwrap();
    let charts = provider.tags(HELM);
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].name, cng_tag.name);

    // One metadata document per packager
    assert_eq!(provider.commits_on(METADATA).len(), 2);
}

#[test]
fn test_second_run_is_a_no_op() {
    let (provider, _) = setup();
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::default());

    pipeline
        .run(&branch(), None, &ReleaseProfile::all(), &CancellationToken::new())
        .unwrap();
    let after_first = provider.mutations().len();

    let report = pipeline
        .run(&branch(), None, &ReleaseProfile::all(), &CancellationToken::new())
        .unwrap();

    assert!(report.is_success());
    assert_eq!(provider.mutations().len(), after_first);
    for profile in &report.profiles {
        assert_eq!(profile.propagation, Some(PropagateOutcome::Unchanged));
        assert_eq!(profile.tagging.as_ref().unwrap().state, TaggerState::Skipped);
    }
}

#[test]
fn test_dry_run_makes_no_mutations() {
    let (provider, _) = setup();
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::new(true, false));

    let report = pipeline
        .run(&branch(), None, &ReleaseProfile::all(), &CancellationToken::new())
        .unwrap();

    assert!(report.is_success());
    assert!(provider.mutations().is_empty());
    for profile in &report.profiles {
        assert_eq!(profile.propagation, Some(PropagateOutcome::DryRun));
        let outcome = profile.tagging.as_ref().unwrap();
        assert_eq!(outcome.state, TaggerState::PendingTag);
        assert!(outcome.tag.is_some());
        assert!(!outcome.metadata_uploaded);
    }
}

#[test]
fn test_failed_packager_does_not_stop_the_other() {
    let (provider, _) = setup();
    provider.fail_on(CNG, MockOperation::CreateCommit);
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::default());

    let report = pipeline
        .run(&branch(), None, &ReleaseProfile::all(), &CancellationToken::new())
        .unwrap();

    assert!(!report.is_success());
    let failures: Vec<_> = report.failures().map(|p| p.profile).collect();
    assert_eq!(failures, vec!["cng"]);

    let cng = &report.profiles[1];
    assert!(matches!(cng.status, ProfileStatus::Failed(_)));
    assert!(cng.tagging.is_none());
    assert!(provider.tags(CNG).is_empty());
    assert!(provider.tags(HELM).is_empty());

    assert!(report.profiles[0].is_success());
    assert_eq!(provider.tags(OMNIBUS).len(), 1);
}

#[test]
fn test_explicit_commit_is_resolved() {
    let (provider, _) = setup();
    let pinned = "36b70d9ce7c73ca001be48727d35d49813d2cc4f";
    provider.add_commit(
        CORE,
        pinned,
        &[
            ("GITALY_SERVER_VERSION", "1.84.0\n"),
            ("GITLAB_ELASTICSEARCH_INDEXER_VERSION", "2.0.0\n"),
            ("GITLAB_PAGES_VERSION", "1.14.0\n"),
            ("GITLAB_SHELL_VERSION", "11.0.0\n"),
            ("GITLAB_WORKHORSE_VERSION", "8.19.0\n"),
            ("Gemfile.lock", "GEM\n  specs:\n    mail_room (0.10.0)\n"),
        ],
    );
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::new(true, false));

    let report = pipeline
        .run(
            &branch(),
            Some(pinned),
            &[ReleaseProfile::omnibus()],
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.commit, pinned);
    assert_eq!(report.versions.get("GITALY_SERVER_VERSION"), Some("1.84.0"));
    assert_eq!(report.profiles.len(), 1);
}

#[test]
fn test_unresolvable_versions_abort_the_batch() {
    let (provider, _) = setup();
    provider.fail_on(CORE, MockOperation::Read);
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::default());

    let result = pipeline.run(&branch(), None, &ReleaseProfile::all(), &CancellationToken::new());

    assert!(result.is_err());
    assert!(provider.mutations().is_empty());
}

#[test]
fn test_cancelled_before_start() {
    let (provider, _) = setup();
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline
        .run(&branch(), None, &ReleaseProfile::all(), &cancel)
        .unwrap_err();

    assert_eq!(err.status(), "cancelled");
    assert!(provider.mutations().is_empty());
}

#[test]
fn test_mutations_are_recorded_per_project() {
    let (provider, _) = setup();
    let pipeline = AutoDeployPipeline::new(&provider, RunContext::default());

    pipeline
        .run(&branch(), None, &[ReleaseProfile::cng()], &CancellationToken::new())
        .unwrap();

    let cng_tags: Vec<_> = provider
        .mutations()
        .into_iter()
        .filter(|m| matches!(m, Mutation::Tag { project, .. } if project == CNG))
        .collect();
    assert_eq!(cng_tags.len(), 1);
    assert_eq!(provider.tags(HELM).len(), 1);
    assert!(provider.tags(DEPLOYER).is_empty());
    assert!(provider.commits_on(OMNIBUS).is_empty());
}
