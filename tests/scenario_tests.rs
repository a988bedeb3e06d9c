//! Integration tests for scenario replay
//!
//! Scenarios are written to temporary files, loaded and replayed against a
//! running main loop on a paused clock.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use popup_stack::scenario::{Action, Scenario, ScenarioRunner, Step, StepReport};
use popup_stack::{ManagerId, NoopFocus, PopupContext, PopupId, StackConfig};

const SCENARIO: &str = r#"
[[step]]
action = "show"
id = "a"
anchor = "top"

[[step]]
action = "show"
id = "b"
stack = true

[[step]]
action = "wait"
wait_ms = 500

[[step]]
action = "show"
id = "b"
stack = true

[[step]]
action = "register"
id = "modal"

[[step]]
action = "show"
id = "c"
anchor = "bottom"

[[step]]
action = "pop"

[[step]]
action = "wait"
wait_ms = 500

[[step]]
action = "dismiss_all"
"#;

fn write_scenario(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

async fn replay(config: &StackConfig, scenario: &Scenario) -> Result<Vec<StepReport>> {
    let (context, main_loop) = PopupContext::new(config, Arc::new(NoopFocus));
    tokio::spawn(main_loop.run());
    ScenarioRunner::new(context).run(scenario).await
}

fn names(ids: &[PopupId]) -> Vec<&str> {
    ids.iter().map(PopupId::as_str).collect()
}

#[tokio::test(start_paused = true)]
async fn test_replay_from_file() -> Result<()> {
    let file = write_scenario(SCENARIO)?;
    let scenario = Scenario::load(file.path())?;
    let reports = replay(&StackConfig::default(), &scenario).await?;

    assert_eq!(reports.len(), 9);

    assert!(reports[0].changed);
    assert_eq!(names(&reports[0].top), vec!["a"]);

    // Second show lands inside the cooldown and is dropped
    assert!(!reports[1].changed);
    assert!(reports[1].centre.is_empty());

    assert!(reports[3].changed);
    assert_eq!(names(&reports[3].centre), vec!["b"]);

    assert_eq!(reports[4].manager, ManagerId::new("modal"));
    assert_eq!(reports[4].note.as_deref(), Some("registered modal"));

    // Shown on the freshly activated manager, which has its own guard
    assert_eq!(reports[5].manager, ManagerId::new("modal"));
    assert!(reports[5].changed);
    assert_eq!(names(&reports[5].bottom), vec!["c"]);

    assert!(reports[6].manager.is_root());
    assert_eq!(reports[6].note.as_deref(), Some("popped modal"));
    assert_eq!(names(&reports[6].top), vec!["a"]);
    assert_eq!(names(&reports[6].centre), vec!["b"]);

    assert!(reports[8].changed);
    assert!(reports[8].top.is_empty() && reports[8].centre.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_zero_cooldown_applies_every_step() -> Result<()> {
    let mut config = StackConfig::default();
    config.engine.cooldown_ms = 0;

    let mut first = Step::new(Action::Show);
    first.id = Some("a".into());
    let mut second = Step::new(Action::Show);
    second.id = Some("b".into());
    second.stack = true;
    let scenario = Scenario {
        steps: vec![first, second, Step::new(Action::DismissLast)],
    };

    let reports = replay(&config, &scenario).await?;
    assert!(reports.iter().all(|r| r.changed));
    assert_eq!(names(&reports[1].centre), vec!["a", "b"]);
    assert_eq!(names(&reports[2].centre), vec!["a"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_auto_dismiss_in_scenario() -> Result<()> {
    let scenario = Scenario::from_toml(
        r#"
        [[step]]
        action = "show"
        id = "toast"
        anchor = "top"
        auto_dismiss_ms = 1000

        [[step]]
        action = "wait"
        wait_ms = 1500
        "#,
    )?;

    let reports = replay(&StackConfig::default(), &scenario).await?;
    assert_eq!(names(&reports[0].top), vec!["toast"]);
    assert!(reports[1].changed);
    assert!(reports[1].top.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_registry_steps_report_notes() -> Result<()> {
    let scenario = Scenario::from_toml(
        r#"
        [[step]]
        action = "register"
        id = "popup-stack.root"

        [[step]]
        action = "unregister"
        manager = "popup-stack.root"

        [[step]]
        action = "activate"
        manager = "nowhere"

        [[step]]
        action = "pop"

        [[step]]
        action = "dismiss_last"
        manager = "nowhere"
        "#,
    )?;

    let reports = replay(&StackConfig::default(), &scenario).await?;
    assert!(reports.iter().all(|r| r.manager.is_root()));
    assert!(reports[0].note.as_deref().unwrap_or_default().contains("reserved"));
    assert!(reports[1].note.is_some());
    assert!(reports[2].note.as_deref().unwrap_or_default().contains("nowhere"));
    assert_eq!(reports[3].note.as_deref(), Some("only root left"));
    assert!(reports[4].note.as_deref().unwrap_or_default().contains("nowhere"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_show_without_id_fails() -> Result<()> {
    let scenario = Scenario {
        steps: vec![Step::new(Action::Show)],
    };

    let error = replay(&StackConfig::default(), &scenario).await.unwrap_err();
    assert!(format!("{:#}", error).contains("Scenario step 0 (show)"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_closed_main_loop_is_reported() -> Result<()> {
    let (context, main_loop) = PopupContext::new(&StackConfig::default(), Arc::new(NoopFocus));
    drop(main_loop);

    let mut show = Step::new(Action::Show);
    show.id = Some("a".into());
    let scenario = Scenario {
        steps: vec![show, Step::new(Action::DismissAll)],
    };

    let reports = ScenarioRunner::new(context).run(&scenario).await?;
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!(report.manager.is_root());
        assert!(!report.changed);
        assert_eq!(report.note.as_deref(), Some("popup main loop has shut down"));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unknown_manager_is_reported() -> Result<()> {
    let mut show = Step::new(Action::Show);
    show.id = Some("a".into());
    show.manager = Some("ghost".into());
    let scenario = Scenario { steps: vec![show] };

    let reports = replay(&StackConfig::default(), &scenario).await?;
    assert_eq!(
        reports[0].note.as_deref(),
        Some("no popup manager registered under id `ghost`")
    );
    Ok(())
}

#[test]
fn test_load_missing_file() {
    let result = Scenario::load("/nonexistent/scenario.toml");
    assert!(result.is_err());
}
