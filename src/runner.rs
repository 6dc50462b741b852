//! Task runner
//!
//! Steps run strictly in declaration order; within a step, hosts fan out
//! across a rayon pool bounded by the step's limit. A host that fails is
//! logged and counted, never allowed to abort its siblings or the
//! remaining steps.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::actions;
use crate::error::{Error, Result};
use crate::manifest::{Herd, Host, Step};

/// Tally of one task run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSummary {
    /// Host executions attempted (hosts x steps that selected them)
    pub hosts: usize,
    /// Executions that changed remote state
    pub changed: usize,
    /// Executions that failed
    pub failed: usize,
}

/// Run every step of a task across its resolved hosts.
pub fn run_task(herd: &Herd, task: &str) -> Result<TaskSummary> {
    let steps = herd.steps_for_task(task)?;

    log::info!("===> Task: {task}");

    let mut summary = TaskSummary::default();

    for (i, step) in steps.iter().enumerate() {
        log::info!("===> Step [{:02}/{:02}]: {}", i + 1, steps.len(), step.name);

        // Hosts are discovered and bound to live drivers before any
        // worker starts, so the parallel section below never touches
        // the registries.
        let hosts = herd.hosts_for_step(step)?;
        summary.hosts += hosts.len();

        let changed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(step.effective_limit())
            .build()
            .map_err(|e| Error::driver("step runner", e))?;

        pool.install(|| {
            hosts.par_iter().for_each(|host| match run_step(herd, host, step) {
                Ok(true) => {
                    changed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => {}
                Err(e) => {
                    log::error!("[{}] {e}", host.name);
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            });
        });

        summary.changed += changed.into_inner();
        summary.failed += failed.into_inner();
    }

    Ok(summary)
}

/// Run one step on one host, chasing its notifier when state changed.
fn run_step(herd: &Herd, host: &Host, step: &Step) -> Result<bool> {
    log::debug!(
        "attempting to connect to {} via {}",
        host.name,
        host.connection_type
    );
    host.connection.connect()?;

    let changed = actions::dispatch(host.connection.as_ref(), step)?;

    if changed {
        if let Some(notify) = &step.notify {
            let notifier = herd.notifier(notify)?;
            log::info!("[{}] notify: {}", host.name, notifier.name);
            actions::dispatch(host.connection.as_ref(), notifier)?;
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn herd(text: &str) -> Herd {
        let manifest = Manifest::parse_str(text, "/tmp").unwrap();
        Herd::from_manifests(vec![manifest]).unwrap()
    }

    #[test]
    fn exec_against_local_counts_a_change() {
        let h = herd(
            r#"
task::ping:
  steps:
    - name: ping
      action: exec cmd=true
      targets: [local]
"#,
        );

        let summary = run_task(&h, "ping").unwrap();
        assert_eq!(summary.hosts, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn failing_host_is_counted_not_fatal() {
        let h = herd(
            r#"
task::broken:
  steps:
    - name: fail
      action: exec cmd=false
      targets: [local]
    - name: recover
      action: exec cmd=true
      targets: [local]
"#,
        );

        let summary = run_task(&h, "broken").unwrap();
        assert_eq!(summary.hosts, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.changed, 1);
    }

    #[test]
    fn unless_guard_reports_no_change() {
        let h = herd(
            r#"
task::guarded:
  steps:
    - name: noop
      action: exec cmd="echo hi" unless=true
      targets: [local]
"#,
        );

        let summary = run_task(&h, "guarded").unwrap();
        assert_eq!(summary.changed, 0);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn notify_runs_after_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("notified");

        let text = format!(
            r#"
notifiers:
  - name: leave marker
    action: exec cmd="touch {marker}"

task::change:
  steps:
    - name: change something
      action: exec cmd=true
      targets: [local]
      notify: leave marker
"#,
            marker = marker.display()
        );

        let summary = run_task(&herd(&text), "change").unwrap();
        assert_eq!(summary.changed, 1);
        assert!(marker.exists());
    }

    #[test]
    fn unknown_task_is_an_error() {
        let h = herd("task::x:\n  steps: []\n");
        assert!(run_task(&h, "y").is_err());
    }
}
