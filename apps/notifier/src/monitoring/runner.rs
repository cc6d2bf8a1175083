use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::checker::{Checker, CompletedCheck};
use super::probe::SiteProbe;
use crate::config::SiteConfig;

/// Fans out one [`Checker`] per site and waits for all of them.
///
/// There is no runner-level deadline: each probe's own timeout is the only
/// bound on a check.
pub struct ConcurrentRunner {
    probe: Arc<dyn SiteProbe>,
}

impl ConcurrentRunner {
    pub fn new(probe: Arc<dyn SiteProbe>) -> Self {
        Self { probe }
    }

    /// Check every site concurrently.
    ///
    /// Results come back in configuration order regardless of completion
    /// order. A checker that dies fails the whole run, but only after every
    /// other checker has finished.
    pub async fn run(&self, sites: &[SiteConfig]) -> Result<Vec<CompletedCheck>> {
        let checkers: Vec<Checker> = sites
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, site)| Checker::start(index, site, Arc::clone(&self.probe)))
            .collect();

        info!("Started {} checks", checkers.len());
        for checker in &checkers {
            debug!("Waiting on {}", checker.name());
        }

        let mut completed = join_all(checkers.into_iter().map(Checker::join))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        completed.sort_by_key(|check| check.index);
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::testing::ScriptedProbe;
    use std::time::{Duration, Instant};

    fn sites(names: &[&str]) -> Vec<SiteConfig> {
        names
            .iter()
            .map(|name| SiteConfig::new(*name, format!("https://{name}.example.com")))
            .collect()
    }

    #[tokio::test]
    async fn test_results_keep_configuration_order() {
        // First site finishes last
        let probe = ScriptedProbe::new()
            .down_after("a", "HTTP 500", Duration::from_millis(300))
            .up_after("b", Duration::from_millis(100))
            .up_after("c", Duration::from_millis(0));

        let runner = ConcurrentRunner::new(Arc::new(probe));
        let results = runner.run(&sites(&["a", "b", "c"])).await.unwrap();

        let names: Vec<_> = results.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let indexes: Vec<_> = results.iter().map(|c| c.index).collect();
        assert_eq!(indexes, [0, 1, 2]);
        assert!(results[0].exceptional());
        assert_eq!(results[0].message(), "HTTP 500");
        assert_eq!(results[0].url, "https://a.example.com");
        assert!(!results[1].exceptional());
    }

    #[tokio::test]
    async fn test_checks_run_concurrently() {
        let names = ["s1", "s2", "s3", "s4", "s5"];
        let probe = names
            .iter()
            .fold(ScriptedProbe::new(), |p, n| p.up_after(n, Duration::from_millis(300)));

        let runner = ConcurrentRunner::new(Arc::new(probe));
        let start = Instant::now();
        let results = runner.run(&sites(&names)).await.unwrap();

        assert_eq!(results.len(), 5);
        assert!(start.elapsed() < Duration::from_millis(1200), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_empty_site_list() {
        let runner = ConcurrentRunner::new(Arc::new(ScriptedProbe::new()));
        assert!(runner.run(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_checker_fails_run() {
        let probe = ScriptedProbe::new().up("ok").panics("boom");

        let runner = ConcurrentRunner::new(Arc::new(probe));
        let err = runner.run(&sites(&["ok", "boom"])).await.unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }
}
