//! Scripted probe shared by the runner and orchestrator tests

use std::collections::HashMap;
use std::time::Duration;

use super::probe::SiteProbe;
use super::types::CheckOutcome;
use crate::config::SiteConfig;

#[derive(Clone)]
enum Script {
    Up(Duration),
    Down(String, Duration),
    Panic,
}

/// Answers by site name; unknown sites are reported down
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    scripts: HashMap<String, Script>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn up(self, name: &str) -> Self {
        self.up_after(name, Duration::ZERO)
    }

    pub fn up_after(mut self, name: &str, delay: Duration) -> Self {
        self.scripts.insert(name.to_string(), Script::Up(delay));
        self
    }

    pub fn down(self, name: &str, message: &str) -> Self {
        self.down_after(name, message, Duration::ZERO)
    }

    pub fn down_after(mut self, name: &str, message: &str, delay: Duration) -> Self {
        self.scripts.insert(name.to_string(), Script::Down(message.to_string(), delay));
        self
    }

    pub fn panics(mut self, name: &str) -> Self {
        self.scripts.insert(name.to_string(), Script::Panic);
        self
    }
}

#[async_trait::async_trait]
impl SiteProbe for ScriptedProbe {
    async fn probe(&self, site: &SiteConfig) -> CheckOutcome {
        match self.scripts.get(&site.name).cloned() {
            Some(Script::Up(delay)) => {
                tokio::time::sleep(delay).await;
                CheckOutcome::success(200, delay.as_millis() as u64)
            }
            Some(Script::Down(message, delay)) => {
                tokio::time::sleep(delay).await;
                CheckOutcome::failure(message)
            }
            Some(Script::Panic) => panic!("scripted probe panic for {}", site.name),
            None => CheckOutcome::failure("no script"),
        }
    }
}
