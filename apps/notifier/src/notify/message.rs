use crate::config::Templates;
use crate::monitoring::CompletedCheck;

/// Subjects are cut to this many characters
pub const MAX_SUBJECT_LEN: usize = 100;

/// Which template prefix heads the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Title {
    DowntimeDetected,
    StateChanged,
}

impl Title {
    /// Any site currently down wins over recoveries
    pub fn select(checks: &[CompletedCheck]) -> Self {
        if checks.iter().any(CompletedCheck::exceptional) {
            Title::DowntimeDetected
        } else {
            Title::StateChanged
        }
    }

    pub fn prefix<'a>(&self, templates: &'a Templates) -> &'a str {
        match self {
            Title::DowntimeDetected => templates.downtime_detected_prefix.as_str(),
            Title::StateChanged => templates.state_changed_prefix.as_str(),
        }
    }
}

/// The aggregated message for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: Title,
    pub subject: String,
    pub body: String,
}

/// Cut `subject` to at most `max` characters, never splitting a character
pub fn truncate_subject(subject: &str, max: usize) -> String {
    match subject.char_indices().nth(max) {
        Some((end, _)) => subject[..end].to_string(),
        None => subject.to_string(),
    }
}

impl Notification {
    /// Build the message for the flagged `checks`, which must already be in
    /// configuration order. Nothing is built for an empty list.
    pub fn compose(checks: &[CompletedCheck], templates: &Templates) -> Option<Self> {
        if checks.is_empty() {
            return None;
        }

        let title = Title::select(checks);
        let names: Vec<&str> = checks.iter().map(|c| c.name.as_str()).collect();
        let subject = format!("{} {}", title.prefix(templates), names.join(", "));

        let paragraphs: Vec<String> = checks
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}) {} ({}): {}", i, c.name, c.url, c.message()))
            .collect();
        let body = format!("{},\n\n{}", templates.greeting, paragraphs.join("\n\n"));

        Some(Self { title, subject: truncate_subject(&subject, MAX_SUBJECT_LEN), body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::CheckOutcome;

    fn check(index: usize, name: &str, outcome: CheckOutcome) -> CompletedCheck {
        CompletedCheck {
            index,
            name: name.to_string(),
            url: format!("https://{name}.example.com"),
            outcome,
        }
    }

    #[test]
    fn test_nothing_flagged_builds_nothing() {
        assert!(Notification::compose(&[], &Templates::default()).is_none());
    }

    #[test]
    fn test_downtime_title_wins_over_recovery() {
        let checks = [
            check(0, "a", CheckOutcome::failure("HTTP 500")),
            check(1, "b", CheckOutcome::success(200, 3)),
        ];
        assert_eq!(Title::select(&checks), Title::DowntimeDetected);

        let note = Notification::compose(&checks, &Templates::default()).unwrap();
        assert_eq!(note.subject, "Downtime detected: a, b");
    }

    #[test]
    fn test_recoveries_only_use_state_changed_title() {
        let checks = [check(0, "b", CheckOutcome::success(200, 3))];
        let note = Notification::compose(&checks, &Templates::default()).unwrap();

        assert_eq!(note.title, Title::StateChanged);
        assert_eq!(note.subject, "State changed: b");
    }

    #[test]
    fn test_body_layout() {
        let templates = Templates { greeting: "Hi team".into(), ..Templates::default() };
        let checks = [
            check(0, "api", CheckOutcome::failure("HTTP 503")),
            check(2, "web", CheckOutcome::failure("timeout")),
        ];
        let note = Notification::compose(&checks, &templates).unwrap();

        assert_eq!(
            note.body,
            "Hi team,\n\n\
             0) api (https://api.example.com): HTTP 503\n\n\
             1) web (https://web.example.com): timeout"
        );
    }

    #[test]
    fn test_subject_truncation() {
        let long = "x".repeat(250);
        assert_eq!(truncate_subject(&long, MAX_SUBJECT_LEN).chars().count(), 100);

        let short = "y".repeat(50);
        assert_eq!(truncate_subject(&short, MAX_SUBJECT_LEN), short);

        let exact = "z".repeat(100);
        assert_eq!(truncate_subject(&exact, MAX_SUBJECT_LEN), exact);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let subject = "é".repeat(120);
        let cut = truncate_subject(&subject, MAX_SUBJECT_LEN);
        assert_eq!(cut.chars().count(), 100);
        assert_eq!(cut.len(), 200);
    }

    #[test]
    fn test_long_site_list_subject_is_capped() {
        let checks: Vec<_> = (0..30)
            .map(|i| check(i, &format!("service-{i}"), CheckOutcome::failure("timeout")))
            .collect();
        let note = Notification::compose(&checks, &Templates::default()).unwrap();

        assert_eq!(note.subject.chars().count(), MAX_SUBJECT_LEN);
        assert!(note.subject.starts_with("Downtime detected: service-0, service-1"));
        assert!(note.body.contains("29) service-29"));
    }
}
