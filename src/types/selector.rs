use super::Labels;
use serde::{Deserialize, Serialize};

/// Where a resource definition matching rule applies. Empty fields match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment_type: String,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub environment_labels: Labels,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub resource_labels: Labels,
}

/// Facts a selector is evaluated against.
#[derive(Clone, Debug, Default)]
pub struct SelectorTarget<'a> {
    pub project_name: &'a str,
    pub environment_name: &'a str,
    pub environment_type: &'a str,
    pub environment_labels: Option<&'a Labels>,
    pub resource_labels: Option<&'a Labels>,
}

fn field_matches(want: &str, got: &str) -> bool {
    want.is_empty() || want == got
}

fn labels_match(want: &Labels, got: Option<&Labels>) -> bool {
    if want.is_empty() {
        return true;
    }
    let Some(got) = got else {
        return false;
    };
    want.iter().all(|(k, v)| got.get(k) == Some(v))
}

impl Selector {
    pub fn matches(&self, t: &SelectorTarget<'_>) -> bool {
        field_matches(&self.project_name, t.project_name)
            && field_matches(&self.environment_name, t.environment_name)
            && field_matches(&self.environment_type, t.environment_type)
            && labels_match(&self.environment_labels, t.environment_labels)
            && labels_match(&self.resource_labels, t.resource_labels)
    }

    /// Number of constrained fields; more specific selectors win ties.
    pub fn specificity(&self) -> usize {
        [
            &self.project_name,
            &self.environment_name,
            &self.environment_type,
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .count()
            + self.environment_labels.len()
            + self.resource_labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selector_matches_everything() {
        assert!(Selector::default().matches(&SelectorTarget::default()));
    }

    #[test]
    fn labels_must_all_match() {
        let mut want = Labels::new();
        want.insert("tier".into(), "db".into());
        let sel = Selector {
            environment_type: "production".into(),
            environment_labels: want.clone(),
            ..Default::default()
        };
        let mut got = want.clone();
        got.insert("team".into(), "a".into());
        let target = SelectorTarget {
            environment_type: "production",
            environment_labels: Some(&got),
            ..Default::default()
        };
        assert!(sel.matches(&target));
        assert_eq!(sel.specificity(), 2);

        let staging = SelectorTarget {
            environment_type: "staging",
            ..target.clone()
        };
        assert!(!sel.matches(&staging));
        let unlabeled = SelectorTarget {
            environment_labels: None,
            ..target
        };
        assert!(!sel.matches(&unlabeled));
    }
}
