use serde::{Deserialize, Serialize};

pub const PLAN_STEP_PREFIX: &str = "Plan step";
pub const OBSERVATION_PREFIX: &str = "API response:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub plan_step: String,
    pub observation: String,
}

/// Append-only (plan step, observation) pairs, one per executed iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, plan_step: impl Into<String>, observation: impl Into<String>) {
        self.entries.push(HistoryEntry {
            plan_step: plan_step.into(),
            observation: observation.into(),
        });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the planner scratchpad. The planner prompt already ends in `Plan step 1: `, so
    /// the first line omits its prefix and the scratchpad ends with the next step's prefix.
    pub fn render_scratchpad(&self) -> String {
        let mut scratchpad = String::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                scratchpad.push_str(&format!("{PLAN_STEP_PREFIX} {}: ", index + 1));
            }
            scratchpad.push_str(&entry.plan_step);
            scratchpad.push('\n');
            scratchpad.push_str(OBSERVATION_PREFIX);
            scratchpad.push(' ');
            scratchpad.push_str(&entry.observation);
            scratchpad.push('\n');
        }
        if !self.entries.is_empty() {
            scratchpad.push_str(&format!("{PLAN_STEP_PREFIX} {}: ", self.entries.len() + 1));
        }
        scratchpad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_renders_empty_scratchpad() {
        assert_eq!(History::new().render_scratchpad(), "");
    }

    #[test]
    fn scratchpad_numbers_steps_and_prompts_for_the_next_one() {
        let mut history = History::new();
        history.push("Get the current user.", "Identified the user.");
        history.push("List P0 issues.", "Unsuccessful attempt, cause: timeout!");

        assert_eq!(
            history.render_scratchpad(),
            "Get the current user.\n\
             API response: Identified the user.\n\
             Plan step 2: List P0 issues.\n\
             API response: Unsuccessful attempt, cause: timeout!\n\
             Plan step 3: "
        );
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.last().map(|entry| entry.plan_step.as_str()),
            Some("List P0 issues.")
        );
    }
}
