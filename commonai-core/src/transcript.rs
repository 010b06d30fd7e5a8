//! Transcript reconciliation.
//!
//! Backends built around a session object (on-device models, local runtimes)
//! want a conversation as an instructions block, an ordered list of
//! prompt/response entries, and one current prompt to answer. This module
//! derives that shape from an ordered list of role-tagged [`Content`] turns.

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Content, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Prompt(String),
    Response(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// System turns merged into one block, absent when there were none.
    pub instructions: Option<String>,
    pub entries: Vec<TranscriptEntry>,
}

/// A reconciled conversation ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub transcript: Transcript,
    /// The trailing user turn the backend should answer.
    pub prompt: String,
}

impl Transcript {
    /// Reconciles `contents` into a transcript plus the current prompt.
    ///
    /// Consecutive user turns fold the earlier one into the transcript as an
    /// unanswered prompt. A model turn with no pending prompt is dropped.
    /// Fails with [`Error::MissingPrompt`] unless the conversation ends on a
    /// user turn.
    pub fn reconcile(contents: &[Content]) -> Result<PromptContext> {
        let (system, conversation): (Vec<&Content>, Vec<&Content>) = contents
            .iter()
            .partition(|content| content.role == Role::System);

        let mut transcript = Transcript {
            instructions: merge_instructions(&system),
            entries: Vec::new(),
        };

        let mut pending: Option<String> = None;

        for turn in conversation {
            match turn.role {
                Role::User => {
                    if let Some(carried) = pending.replace(turn.text()) {
                        transcript.entries.push(TranscriptEntry::Prompt(carried));
                    }
                }
                Role::Model => match pending.take() {
                    Some(prompt) => {
                        transcript.entries.push(TranscriptEntry::Prompt(prompt));
                        transcript.entries.push(TranscriptEntry::Response(turn.text()));
                    }
                    None => debug!("Dropping model turn without a preceding prompt"),
                },
                // Partitioned out above.
                Role::System => {}
            }
        }

        let prompt = pending.ok_or(Error::MissingPrompt)?;

        Ok(PromptContext { transcript, prompt })
    }

    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.instructions.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }
}

impl PromptContext {
    /// Flattens the context into role-tagged turns for backends whose wire
    /// format is a plain message list: instructions first, then the entries,
    /// then the current prompt.
    pub fn to_turns(&self) -> Vec<(Role, &str)> {
        let mut turns = Vec::with_capacity(self.transcript.len() + 1);

        if let Some(instructions) = &self.transcript.instructions {
            turns.push((Role::System, instructions.as_str()));
        }

        for entry in self.transcript.iter() {
            match entry {
                TranscriptEntry::Prompt(text) => turns.push((Role::User, text.as_str())),
                TranscriptEntry::Response(text) => turns.push((Role::Model, text.as_str())),
            }
        }

        turns.push((Role::User, self.prompt.as_str()));
        turns
    }
}

fn merge_instructions(system: &[&Content]) -> Option<String> {
    let text = system
        .iter()
        .map(|content| content.text())
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_paired_history() {
        let contents = vec![
            Content::system("Be terse."),
            Content::user("Hello."),
            Content::model("Hi there!"),
            Content::user("Give three points."),
        ];

        let context = Transcript::reconcile(&contents).unwrap();

        assert_eq!(context.transcript.instructions.as_deref(), Some("Be terse."));
        assert_eq!(
            context.transcript.entries,
            vec![
                TranscriptEntry::Prompt("Hello.".into()),
                TranscriptEntry::Response("Hi there!".into()),
            ]
        );
        assert_eq!(context.transcript.len(), 3);
        assert_eq!(context.prompt, "Give three points.");
    }

    #[test]
    fn test_requires_trailing_user_turn() {
        let contents = vec![Content::user("Explain X"), Content::model("X is Y")];

        let err = Transcript::reconcile(&contents).unwrap_err();
        assert!(matches!(err, Error::MissingPrompt));
    }

    #[test]
    fn test_empty_input_is_missing_prompt() {
        assert!(matches!(
            Transcript::reconcile(&[]),
            Err(Error::MissingPrompt)
        ));
    }

    #[test]
    fn test_only_system_turns_is_missing_prompt() {
        let contents = vec![Content::system("Rules.")];
        assert!(matches!(
            Transcript::reconcile(&contents),
            Err(Error::MissingPrompt)
        ));
    }

    #[test]
    fn test_consecutive_user_turns_fold_into_history() {
        let contents = vec![Content::user("A"), Content::user("B")];

        let context = Transcript::reconcile(&contents).unwrap();

        assert_eq!(context.transcript.instructions, None);
        assert_eq!(
            context.transcript.entries,
            vec![TranscriptEntry::Prompt("A".into())]
        );
        assert_eq!(context.prompt, "B");
    }

    #[test]
    fn test_orphan_model_turn_is_dropped() {
        let contents = vec![
            Content::model("unprompted"),
            Content::user("Q"),
            Content::model("A"),
            Content::model("extra"),
            Content::user("next"),
        ];

        let context = Transcript::reconcile(&contents).unwrap();

        assert_eq!(
            context.transcript.entries,
            vec![
                TranscriptEntry::Prompt("Q".into()),
                TranscriptEntry::Response("A".into()),
            ]
        );
        assert_eq!(context.prompt, "next");
    }

    #[test]
    fn test_instructions_join_non_blank_system_turns_in_order() {
        let contents = vec![
            Content::system("First."),
            Content::user("Hi"),
            Content::system("   "),
            Content::system("Second."),
        ];

        let context = Transcript::reconcile(&contents).unwrap();

        assert_eq!(
            context.transcript.instructions.as_deref(),
            Some("First.\nSecond.")
        );
        assert!(context.transcript.entries.is_empty());
        assert_eq!(context.prompt, "Hi");
    }

    #[test]
    fn test_single_user_turn_round_trips() {
        for text in ["", "plain", "multi\nline"] {
            let context = Transcript::reconcile(&[Content::user(text)]).unwrap();
            assert!(context.transcript.is_empty());
            assert_eq!(context.prompt, text);
        }
    }

    #[test]
    fn test_to_turns_orders_roles() {
        let contents = vec![
            Content::system("S"),
            Content::user("U1"),
            Content::model("M1"),
            Content::user("U2"),
        ];

        let context = Transcript::reconcile(&contents).unwrap();

        assert_eq!(
            context.to_turns(),
            vec![
                (Role::System, "S"),
                (Role::User, "U1"),
                (Role::Model, "M1"),
                (Role::User, "U2"),
            ]
        );
    }
}
