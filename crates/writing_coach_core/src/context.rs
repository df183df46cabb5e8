//! crates/writing_coach_core/src/context.rs
//!
//! Assembles the prompt sent to the completion service for one conversation turn:
//! a single system block (coaching protocol, tone, phase guidance, user context,
//! event) followed by the recent history and the new user message.

use crate::domain::{Event, Message, Personality, Phase, Profile, Role};
use crate::phase::completion_marker;
use crate::ports::{JournalStore, PortResult, PromptMessage};

pub const DEFAULT_HISTORY_LIMIT: usize = 5;

const COACHING_PROTOCOL: &str = r#"You are a writing coach specializing in expressive writing. You guide the user through four phases, one at a time, for a single event in their life:

1. FACTS: a clear, factual description of what happened.
2. FEELINGS: the emotions the event brought up, then and now.
3. ASSOCIATIONS: the thoughts, patterns and behaviours the event connects to.
4. GROWTH: positive reframing, lessons learned and how to move forward.

Your role:
- Stay inside the current phase. Ask one thoughtful question at a time.
- Encourage detailed, specific writing rather than general statements.
- Create a safe, non-judgmental space and let the user lead their own journey.
- Keep responses concise but meaningful.

Phase completion:
- When the user has explored the current phase in enough depth, finish your reply with the completion marker given below, on its own at the very end.
- Never write the marker for any other phase, and never explain the marker to the user."#;

/// The tone paragraph appended to the shared protocol for each style.
pub fn tone_instructions(style: Personality) -> &'static str {
    match style {
        Personality::Professional => {
            "Tone: professional and academic. Use precise, measured language, refer to established reflective-writing practice where it helps, and keep a respectful distance."
        }
        Personality::Empathetic => {
            "Tone: empathetic and supportive. Acknowledge the user's feelings before asking anything, validate their experience, and move gently."
        }
        Personality::Encouraging => {
            "Tone: encouraging and motivational. Highlight the user's effort and progress, point out strengths in what they write, and keep their momentum up."
        }
        Personality::Friendly => {
            "Tone: friendly and casual. Talk like a warm friend would, use plain everyday language and contractions, and keep things light where appropriate."
        }
    }
}

/// What the coach should draw out of the user in each phase.
pub fn phase_guidance(phase: Phase) -> &'static str {
    match phase {
        Phase::Facts => {
            "Help the user describe what happened: who was involved, where and when it took place, and the sequence of events. Keep the focus on observable facts."
        }
        Phase::Feelings => {
            "Help the user name and explore the emotions the event caused, how intense they were, and how those feelings have changed since."
        }
        Phase::Associations => {
            "Help the user connect the event to their thoughts, beliefs, recurring patterns and behaviours, including earlier experiences it reminds them of."
        }
        Phase::Growth => {
            "Help the user reframe the event constructively: what they learned, what strengths they showed, and what they want to carry forward."
        }
    }
}

/// Builds prompts for conversation turns.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    history_limit: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ContextBuilder {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Loads recent history for the profile's owner and composes the prompt.
    /// Only reads from the store.
    pub async fn build(
        &self,
        store: &dyn JournalStore,
        profile: &Profile,
        event: Option<&Event>,
        phase: Phase,
        incoming: &str,
    ) -> PortResult<Vec<PromptMessage>> {
        let history = store
            .recent_messages(
                profile.user_id,
                event.map(|e| e.id),
                phase,
                self.history_limit,
            )
            .await?;
        Ok(self.compose(profile, event, phase, &history, incoming))
    }

    /// Pure prompt composition. `history` must be chronological; only its last
    /// `history_limit` user/assistant turns are kept.
    pub fn compose(
        &self,
        profile: &Profile,
        event: Option<&Event>,
        phase: Phase,
        history: &[Message],
        incoming: &str,
    ) -> Vec<PromptMessage> {
        let turns: Vec<&Message> = history
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let skip = turns.len().saturating_sub(self.history_limit);

        let mut prompt = Vec::with_capacity(self.history_limit + 2);
        prompt.push(PromptMessage::new(
            Role::System,
            system_block(profile, event, phase),
        ));
        prompt.extend(
            turns
                .into_iter()
                .skip(skip)
                .map(|m| PromptMessage::new(m.role, m.content.clone())),
        );
        prompt.push(PromptMessage::new(Role::User, incoming));
        prompt
    }
}

fn system_block(profile: &Profile, event: Option<&Event>, phase: Phase) -> String {
    let mut block = format!(
        "{}\n\n{}\n\nCurrent Phase: {} ({})\n{}\nCompletion marker for this phase: {}",
        COACHING_PROTOCOL,
        tone_instructions(profile.personality_preference),
        phase.description(),
        phase.as_str(),
        phase_guidance(phase),
        completion_marker(phase),
    );

    if let Some(user_context) = user_context(profile) {
        block.push_str("\n\n");
        block.push_str(&user_context);
    }

    if let Some(event) = event {
        block.push_str(&format!("\n\nCurrent Event: {}", event.title));
        if !event.description.trim().is_empty() {
            block.push_str(&format!("\nEvent Description: {}", event.description.trim()));
        }
        block.push_str(&format!("\nEvent Date: {}", event.date_occurred));
    }

    block
}

/// The labelled "User Context" section, or `None` when there is nothing to say.
fn user_context(profile: &Profile) -> Option<String> {
    let bio = non_empty(profile.bio_context.as_deref());
    let goals = non_empty(profile.writing_goals.as_deref());
    if bio.is_none() && goals.is_none() {
        return None;
    }

    let mut section = String::from("User Context:");
    if let Some(bio) = bio {
        section.push_str(&format!("\nBackground: {bio}"));
    }
    if let Some(goals) = goals {
        section.push_str(&format!("\nWriting Goals: {goals}"));
    }
    Some(section)
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}
