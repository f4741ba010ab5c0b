use std::sync::Arc;

use crate::dictionary::TermFrequencyMap;
use crate::errors::Result;
use crate::parser_state::ParserState;
use crate::sentence::Sentence;
use crate::task_context::TaskContext;
use crate::transition_system::{ParserAction, TransitionState, TransitionSystem};

/// Name of the task input holding the tag vocabulary
const TAG_MAP_INPUT: &str = "tag-map";

/// Tag assignments of one tagging hypothesis
#[derive(Debug, Clone)]
pub struct TaggerTransitionState {
    /// Predicted tag id per token, -1 until assigned
    tag: Vec<i32>,
    /// Gold tag id per token, -1 if unknown
    gold_tag: Vec<i32>,
    /// Tag vocabulary
    tag_map: Arc<TermFrequencyMap>,
}

impl TaggerTransitionState {
    pub fn new(tag_map: Arc<TermFrequencyMap>) -> Self {
        Self {
            tag: Vec::new(),
            gold_tag: Vec::new(),
            tag_map,
        }
    }

    /// Predicted tag of the token at `index`, -1 if unassigned or outside
    pub fn tag(&self, index: i32) -> i32 {
        if index < 0 {
            return -1;
        }
        self.tag.get(index as usize).copied().unwrap_or(-1)
    }

    /// Assign the tag of the token at `index`; ignored outside the sentence
    pub fn set_tag(&mut self, index: i32, tag: i32) {
        if index < 0 {
            return;
        }
        if let Some(slot) = self.tag.get_mut(index as usize) {
            *slot = tag;
        }
    }

    /// Gold tag of the token at `index`, -1 if unknown or outside
    pub fn gold_tag(&self, index: i32) -> i32 {
        if index < 0 {
            return -1;
        }
        self.gold_tag.get(index as usize).copied().unwrap_or(-1)
    }

    /// The tag string for a tag id, empty if the id is not in the vocabulary
    pub fn tag_as_string(&self, tag: i32) -> &str {
        self.tag_map.term(tag).unwrap_or("")
    }

    /// The tag vocabulary
    pub fn tag_map(&self) -> &TermFrequencyMap {
        &self.tag_map
    }
}

impl TransitionState for TaggerTransitionState {
    fn init(&mut self, sentence: &Sentence) {
        self.tag = vec![-1; sentence.len()];
        self.gold_tag = sentence
            .tokens
            .iter()
            .map(|token| self.tag_map.lookup_index(&token.tag, -1))
            .collect();
    }

    fn is_token_correct(&self, _state: &ParserState<Self>, index: i32) -> bool {
        TaggerTransitionState::gold_tag(self, index) == TaggerTransitionState::tag(self, index)
    }

    fn add_annotations_to_output(&self, _state: &ParserState<Self>, sentence: &mut Sentence) {
        for (i, token) in sentence.tokens.iter_mut().enumerate().take(self.tag.len()) {
            token.tag = self.tag_as_string(self.tag[i]).to_string();
        }
    }

    fn describe(&self, state: &ParserState<Self>) -> String {
        let word = |index: i32| state.token(index).map_or("", |t| t.word.as_str());
        let mut parts = Vec::new();
        // Stack from bottom to top
        for position in (0..state.stack_size()).rev() {
            let index = state.stack(position);
            let tag = TaggerTransitionState::tag(self, index);
            parts.push(format!("{}[{}]", word(index), self.tag_as_string(tag)));
        }
        for index in state.next()..state.num_tokens() {
            parts.push(word(index).to_string());
        }
        parts.join(" ")
    }

    fn tag(&self, index: i32) -> i32 {
        TaggerTransitionState::tag(self, index)
    }
}

/// Part-of-speech tagging as a transition system
///
/// The only move is SHIFT(t): assign tag `t` to the next input token and
/// move it onto the stack. A sentence of `n` tokens is therefore tagged in
/// exactly `n` steps, and action ids are tag ids.
#[derive(Debug, Clone, Default)]
pub struct TaggerTransitionSystem {
    tag_map: Option<Arc<TermFrequencyMap>>,
}

impl TaggerTransitionSystem {
    /// Create an uninitialized tagger
    ///
    /// The tag vocabulary is read from the `tag-map` input by
    /// [`init`](TransitionSystem::init).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tagger over an already loaded tag vocabulary
    pub fn with_tag_map(tag_map: Arc<TermFrequencyMap>) -> Self {
        Self {
            tag_map: Some(tag_map),
        }
    }

    /// The action assigning `tag`
    pub fn shift_action(tag: i32) -> ParserAction {
        tag
    }

    fn num_tags(&self) -> usize {
        self.tag_map.as_ref().map_or(0, |map| map.size())
    }
}

impl TransitionSystem for TaggerTransitionSystem {
    type State = TaggerTransitionState;

    fn setup(&mut self, context: &mut TaskContext) {
        let input = context.get_input(TAG_MAP_INPUT);
        if input.record_format.is_empty() {
            input.record_format = "text".to_string();
        }
    }

    fn init(&mut self, context: &TaskContext) -> Result<()> {
        let tag_map = TermFrequencyMap::acquire(context, TAG_MAP_INPUT, 0, 0)?;
        log::info!("tagger initialized with {} tags", tag_map.size());
        self.tag_map = Some(tag_map);
        Ok(())
    }

    fn num_action_types(&self) -> usize {
        1
    }

    fn num_actions(&self, _num_labels: usize) -> usize {
        self.num_tags()
    }

    fn num_labels(&self) -> usize {
        self.num_tags()
    }

    fn default_action(&self, _state: &ParserState<Self::State>) -> ParserAction {
        Self::shift_action(0)
    }

    fn next_gold_action(&self, state: &ParserState<Self::State>) -> ParserAction {
        if state.end_of_input() {
            return self.default_action(state);
        }
        // -1 if the gold tag is not in the vocabulary
        Self::shift_action(state.transition_state().gold_tag(state.next()))
    }

    fn is_allowed_action(&self, action: ParserAction, state: &ParserState<Self::State>) -> bool {
        !state.end_of_input() && action >= 0 && (action as usize) < self.num_tags()
    }

    fn perform_action_without_history(
        &self,
        action: ParserAction,
        state: &mut ParserState<Self::State>,
    ) {
        if state.end_of_input() {
            return;
        }
        let next = state.next();
        state.transition_state_mut().set_tag(next, action);
        state.push(next);
        state.advance();
    }

    fn is_final_state(&self, state: &ParserState<Self::State>) -> bool {
        state.end_of_input()
    }

    fn action_as_string(&self, action: ParserAction, _state: &ParserState<Self::State>) -> String {
        let tag = self
            .tag_map
            .as_ref()
            .and_then(|map| map.term(action))
            .unwrap_or("");
        format!("SHIFT({})", tag)
    }

    fn is_deterministic_state(&self, _state: &ParserState<Self::State>) -> bool {
        false
    }

    /// The tag vocabulary is empty unless [`init`](TransitionSystem::init)
    /// or [`with_tag_map`](TaggerTransitionSystem::with_tag_map) supplied one.
    fn new_transition_state(&self, _training_mode: bool) -> Self::State {
        if self.tag_map.is_none() {
            log::warn!("tagger state created before the tag map was loaded");
        }
        TaggerTransitionState::new(self.tag_map.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAGS: [&str; 8] = ["DET", "ADJ", "ADV", "NOUN", "PRON", "ADP", "NUM", "VERB"];

    fn tagger() -> TaggerTransitionSystem {
        let mut tag_map = TermFrequencyMap::new();
        for tag in TAGS.iter() {
            tag_map.increment(tag);
        }
        TaggerTransitionSystem::with_tag_map(Arc::new(tag_map))
    }

    fn dogs_run() -> Arc<Sentence> {
        Arc::new(Sentence::new(vec![("Dogs", "NOUN"), ("run", "VERB")]))
    }

    #[test]
    fn test_action_space() {
        let system = tagger();
        assert_eq!(system.num_action_types(), 1);
        assert_eq!(system.num_actions(0), 8);
        assert_eq!(system.num_labels(), 8);

        let uninitialized = TaggerTransitionSystem::new();
        assert_eq!(uninitialized.num_actions(0), 0);
    }

    #[test]
    fn test_gold_sequence() {
        let system = tagger();
        let mut state = system.new_parser_state(dogs_run(), true);
        assert!(!system.is_final_state(&state));

        assert_eq!(system.next_gold_action(&state), 3);
        assert!(system.is_allowed_action(3, &state));
        system.perform_action(3, &mut state);
        assert_eq!(state.transition_state().tag(0), 3);
        assert_eq!(state.stack(0), 0);
        assert_eq!(state.next(), 1);

        assert_eq!(system.next_gold_action(&state), 7);
        system.perform_action(7, &mut state);
        assert!(system.is_final_state(&state));
        assert!(!system.is_allowed_action(0, &state));
        assert!(state.is_token_correct(0));
        assert!(state.is_token_correct(1));
    }

    #[test]
    fn test_allowed_actions() {
        let system = tagger();
        let state = system.new_parser_state(dogs_run(), false);
        assert!(system.is_allowed_action(0, &state));
        assert!(system.is_allowed_action(7, &state));
        assert!(!system.is_allowed_action(8, &state));
        assert!(!system.is_allowed_action(-1, &state));
        assert!(!system.is_deterministic_state(&state));
    }

    #[test]
    fn test_unknown_gold_tag() {
        let system = tagger();
        let sentence = Arc::new(Sentence::new(vec![("Dogs", "X")]));
        let state = system.new_parser_state(sentence, true);
        assert_eq!(state.transition_state().gold_tag(0), -1);
        assert_eq!(system.next_gold_action(&state), -1);
        assert!(!system.is_allowed_action(-1, &state));
    }

    #[test]
    fn test_gold_derivation_stops_at_unknown_tag() {
        let system = tagger();
        let sentence = Arc::new(Sentence::new(vec![
            ("Dogs", "NOUN"),
            ("xyz", "UNKNOWN_TAG"),
            ("run", "VERB"),
        ]));
        let mut state = system.new_parser_state(sentence, true);
        assert_eq!(system.gold_derivation(&mut state), vec![3]);
        assert_eq!(state.next(), 1);
        assert_eq!(state.transition_state().tag(1), -1);
        assert!(!system.is_final_state(&state));
    }

    #[test]
    fn test_state_before_init_has_empty_vocabulary() {
        let system = TaggerTransitionSystem::new();
        let state = system.new_parser_state(dogs_run(), true);
        assert_eq!(state.transition_state().tag_map().size(), 0);
        assert_eq!(state.transition_state().gold_tag(0), -1);
        assert!(!system.is_allowed_action(0, &state));
    }

    #[test]
    fn test_perform_at_end_is_noop() {
        let system = tagger();
        let sentence = Arc::new(Sentence::new(vec![("Dogs", "NOUN")]));
        let mut state = system.new_parser_state(sentence, false);
        system.perform_action(3, &mut state);
        system.perform_action_without_history(7, &mut state);
        assert_eq!(state.stack_size(), 1);
        assert_eq!(state.transition_state().tag(0), 3);
    }

    #[test]
    fn test_tag_accessors() {
        let system = tagger();
        let mut state = system.new_parser_state(dogs_run(), false);
        let ts = state.transition_state_mut();
        assert_eq!(ts.tag(-1), -1);
        assert_eq!(ts.tag(5), -1);
        assert_eq!(ts.gold_tag(-1), -1);
        ts.set_tag(-1, 3);
        ts.set_tag(1, 7);
        assert_eq!(ts.tag(1), 7);
        assert_eq!(ts.tag_as_string(7), "VERB");
        assert_eq!(ts.tag_as_string(-1), "");
    }

    #[test]
    fn test_annotations_and_description() {
        let system = tagger();
        let mut state = system.new_parser_state(dogs_run(), false);
        assert_eq!(state.to_string(), "Dogs run");

        system.perform_action(3, &mut state);
        assert_eq!(state.to_string(), "Dogs[NOUN] run");
        assert_eq!(system.action_as_string(7, &state), "SHIFT(VERB)");

        system.perform_action(0, &mut state);
        assert!(!state.is_token_correct(1));
        let mut output = Sentence::new(vec!["Dogs", "run"]);
        state.add_annotations_to_output(&mut output);
        assert_eq!(output.tokens[0].tag, "NOUN");
        assert_eq!(output.tokens[1].tag, "DET");
    }

    #[test]
    fn test_clone_is_independent() {
        let system = tagger();
        let mut state = system.new_parser_state(dogs_run(), false);
        system.perform_action(3, &mut state);
        let mut copy = state.clone();
        system.perform_action(7, &mut copy);
        assert_eq!(state.next(), 1);
        assert_eq!(state.transition_state().tag(1), -1);
        assert_eq!(copy.transition_state().tag(1), 7);
    }

    #[test]
    fn test_gold_derivation() {
        let system = tagger();
        let mut state = system.new_parser_state(dogs_run(), true);
        assert_eq!(system.gold_derivation(&mut state), vec![3, 7]);
        assert!(system.try_next_gold_action(&state).is_none());
    }
}
