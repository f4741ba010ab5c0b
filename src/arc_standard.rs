use std::sync::Arc;

use bitflags::bitflags;

use crate::dictionary::TermFrequencyMap;
use crate::errors::Result;
use crate::parser_state::ParserState;
use crate::sentence::Sentence;
use crate::task_context::TaskContext;
use crate::transition_system::{ParserAction, TransitionState, TransitionSystem};

/// Name of the task input holding the dependency label vocabulary
const LABEL_MAP_INPUT: &str = "label-map";

/// Label given to tokens that end up without a head
const ROOT_LABEL: &str = "ROOT";

bitflags! {
    /// Kinds of arc-standard moves
    pub struct ActionTypes: u8 {
        /// Move the next input token onto the stack
        const SHIFT = 0x01;
        /// Attach the second stack element to the top
        const LEFT_ARC = 0x02;
        /// Attach the top stack element to the second
        const RIGHT_ARC = 0x04;
    }
}

/// Dependency arcs of one parsing hypothesis
#[derive(Debug, Clone)]
pub struct ArcStandardTransitionState {
    /// Predicted head per token, -1 while unattached
    head: Vec<i32>,
    /// Predicted label id per token
    label: Vec<i32>,
    gold_head: Vec<i32>,
    gold_label: Vec<i32>,
    /// Label id of unattached tokens, -1 if the vocabulary has no root label
    root_label: i32,
    /// Dependency label vocabulary
    label_map: Arc<TermFrequencyMap>,
}

impl ArcStandardTransitionState {
    pub fn new(label_map: Arc<TermFrequencyMap>) -> Self {
        let root_label = label_map.lookup_index(ROOT_LABEL, -1);
        Self {
            head: Vec::new(),
            label: Vec::new(),
            gold_head: Vec::new(),
            gold_label: Vec::new(),
            root_label,
            label_map,
        }
    }

    fn get(values: &[i32], index: i32) -> i32 {
        if index < 0 {
            return -1;
        }
        values.get(index as usize).copied().unwrap_or(-1)
    }

    /// Predicted head of the token at `index`, -1 if unattached or outside
    pub fn head(&self, index: i32) -> i32 {
        Self::get(&self.head, index)
    }

    /// Predicted label of the token at `index`
    pub fn label(&self, index: i32) -> i32 {
        Self::get(&self.label, index)
    }

    /// Gold head of the token at `index`, -1 for the root or outside
    pub fn gold_head(&self, index: i32) -> i32 {
        Self::get(&self.gold_head, index)
    }

    /// Gold label of the token at `index`
    pub fn gold_label(&self, index: i32) -> i32 {
        Self::get(&self.gold_label, index)
    }

    /// Label id of unattached tokens
    pub fn root_label(&self) -> i32 {
        self.root_label
    }

    /// Attach `child` to `head` with `label`; ignored outside the sentence
    pub fn add_arc(&mut self, child: i32, head: i32, label: i32) {
        if child < 0 || child as usize >= self.head.len() {
            return;
        }
        self.head[child as usize] = head;
        self.label[child as usize] = label;
    }

    /// The label string for a label id, empty if the id is not in the vocabulary
    pub fn label_as_string(&self, label: i32) -> &str {
        self.label_map.term(label).unwrap_or("")
    }

    /// Whether every token right of `index` whose gold head is `index` is attached
    fn done_children_right_of(&self, index: i32) -> bool {
        (index + 1..self.gold_head.len() as i32)
            .all(|i| self.gold_head(i) != index || self.head(i) != -1)
    }
}

impl TransitionState for ArcStandardTransitionState {
    fn init(&mut self, sentence: &Sentence) {
        let n = sentence.len();
        self.head = vec![-1; n];
        self.label = vec![self.root_label; n];
        self.gold_head = sentence.tokens.iter().map(|token| token.head).collect();
        self.gold_label = sentence
            .tokens
            .iter()
            .map(|token| self.label_map.lookup_index(&token.label, 0))
            .collect();
    }

    fn is_token_correct(&self, _state: &ParserState<Self>, index: i32) -> bool {
        ArcStandardTransitionState::head(self, index) == self.gold_head(index)
    }

    fn add_annotations_to_output(&self, _state: &ParserState<Self>, sentence: &mut Sentence) {
        for (i, token) in sentence.tokens.iter_mut().enumerate().take(self.head.len()) {
            token.head = self.head[i];
            let label = self.label_as_string(self.label[i]);
            token.label = if label.is_empty() && self.head[i] == -1 {
                ROOT_LABEL.to_string()
            } else {
                label.to_string()
            };
        }
    }

    fn describe(&self, state: &ParserState<Self>) -> String {
        let word = |index: i32| state.token(index).map_or("", |t| t.word.as_str());
        let stack: Vec<&str> = (0..state.stack_size())
            .rev()
            .map(|position| word(state.stack(position)))
            .collect();
        let input: Vec<&str> = (state.next()..state.num_tokens()).map(word).collect();
        format!("{} | {}", stack.join(" "), input.join(" "))
    }

    fn head(&self, index: i32) -> i32 {
        ArcStandardTransitionState::head(self, index)
    }

    fn label(&self, index: i32) -> i32 {
        ArcStandardTransitionState::label(self, index)
    }
}

/// Arc-standard dependency parsing
///
/// The configuration is a stack of partially built subtrees and the
/// remaining input. Arcs are only built between the two topmost stack
/// elements, so a sentence of `n` tokens takes exactly `2n - 1` steps.
#[derive(Debug, Clone, Default)]
pub struct ArcStandardTransitionSystem {
    label_map: Option<Arc<TermFrequencyMap>>,
}

impl ArcStandardTransitionSystem {
    /// Create an uninitialized parser
    ///
    /// The label vocabulary is read from the `label-map` input by
    /// [`init`](TransitionSystem::init).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser over an already loaded label vocabulary
    pub fn with_label_map(label_map: Arc<TermFrequencyMap>) -> Self {
        Self {
            label_map: Some(label_map),
        }
    }

    pub fn shift_action() -> ParserAction {
        0
    }

    pub fn left_arc_action(label: i32) -> ParserAction {
        1 + 2 * label
    }

    pub fn right_arc_action(label: i32) -> ParserAction {
        2 + 2 * label
    }

    /// The kind of move an action encodes
    pub fn action_type(action: ParserAction) -> ActionTypes {
        if action <= 0 {
            ActionTypes::SHIFT
        } else if action % 2 == 1 {
            ActionTypes::LEFT_ARC
        } else {
            ActionTypes::RIGHT_ARC
        }
    }

    /// The label an arc action attaches with, -1 for SHIFT
    pub fn label(action: ParserAction) -> i32 {
        if action <= 0 {
            -1
        } else {
            (action - 1) / 2
        }
    }

    /// The kinds of moves legal in `state`
    pub fn allowed_action_types(
        &self,
        state: &ParserState<ArcStandardTransitionState>,
    ) -> ActionTypes {
        let mut allowed = ActionTypes::empty();
        if !state.end_of_input() {
            allowed |= ActionTypes::SHIFT;
        }
        if state.stack_size() >= 2 {
            allowed |= ActionTypes::LEFT_ARC | ActionTypes::RIGHT_ARC;
        }
        allowed
    }

    fn label_name(&self, label: i32) -> String {
        match self.label_map.as_ref().and_then(|map| map.term(label)) {
            Some(name) => name.to_string(),
            None => label.to_string(),
        }
    }
}

impl TransitionSystem for ArcStandardTransitionSystem {
    type State = ArcStandardTransitionState;

    fn setup(&mut self, context: &mut TaskContext) {
        let input = context.get_input(LABEL_MAP_INPUT);
        if input.record_format.is_empty() {
            input.record_format = "text".to_string();
        }
    }

    fn init(&mut self, context: &TaskContext) -> Result<()> {
        let label_map = TermFrequencyMap::acquire(context, LABEL_MAP_INPUT, 0, 0)?;
        log::info!("arc-standard parser initialized with {} labels", label_map.size());
        self.label_map = Some(label_map);
        Ok(())
    }

    fn num_action_types(&self) -> usize {
        3
    }

    fn num_actions(&self, num_labels: usize) -> usize {
        1 + 2 * num_labels
    }

    fn num_labels(&self) -> usize {
        self.label_map.as_ref().map_or(0, |map| map.size())
    }

    fn default_action(&self, state: &ParserState<Self::State>) -> ParserAction {
        if state.end_of_input() {
            Self::right_arc_action(0)
        } else {
            Self::shift_action()
        }
    }

    fn next_gold_action(&self, state: &ParserState<Self::State>) -> ParserAction {
        if state.stack_size() < 2 {
            return Self::shift_action();
        }
        let ts = state.transition_state();
        let s0 = state.stack(0);
        let s1 = state.stack(1);
        let gold_label = |index: i32| ts.gold_label(index).max(0);
        if ts.gold_head(s0) == s1 && ts.done_children_right_of(s0) {
            Self::right_arc_action(gold_label(s0))
        } else if ts.gold_head(s1) == s0 {
            Self::left_arc_action(gold_label(s1))
        } else {
            Self::shift_action()
        }
    }

    fn is_allowed_action(&self, action: ParserAction, state: &ParserState<Self::State>) -> bool {
        if action < 0 || action as usize >= self.num_actions(self.num_labels()) {
            return false;
        }
        self.allowed_action_types(state)
            .contains(Self::action_type(action))
    }

    fn perform_action_without_history(
        &self,
        action: ParserAction,
        state: &mut ParserState<Self::State>,
    ) {
        let action_type = Self::action_type(action);
        if !self.allowed_action_types(state).contains(action_type) {
            return;
        }
        let label = Self::label(action);
        if action_type == ActionTypes::SHIFT {
            let next = state.next();
            state.push(next);
            state.advance();
        } else if action_type == ActionTypes::LEFT_ARC {
            let s0 = state.pop();
            let s1 = state.pop();
            state.transition_state_mut().add_arc(s1, s0, label);
            state.push(s0);
        } else {
            let s0 = state.pop();
            let s1 = state.pop();
            state.transition_state_mut().add_arc(s0, s1, label);
            state.push(s1);
        }
    }

    fn is_final_state(&self, state: &ParserState<Self::State>) -> bool {
        state.end_of_input() && state.stack_size() < 2
    }

    fn action_as_string(&self, action: ParserAction, _state: &ParserState<Self::State>) -> String {
        let action_type = Self::action_type(action);
        if action_type == ActionTypes::SHIFT {
            "SHIFT".to_string()
        } else if action_type == ActionTypes::LEFT_ARC {
            format!("LEFT_ARC({})", self.label_name(Self::label(action)))
        } else {
            format!("RIGHT_ARC({})", self.label_name(Self::label(action)))
        }
    }

    fn is_deterministic_state(&self, state: &ParserState<Self::State>) -> bool {
        state.stack_size() < 2 && !state.end_of_input()
    }

    fn new_transition_state(&self, _training_mode: bool) -> Self::State {
        if self.label_map.is_none() {
            log::warn!("arc-standard state created before the label map was loaded");
        }
        ArcStandardTransitionState::new(self.label_map.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentence::Token;

    fn parser() -> ArcStandardTransitionSystem {
        let mut label_map = TermFrequencyMap::new();
        for label in ["ROOT", "nsubj", "dobj"].iter() {
            label_map.increment(label);
        }
        ArcStandardTransitionSystem::with_label_map(Arc::new(label_map))
    }

    fn dogs_chase_cats() -> Arc<Sentence> {
        Arc::new(Sentence::new(vec![
            Token::new("Dogs").with_head(1, "nsubj"),
            Token::new("chase").with_head(-1, "ROOT"),
            Token::new("cats").with_head(1, "dobj"),
        ]))
    }

    #[test]
    fn test_action_encoding() {
        assert_eq!(ArcStandardTransitionSystem::shift_action(), 0);
        assert_eq!(ArcStandardTransitionSystem::left_arc_action(1), 3);
        assert_eq!(ArcStandardTransitionSystem::right_arc_action(2), 6);
        assert_eq!(ArcStandardTransitionSystem::action_type(3), ActionTypes::LEFT_ARC);
        assert_eq!(ArcStandardTransitionSystem::action_type(6), ActionTypes::RIGHT_ARC);
        assert_eq!(ArcStandardTransitionSystem::label(6), 2);
        assert_eq!(ArcStandardTransitionSystem::label(0), -1);

        let system = parser();
        assert_eq!(system.num_action_types(), 3);
        assert_eq!(system.num_labels(), 3);
        assert_eq!(system.num_actions(3), 7);
    }

    #[test]
    fn test_allowed_actions() {
        let system = parser();
        let mut state = system.new_parser_state(dogs_chase_cats(), false);
        assert!(system.is_allowed_action(0, &state));
        assert!(!system.is_allowed_action(3, &state));
        assert!(system.is_deterministic_state(&state));

        system.perform_action(0, &mut state);
        system.perform_action(0, &mut state);
        assert!(system.is_allowed_action(3, &state));
        assert!(system.is_allowed_action(6, &state));
        assert!(!system.is_allowed_action(7, &state));
        assert!(!system.is_allowed_action(-1, &state));
        assert!(!system.is_deterministic_state(&state));
    }

    #[test]
    fn test_gold_derivation() {
        let system = parser();
        let mut state = system.new_parser_state(dogs_chase_cats(), true);
        let actions = system.gold_derivation(&mut state);
        assert_eq!(actions, vec![0, 0, 3, 0, 6]);
        assert!(system.is_final_state(&state));
        assert_eq!(state.stack_size(), 1);
        assert_eq!(state.top(), 1);

        let ts = state.transition_state();
        assert_eq!(ts.head(0), 1);
        assert_eq!(ts.label(0), 1);
        assert_eq!(ts.head(1), -1);
        assert_eq!(ts.label(1), ts.root_label());
        assert_eq!(ts.head(2), 1);
        assert_eq!(ts.label(2), 2);
        assert!((0..3).all(|i| state.is_token_correct(i)));
    }

    #[test]
    fn test_gold_waits_for_right_children() {
        let system = parser();
        let sentence = Arc::new(Sentence::new(vec![
            Token::new("saw").with_head(-1, "ROOT"),
            Token::new("dogs").with_head(0, "dobj"),
            Token::new("run").with_head(1, "nsubj"),
        ]));
        let mut state = system.new_parser_state(sentence, true);
        let actions = system.gold_derivation(&mut state);
        assert_eq!(actions, vec![0, 0, 0, 4, 6]);
        assert_eq!(state.transition_state().head(2), 1);
        assert_eq!(state.transition_state().head(1), 0);
    }

    #[test]
    fn test_default_action() {
        let system = parser();
        let mut state = system.new_parser_state(dogs_chase_cats(), false);
        assert_eq!(system.default_action(&state), 0);
        for _ in 0..3 {
            system.perform_action(0, &mut state);
        }
        assert_eq!(system.default_action(&state), 2);
        assert!(!system.is_final_state(&state));
    }

    #[test]
    fn test_annotations_and_description() {
        let system = parser();
        let mut state = system.new_parser_state(dogs_chase_cats(), false);
        system.perform_action(0, &mut state);
        system.perform_action(0, &mut state);
        assert_eq!(state.to_string(), "Dogs chase | cats");
        assert_eq!(system.action_as_string(3, &state), "LEFT_ARC(nsubj)");
        assert_eq!(system.action_as_string(0, &state), "SHIFT");
        assert_eq!(system.action_as_string(8, &state), "RIGHT_ARC(3)");

        system.perform_action(3, &mut state);
        let mut output = Sentence::new(vec!["Dogs", "chase", "cats"]);
        state.add_annotations_to_output(&mut output);
        assert_eq!(output.tokens[0].head, 1);
        assert_eq!(output.tokens[0].label, "nsubj");
        assert_eq!(output.tokens[1].head, -1);
        assert_eq!(output.tokens[1].label, "ROOT");
        assert!(!state.is_token_correct(2));
    }

    #[test]
    fn test_illegal_action_is_ignored() {
        let system = parser();
        let mut state = system.new_parser_state(dogs_chase_cats(), false);
        system.perform_action_without_history(3, &mut state);
        assert_eq!(state.stack_size(), 0);
        assert_eq!(state.next(), 0);
    }
}
