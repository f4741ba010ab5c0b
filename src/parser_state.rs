use std::fmt;
use std::sync::Arc;

use crate::sentence::{Sentence, Token};
use crate::transition_system::TransitionState;

/// Parser configuration for one hypothesis over one sentence
///
/// The configuration is an input cursor into the sentence, a stack of token
/// indices and the transition state of the strategy being run. The sentence
/// is shared between all hypotheses; everything else is owned, so cloning a
/// state gives a hypothesis that can be extended independently.
#[derive(Debug, Clone)]
pub struct ParserState<S> {
    /// Input sentence
    sentence: Arc<Sentence>,
    /// Index of the next unconsumed input token
    next: i32,
    /// Token indices on the stack, top last
    stack: Vec<i32>,
    /// Strategy-specific annotations
    transition_state: S,
}

impl<S: TransitionState> ParserState<S> {
    /// Create the initial configuration for a sentence
    ///
    /// The cursor starts at the first token, the stack is empty and the
    /// transition state is initialized from the sentence.
    pub fn new(sentence: Arc<Sentence>, mut transition_state: S) -> Self {
        transition_state.init(&sentence);
        Self {
            sentence,
            next: 0,
            stack: Vec::new(),
            transition_state,
        }
    }

    /// The input sentence
    pub fn sentence(&self) -> &Sentence {
        &self.sentence
    }

    /// Number of tokens in the sentence
    pub fn num_tokens(&self) -> i32 {
        self.sentence.len() as i32
    }

    /// Get the token at `index`, `None` outside the sentence
    pub fn token(&self, index: i32) -> Option<&Token> {
        if index < 0 {
            return None;
        }
        self.sentence.tokens.get(index as usize)
    }

    /// Index of the next unconsumed input token
    pub fn next(&self) -> i32 {
        self.next
    }

    /// Index of the input token `offset` positions after the cursor, or -1
    pub fn input(&self, offset: i32) -> i32 {
        let index = self.next + offset;
        if index >= 0 && index < self.num_tokens() {
            index
        } else {
            -1
        }
    }

    /// Move the cursor to the next input token
    pub fn advance(&mut self) {
        debug_assert!(!self.end_of_input());
        self.next += 1;
    }

    /// Whether all input tokens have been consumed
    pub fn end_of_input(&self) -> bool {
        self.next >= self.num_tokens()
    }

    /// Push a token index on the stack
    pub fn push(&mut self, index: i32) {
        self.stack.push(index);
    }

    /// Pop the top of the stack, -1 if it is empty
    pub fn pop(&mut self) -> i32 {
        self.stack.pop().unwrap_or(-1)
    }

    /// Top of the stack, -1 if it is empty
    pub fn top(&self) -> i32 {
        self.stack(0)
    }

    /// The token index `position` elements below the top of the stack, or -1
    pub fn stack(&self, position: usize) -> i32 {
        if position < self.stack.len() {
            self.stack[self.stack.len() - 1 - position]
        } else {
            -1
        }
    }

    /// Number of elements on the stack
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Whether the stack is empty
    pub fn empty_stack(&self) -> bool {
        self.stack.is_empty()
    }

    /// The attached transition state
    pub fn transition_state(&self) -> &S {
        &self.transition_state
    }

    /// The attached transition state, mutably
    pub fn transition_state_mut(&mut self) -> &mut S {
        &mut self.transition_state
    }

    /// Whether the prediction for the token at `index` matches the gold annotation
    pub fn is_token_correct(&self, index: i32) -> bool {
        self.transition_state.is_token_correct(self, index)
    }

    /// Write the predicted annotations onto `sentence`
    pub fn add_annotations_to_output(&self, sentence: &mut Sentence) {
        self.transition_state.add_annotations_to_output(self, sentence);
    }
}

impl<S: TransitionState> fmt::Display for ParserState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.transition_state.describe(self))
    }
}
