//! Transition system framework.
//!
//! A [`TransitionSystem`] is the policy side of a parsing strategy: it defines
//! the action space, which actions are legal in a configuration, how an action
//! changes a configuration, which action reproduces the gold annotation and
//! when a configuration is final. It holds only shared read-only resources.
//! Everything that changes while a sentence is processed lives in the
//! strategy's [`TransitionState`], attached to a [`ParserState`].
//!
//! Strategies are created by name through a process-wide registry, see
//! [`AnyTransitionSystem::create`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::arc_standard::ArcStandardTransitionSystem;
use crate::errors::{Error, Result};
use crate::parser_state::ParserState;
use crate::sentence::Sentence;
use crate::tagger::TaggerTransitionSystem;
use crate::task_context::TaskContext;

/// An action of a transition system
///
/// The meaning of the integer is defined by the transition system that
/// produced it.
pub type ParserAction = i32;

/// Per-sentence, per-hypothesis annotations of a parsing strategy
///
/// Cloning must give a fully independent copy; shared resources such as
/// vocabularies are shared by reference.
pub trait TransitionState: Clone + fmt::Debug {
    /// Prepare the state for a sentence, reading its gold annotations
    fn init(&mut self, sentence: &Sentence);

    /// Whether the prediction for the token at `index` matches the gold annotation
    fn is_token_correct(&self, state: &ParserState<Self>, index: i32) -> bool;

    /// Write the predicted annotations onto an output sentence
    fn add_annotations_to_output(&self, state: &ParserState<Self>, sentence: &mut Sentence);

    /// Human readable rendering of the configuration, for debugging
    fn describe(&self, state: &ParserState<Self>) -> String;

    /// Predicted tag id of a token, -1 if none
    fn tag(&self, _index: i32) -> i32 {
        -1
    }

    /// Predicted head of a token, -1 if none
    fn head(&self, _index: i32) -> i32 {
        -1
    }

    /// Predicted dependency label id of a token, -1 if none
    fn label(&self, _index: i32) -> i32 {
        -1
    }
}

/// A parsing strategy
pub trait TransitionSystem {
    /// The annotations this strategy keeps for each hypothesis
    type State: TransitionState;

    /// Declare the task inputs this strategy reads
    ///
    /// Only binds names; nothing is opened, and missing inputs are not an error
    /// at this point.
    fn setup(&mut self, _context: &mut TaskContext) {}

    /// Load the resources declared during setup
    fn init(&mut self, _context: &TaskContext) -> Result<()> {
        Ok(())
    }

    /// Number of distinct kinds of moves
    fn num_action_types(&self) -> usize;

    /// Size of the action space for a label set of the given size
    fn num_actions(&self, num_labels: usize) -> usize;

    /// Number of labels the strategy was initialized with
    fn num_labels(&self) -> usize {
        0
    }

    /// A safe fallback action for `state`
    fn default_action(&self, state: &ParserState<Self::State>) -> ParserAction;

    /// The action reproducing the gold annotation in `state`
    ///
    /// The result is meaningless for final states; check
    /// [`is_final_state`](TransitionSystem::is_final_state) first or use
    /// [`try_next_gold_action`](TransitionSystem::try_next_gold_action).
    fn next_gold_action(&self, state: &ParserState<Self::State>) -> ParserAction;

    /// Whether `action` may be applied to `state`
    fn is_allowed_action(&self, action: ParserAction, state: &ParserState<Self::State>) -> bool;

    /// Apply `action` to `state`
    ///
    /// `action` must be allowed in `state`.
    fn perform_action_without_history(
        &self,
        action: ParserAction,
        state: &mut ParserState<Self::State>,
    );

    /// Whether no further action is needed in `state`
    fn is_final_state(&self, state: &ParserState<Self::State>) -> bool;

    /// Human readable rendering of an action, for debugging
    fn action_as_string(&self, action: ParserAction, state: &ParserState<Self::State>) -> String;

    /// Whether exactly one action is legal in `state`
    fn is_deterministic_state(&self, state: &ParserState<Self::State>) -> bool;

    /// Create a fresh transition state for one sentence
    fn new_transition_state(&self, training_mode: bool) -> Self::State;

    /// Apply `action` to `state`
    fn perform_action(&self, action: ParserAction, state: &mut ParserState<Self::State>) {
        log::trace!("{} on [{}]", self.action_as_string(action, state), state);
        self.perform_action_without_history(action, state);
    }

    /// The gold action for `state`, or `None` if the state is final
    fn try_next_gold_action(&self, state: &ParserState<Self::State>) -> Option<ParserAction> {
        if self.is_final_state(state) {
            None
        } else {
            Some(self.next_gold_action(state))
        }
    }

    /// Create the initial configuration for a sentence
    fn new_parser_state(
        &self,
        sentence: Arc<Sentence>,
        training_mode: bool,
    ) -> ParserState<Self::State> {
        ParserState::new(sentence, self.new_transition_state(training_mode))
    }

    /// Apply gold actions until `state` is final and return them
    ///
    /// Stops early if a gold action is not allowed, which happens when the
    /// gold annotation cannot be derived by this strategy.
    fn gold_derivation(&self, state: &mut ParserState<Self::State>) -> Vec<ParserAction> {
        let mut actions = Vec::new();
        while let Some(action) = self.try_next_gold_action(state) {
            if !self.is_allowed_action(action, state) {
                log::warn!(
                    "gold action {} is not allowed in [{}]",
                    self.action_as_string(action, state),
                    state
                );
                break;
            }
            self.perform_action(action, state);
            actions.push(action);
        }
        actions
    }
}

/// Code generic over the concrete transition system
///
/// See [`AnyTransitionSystem::visit`].
pub trait TransitionSystemVisitor {
    type Output;

    fn visit<T: TransitionSystem>(self, system: &T) -> Self::Output;
}

/// One of the registered transition systems
#[derive(Debug, Clone)]
pub enum AnyTransitionSystem {
    /// Part-of-speech tagging by shifting, registered as `tagger`
    Tagger(TaggerTransitionSystem),
    /// Arc-standard dependency parsing, registered as `arc-standard`
    ArcStandard(ArcStandardTransitionSystem),
}

/// Constructor of a registered transition system
pub type TransitionSystemFactory = fn() -> AnyTransitionSystem;

fn new_tagger() -> AnyTransitionSystem {
    AnyTransitionSystem::Tagger(TaggerTransitionSystem::new())
}

fn new_arc_standard() -> AnyTransitionSystem {
    AnyTransitionSystem::ArcStandard(ArcStandardTransitionSystem::new())
}

static REGISTRY: Lazy<RwLock<HashMap<String, TransitionSystemFactory>>> = Lazy::new(|| {
    let mut factories: HashMap<String, TransitionSystemFactory> = HashMap::new();
    factories.insert("tagger".to_string(), new_tagger);
    factories.insert("arc-standard".to_string(), new_arc_standard);
    RwLock::new(factories)
});

/// Register a transition system under `name`, replacing any previous entry
pub fn register_transition_system(name: &str, factory: TransitionSystemFactory) {
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.to_string(), factory);
}

/// Names of all registered transition systems, sorted
pub fn registered_transition_systems() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

impl AnyTransitionSystem {
    /// Create the transition system registered under `name`
    pub fn create(name: &str) -> Result<Self> {
        let factory = REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied();
        match factory {
            Some(factory) => Ok(factory()),
            None => {
                log::error!("unknown transition system '{}'", name);
                Err(Error::config(format!("unknown transition system '{}'", name)))
            }
        }
    }

    /// Declare the task inputs of the wrapped system
    pub fn setup(&mut self, context: &mut TaskContext) {
        match self {
            Self::Tagger(system) => system.setup(context),
            Self::ArcStandard(system) => system.setup(context),
        }
    }

    /// Load the resources of the wrapped system
    pub fn init(&mut self, context: &TaskContext) -> Result<()> {
        match self {
            Self::Tagger(system) => system.init(context),
            Self::ArcStandard(system) => system.init(context),
        }
    }

    /// Run generic code against the wrapped system
    pub fn visit<V: TransitionSystemVisitor>(&self, visitor: V) -> V::Output {
        match self {
            Self::Tagger(system) => visitor.visit(system),
            Self::ArcStandard(system) => visitor.visit(system),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ActionTypes;

    impl TransitionSystemVisitor for ActionTypes {
        type Output = usize;

        fn visit<T: TransitionSystem>(self, system: &T) -> usize {
            system.num_action_types()
        }
    }

    #[test]
    fn test_create_registered() {
        let tagger = AnyTransitionSystem::create("tagger").unwrap();
        assert!(matches!(tagger, AnyTransitionSystem::Tagger(_)));
        assert_eq!(tagger.visit(ActionTypes), 1);

        let parser = AnyTransitionSystem::create("arc-standard").unwrap();
        assert!(matches!(parser, AnyTransitionSystem::ArcStandard(_)));
        assert_eq!(parser.visit(ActionTypes), 3);
    }

    #[test]
    fn test_create_unknown() {
        let err = AnyTransitionSystem::create("arc-eager").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("arc-eager"));
    }

    #[test]
    fn test_register_alias() {
        register_transition_system("pos-tagger", new_tagger);
        let names = registered_transition_systems();
        assert!(names.contains(&"pos-tagger".to_string()));
        assert!(names.contains(&"tagger".to_string()));
        let system = AnyTransitionSystem::create("pos-tagger").unwrap();
        assert!(matches!(system, AnyTransitionSystem::Tagger(_)));
    }

    #[test]
    fn test_setup_declares_inputs() {
        let mut context = TaskContext::new();
        let mut system = AnyTransitionSystem::create("tagger").unwrap();
        system.setup(&mut context);
        assert!(context.input("tag-map").is_some());
        // Nothing backs the input yet, so initialization fails.
        let err = system.init(&context).unwrap_err();
        assert!(err.is_configuration());
    }
}
