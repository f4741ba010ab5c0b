//! Transition systems and feature extraction for transition-based taggers and parsers
//!
//! A transition system turns a sentence into a sequence of decisions, such as
//! part-of-speech tags or shift/arc moves, by running a state machine over a
//! parser configuration. A feature extractor, compiled from a feature
//! template, reads a bounded-size integer feature vector off each
//! configuration for a downstream classifier.
//!
//! # Examples
//!
//! ## Tagging
//!
//! ```no_run
//! use std::sync::Arc;
//! use tbparse::{
//!     ParserFeatureExtractor, Sentence, TaggerTransitionState, TaggerTransitionSystem,
//!     TaskContext, TransitionSystem,
//! };
//!
//! let mut context = TaskContext::load("tagger.context")?;
//! let mut system = TaggerTransitionSystem::new();
//! system.setup(&mut context);
//! system.init(&context)?;
//!
//! let mut extractor = ParserFeatureExtractor::<TaggerTransitionState>::new();
//! extractor.parse("input.word input(1).word stack.pred-tag")?;
//! extractor.setup(&mut context);
//! extractor.init(&context)?;
//!
//! let sentence = Arc::new(Sentence::new(vec!["Dogs", "run"]));
//! let mut state = system.new_parser_state(sentence, false);
//! while !system.is_final_state(&state) {
//!     let _features = extractor.extract(&state);
//!     let action = system.default_action(&state);
//!     system.perform_action(action, &mut state);
//! }
//! # Ok::<(), tbparse::Error>(())
//! ```
//!
//! ## Selecting a transition system by name
//!
//! ```no_run
//! use std::sync::Arc;
//! use tbparse::{AnyTransitionSystem, Sentence, TaskContext, TransitionSystem, TransitionSystemVisitor};
//!
//! struct GoldActions(Arc<Sentence>);
//!
//! impl TransitionSystemVisitor for GoldActions {
//!     type Output = Vec<i32>;
//!
//!     fn visit<T: TransitionSystem>(self, system: &T) -> Vec<i32> {
//!         let mut state = system.new_parser_state(self.0, true);
//!         system.gold_derivation(&mut state)
//!     }
//! }
//!
//! let mut context = TaskContext::load("parser.context")?;
//! let mut system = AnyTransitionSystem::create("arc-standard")?;
//! system.setup(&mut context);
//! system.init(&context)?;
//! let sentence = Arc::new(Sentence::new(vec!["Dogs", "run"]));
//! let actions = system.visit(GoldActions(sentence));
//! # Ok::<(), tbparse::Error>(())
//! ```

mod arc_standard;
mod descriptor;
mod dictionary;
mod errors;
mod feature_extractor;
mod feature_types;
mod parser_features;
mod parser_state;
mod sentence;
mod shared_store;
mod tagger;
mod task_context;
mod transition_system;

/// Feature template parser
pub mod fml;

pub use self::arc_standard::{ActionTypes, ArcStandardTransitionState, ArcStandardTransitionSystem};
pub use self::descriptor::{FeatureExtractorDescriptor, FeatureFunctionDescriptor, Parameter};
pub use self::dictionary::TermFrequencyMap;
pub use self::errors::{Error, Result};
pub use self::feature_extractor::{
    FeatureFunctionBase, FeatureFunctionFactory, FeatureVector, GenericFeatureExtractor,
    GenericFeatureFunction,
};
pub use self::feature_types::{FeatureType, FeatureValue, FeatureValues, NONE};
pub use self::parser_features::{ParserFeatureExtractor, ParserFeatureFunction};
pub use self::parser_state::ParserState;
pub use self::sentence::{Sentence, Token};
pub use self::shared_store::SharedStore;
pub use self::tagger::{TaggerTransitionState, TaggerTransitionSystem};
pub use self::task_context::{TaskContext, TaskInput};
pub use self::transition_system::{
    register_transition_system, registered_transition_systems, AnyTransitionSystem, ParserAction,
    TransitionState, TransitionSystem, TransitionSystemFactory, TransitionSystemVisitor,
};
