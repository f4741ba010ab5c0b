//! Feature functions over parser configurations.
//!
//! Locators move the focus to a token of the configuration and hand it to
//! their nested functions:
//!
//! - `input(n)`: the `n`th unconsumed input token, counted from the cursor
//! - `stack(n)`: the `n`th stack element from the top
//! - `head(n)`: the `n`th ancestor of the focus, following predicted heads
//!
//! Leaves read one value off the focused token:
//!
//! | function | value |
//! |---|---|
//! | `word(min-freq, max-num-terms)` | word id in the `word-map` input |
//! | `tag` | gold tag id in the `tag-map` input |
//! | `pred-tag` | predicted tag id in the `tag-map` input |
//! | `label` | predicted dependency label id in the `label-map` input |
//! | `capitalization` | casing class of the word |
//! | `digit` | whether the word contains digits |
//! | `length(max)` | number of characters, clipped to `max` (default 10) |
//!
//! A focus outside the sentence produces the `<OUTSIDE>` value, or no value
//! at all for `length`.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::descriptor::FeatureFunctionDescriptor;
use crate::dictionary::TermFrequencyMap;
use crate::errors::{Error, Result};
use crate::feature_extractor::{
    FeatureFunctionBase, FeatureFunctionFactory, FeatureVector, GenericFeatureExtractor,
    GenericFeatureFunction,
};
use crate::feature_types::{FeatureType, FeatureValue, NONE};
use crate::parser_state::ParserState;
use crate::task_context::TaskContext;
use crate::transition_system::TransitionState;

/// A feature function evaluated on a parser configuration
pub trait ParserFeatureFunction<S: TransitionState>: GenericFeatureFunction {
    /// Append the values of this function for the token `focus` (-1 if none)
    fn evaluate(&self, state: &ParserState<S>, focus: i32, features: &mut FeatureVector);
}

/// Feature extractor over parser configurations with transition state `S`
pub type ParserFeatureExtractor<S> = GenericFeatureExtractor<dyn ParserFeatureFunction<S>>;

impl<S: TransitionState + 'static> GenericFeatureExtractor<dyn ParserFeatureFunction<S>> {
    /// Extract the features of a configuration
    ///
    /// Top-level functions are evaluated with the focus on the next input
    /// token. Absent values are left out.
    pub fn extract(&self, state: &ParserState<S>) -> FeatureVector {
        let mut features = FeatureVector::new();
        self.extract_into(state, &mut features);
        features
    }

    /// Like [`extract`](Self::extract), appending to an existing vector
    pub fn extract_into(&self, state: &ParserState<S>, features: &mut FeatureVector) {
        let focus = state.input(0);
        for function in self.functions() {
            function.evaluate(state, focus, features);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Locator {
    Input,
    Stack,
    Head,
}

/// Composite function moving the focus before evaluating its children
struct LocatorFunction<S: TransitionState> {
    base: FeatureFunctionBase,
    locator: Locator,
    children: Vec<Box<dyn ParserFeatureFunction<S>>>,
}

impl<S: TransitionState> LocatorFunction<S> {
    fn locate(&self, state: &ParserState<S>, focus: i32) -> i32 {
        let argument = self.base.argument();
        match self.locator {
            Locator::Input => state.input(argument),
            Locator::Stack if argument < 0 => -1,
            Locator::Stack => state.stack(argument as usize),
            Locator::Head => {
                let mut index = focus;
                for _ in 0..argument.max(1) {
                    if index < 0 {
                        break;
                    }
                    index = state.transition_state().head(index);
                }
                index
            }
        }
    }
}

impl<S: TransitionState> GenericFeatureFunction for LocatorFunction<S> {
    fn base(&self) -> &FeatureFunctionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FeatureFunctionBase {
        &mut self.base
    }

    fn setup(&mut self, context: &mut TaskContext) {
        for child in self.children.iter_mut() {
            child.setup(context);
        }
    }

    fn init(&mut self, context: &TaskContext) -> Result<()> {
        for child in self.children.iter_mut() {
            child.init(context)?;
        }
        Ok(())
    }

    fn feature_types<'a>(&'a self, types: &mut Vec<&'a FeatureType>) {
        for child in &self.children {
            child.feature_types(types);
        }
    }

    fn feature_types_mut<'a>(&'a mut self, types: &mut Vec<&'a mut FeatureType>) {
        for child in self.children.iter_mut() {
            child.feature_types_mut(types);
        }
    }

    fn feature_type_names(&self, names: &mut Vec<String>) {
        for child in &self.children {
            child.feature_type_names(names);
        }
    }
}

impl<S: TransitionState> ParserFeatureFunction<S> for LocatorFunction<S> {
    fn evaluate(&self, state: &ParserState<S>, focus: i32, features: &mut FeatureVector) {
        let focus = self.locate(state, focus);
        for child in &self.children {
            child.evaluate(state, focus, features);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenProperty {
    Word,
    Tag,
    PredictedTag,
    Label,
    Capitalization,
    Digit,
    Length,
}

const CAPITALIZATION_VALUES: [&str; 7] = [
    "lower",
    "upper",
    "capitalized",
    "initial-capitalized",
    "mixed",
    "non-alphabetic",
    "<OUTSIDE>",
];

const DIGIT_VALUES: [&str; 4] = ["no-digit", "some-digit", "all-digit", "<OUTSIDE>"];

impl TokenProperty {
    fn from_name(name: &str) -> Option<Self> {
        let property = match name {
            "word" => Self::Word,
            "tag" => Self::Tag,
            "pred-tag" => Self::PredictedTag,
            "label" => Self::Label,
            "capitalization" => Self::Capitalization,
            "digit" => Self::Digit,
            "length" => Self::Length,
            _ => return None,
        };
        Some(property)
    }

    /// The task input holding the vocabulary of this property, if any
    fn input(self) -> Option<&'static str> {
        match self {
            Self::Word => Some("word-map"),
            Self::Tag | Self::PredictedTag => Some("tag-map"),
            Self::Label => Some("label-map"),
            _ => None,
        }
    }

    /// Values appended to the vocabulary
    fn extra_values(self) -> [&'static str; 2] {
        match self {
            Self::Word | Self::Tag => ["<UNKNOWN>", "<OUTSIDE>"],
            _ => ["<UNSET>", "<OUTSIDE>"],
        }
    }
}

/// Leaf function reading one property of the focused token
struct TokenFunction<S> {
    base: FeatureFunctionBase,
    property: TokenProperty,
    map: Option<Arc<TermFrequencyMap>>,
    _state: PhantomData<fn() -> S>,
}

fn capitalization(word: &str, sentence_initial: bool) -> usize {
    let mut has_upper = false;
    let mut has_lower = false;
    for c in word.chars() {
        has_upper |= c.is_uppercase();
        has_lower |= c.is_lowercase();
    }
    let first_upper = word.chars().find(|c| c.is_alphabetic()).map_or(false, char::is_uppercase);
    match (has_upper, has_lower) {
        (false, false) => 5,
        (false, true) => 0,
        (true, false) => 1,
        (true, true) if first_upper && sentence_initial => 3,
        (true, true) if first_upper => 2,
        (true, true) => 4,
    }
}

fn digit(word: &str) -> usize {
    let digits = word.chars().filter(char::is_ascii_digit).count();
    if digits == 0 {
        0
    } else if digits == word.chars().count() {
        2
    } else {
        1
    }
}

impl<S: TransitionState> TokenFunction<S> {
    fn new(base: FeatureFunctionBase, property: TokenProperty) -> Self {
        Self {
            base,
            property,
            map: None,
            _state: PhantomData,
        }
    }

    /// Map an id from the vocabulary, or -1, to a feature value
    fn vocabulary_value(&self, feature_type: &FeatureType, id: i32) -> FeatureValue {
        let size = self.map.as_ref().map_or(0, |map| map.size());
        if id >= 0 && (id as usize) < size {
            id as FeatureValue
        } else {
            feature_type.extra_value(0)
        }
    }

    fn compute(&self, feature_type: &FeatureType, state: &ParserState<S>, focus: i32) -> FeatureValue {
        let token = match state.token(focus) {
            Some(token) => token,
            None => {
                return match self.property {
                    TokenProperty::Length => NONE,
                    TokenProperty::Capitalization | TokenProperty::Digit => {
                        feature_type.domain_size() - 1
                    }
                    _ => feature_type.extra_value(1),
                }
            }
        };
        let lookup = |term: &str| self.map.as_ref().map_or(-1, |map| map.lookup_index(term, -1));
        match self.property {
            TokenProperty::Word => self.vocabulary_value(feature_type, lookup(&token.word)),
            TokenProperty::Tag => self.vocabulary_value(feature_type, lookup(&token.tag)),
            TokenProperty::PredictedTag => {
                self.vocabulary_value(feature_type, state.transition_state().tag(focus))
            }
            TokenProperty::Label => {
                self.vocabulary_value(feature_type, state.transition_state().label(focus))
            }
            TokenProperty::Capitalization => capitalization(&token.word, focus == 0) as FeatureValue,
            TokenProperty::Digit => digit(&token.word) as FeatureValue,
            TokenProperty::Length => {
                let max = feature_type.domain_size() - 1;
                (token.word.chars().count() as FeatureValue).min(max)
            }
        }
    }
}

impl<S: TransitionState> GenericFeatureFunction for TokenFunction<S> {
    fn base(&self) -> &FeatureFunctionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FeatureFunctionBase {
        &mut self.base
    }

    fn setup(&mut self, context: &mut TaskContext) {
        if let Some(name) = self.property.input() {
            let input = context.get_input(name);
            if input.record_format.is_empty() {
                input.record_format = "text".to_string();
            }
        }
    }

    fn init(&mut self, context: &TaskContext) -> Result<()> {
        let name = self.base.name().to_string();
        let feature_type = match self.property {
            TokenProperty::Capitalization => {
                FeatureType::enumerated(name, CAPITALIZATION_VALUES.iter().copied())
            }
            TokenProperty::Digit => FeatureType::enumerated(name, DIGIT_VALUES.iter().copied()),
            TokenProperty::Length => {
                let max = self.base.get_int_parameter("max", 10);
                FeatureType::numeric(name, max as FeatureValue + 1)
            }
            property => {
                let input = property.input().unwrap_or_default();
                let (min_frequency, max_num_terms) = if property == TokenProperty::Word {
                    (
                        self.base.get_int_parameter("min-freq", 0).max(0),
                        self.base.get_int_parameter("max-num-terms", 0).max(0),
                    )
                } else {
                    (0, 0)
                };
                let map = TermFrequencyMap::acquire(
                    context,
                    input,
                    min_frequency as i64,
                    max_num_terms as usize,
                )?;
                self.map = Some(map.clone());
                FeatureType::resource(name, map, property.extra_values().iter().copied())
            }
        };
        self.base.set_feature_type(feature_type);
        Ok(())
    }
}

impl<S: TransitionState> ParserFeatureFunction<S> for TokenFunction<S> {
    fn evaluate(&self, state: &ParserState<S>, focus: i32, features: &mut FeatureVector) {
        if let Some(feature_type) = self.base.feature_type() {
            features.add(feature_type, self.compute(feature_type, state, focus));
        }
    }
}

impl<S: TransitionState + 'static> FeatureFunctionFactory for dyn ParserFeatureFunction<S> {
    fn create(descriptor: &FeatureFunctionDescriptor, prefix: &str) -> Result<Box<Self>> {
        let base = FeatureFunctionBase::new(descriptor, prefix);
        let type_name = descriptor.type_name.as_str();
        let locator = match type_name {
            "input" => Some(Locator::Input),
            "stack" => Some(Locator::Stack),
            "head" => Some(Locator::Head),
            _ => None,
        };
        if let Some(locator) = locator {
            if descriptor.features.is_empty() {
                log::error!("locator {} has no nested features", base.name());
                return Err(Error::config(format!(
                    "locator '{}' needs nested features",
                    base.name()
                )));
            }
            let children = descriptor
                .features
                .iter()
                .map(|d| Self::create(d, base.name()))
                .collect::<Result<_>>()?;
            return Ok(Box::new(LocatorFunction {
                base,
                locator,
                children,
            }));
        }

        let property = match TokenProperty::from_name(type_name) {
            Some(property) => property,
            None => {
                log::error!("unknown feature function {}", type_name);
                return Err(Error::config(format!(
                    "unknown feature function '{}'",
                    type_name
                )));
            }
        };
        if !descriptor.features.is_empty() {
            return Err(Error::config(format!(
                "feature '{}' does not take nested features",
                base.name()
            )));
        }
        Ok(Box::new(TokenFunction::<S>::new(base, property)))
    }
}
