//! Generic feature extraction framework.
//!
//! A feature template is parsed into a descriptor tree, and every node of the
//! tree is instantiated as a feature function. Leaf functions own one
//! [`FeatureType`] each; composite functions own none and report the types of
//! their children instead. Once all functions are initialized the extractor
//! numbers every type it can reach, in declaration order, and checks that the
//! type list matches the function names reported by a separate pass.

use std::collections::HashSet;

use crate::descriptor::{FeatureExtractorDescriptor, FeatureFunctionDescriptor};
use crate::errors::{Error, Result};
use crate::feature_types::{FeatureType, FeatureValue, NONE};
use crate::fml;
use crate::task_context::TaskContext;

/// State shared by all feature functions: descriptor, name and owned type
#[derive(Debug, Clone)]
pub struct FeatureFunctionBase {
    descriptor: FeatureFunctionDescriptor,
    prefix: String,
    name: String,
    feature_type: Option<FeatureType>,
}

impl FeatureFunctionBase {
    /// Create the base of the function described by `descriptor`
    ///
    /// The function is named `prefix.spec`, or just `spec` without a prefix,
    /// unless the descriptor carries an alias.
    pub fn new(descriptor: &FeatureFunctionDescriptor, prefix: &str) -> Self {
        let name = match &descriptor.name {
            Some(alias) => alias.clone(),
            None if prefix.is_empty() => descriptor.spec(),
            None => format!("{}.{}", prefix, descriptor.spec()),
        };
        Self {
            descriptor: descriptor.clone(),
            prefix: prefix.to_string(),
            name,
            feature_type: None,
        }
    }

    pub fn descriptor(&self) -> &FeatureFunctionDescriptor {
        &self.descriptor
    }

    /// Name of the enclosing function, empty at top level
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The positional argument of the function
    pub fn argument(&self) -> i32 {
        self.descriptor.argument
    }

    /// Get a parameter value, or an empty string if it is not given
    ///
    /// The first parameter with a matching name wins.
    pub fn get_parameter(&self, name: &str) -> &str {
        self.descriptor
            .parameters
            .iter()
            .find(|p| p.name == name)
            .map_or("", |p| p.value.as_str())
    }

    /// Get an integer parameter, or `default` if it is missing or malformed
    pub fn get_int_parameter(&self, name: &str, default: i32) -> i32 {
        self.get_parameter(name).trim().parse().unwrap_or(default)
    }

    /// The type owned by this function
    pub fn feature_type(&self) -> Option<&FeatureType> {
        self.feature_type.as_ref()
    }

    pub fn feature_type_mut(&mut self) -> Option<&mut FeatureType> {
        self.feature_type.as_mut()
    }

    /// Give this function ownership of `feature_type`, replacing any previous one
    pub fn set_feature_type(&mut self, feature_type: FeatureType) {
        self.feature_type = Some(feature_type);
    }
}

/// A named, parameterized feature computation
///
/// Evaluation is left to the domain-specific sub-traits; this trait covers
/// naming, parameters, lifecycle and type reporting.
pub trait GenericFeatureFunction {
    fn base(&self) -> &FeatureFunctionBase;

    fn base_mut(&mut self) -> &mut FeatureFunctionBase;

    /// Declare the task inputs this function reads
    fn setup(&mut self, _context: &mut TaskContext) {}

    /// Load resources and create the owned feature type, if any
    fn init(&mut self, _context: &TaskContext) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Append the types this function reports
    ///
    /// Leaves report their owned type; composites override this to report
    /// the types of their children.
    fn feature_types<'a>(&'a self, types: &mut Vec<&'a FeatureType>) {
        if let Some(feature_type) = self.base().feature_type() {
            types.push(feature_type);
        }
    }

    /// Mutable counterpart of [`feature_types`](GenericFeatureFunction::feature_types)
    fn feature_types_mut<'a>(&'a mut self, types: &mut Vec<&'a mut FeatureType>) {
        if let Some(feature_type) = self.base_mut().feature_type_mut() {
            types.push(feature_type);
        }
    }

    /// The single type of this function, `None` if it reports zero or several
    fn feature_type(&self) -> Option<&FeatureType> {
        let mut types = Vec::new();
        self.feature_types(&mut types);
        if types.len() == 1 {
            types.pop()
        } else {
            None
        }
    }

    /// Append the names of the types this function reports
    ///
    /// Computed independently of the types themselves: a leaf reports its
    /// own name, composites override this to report their children's.
    fn feature_type_names(&self, names: &mut Vec<String>) {
        names.push(self.name().to_string());
    }
}

/// Instantiation of feature functions from descriptors
///
/// Implemented on the trait object type of a feature function family, e.g.
/// `dyn ParserFeatureFunction<S>`, which acts as the name registry of that
/// family.
pub trait FeatureFunctionFactory {
    /// Create the function described by `descriptor`, named under `prefix`
    fn create(descriptor: &FeatureFunctionDescriptor, prefix: &str) -> Result<Box<Self>>;
}

/// Feature values of one extraction, as `(type base, value)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureVector {
    features: Vec<(usize, FeatureValue)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value of `feature_type`; [`NONE`] values are dropped
    pub fn add(&mut self, feature_type: &FeatureType, value: FeatureValue) {
        if value != NONE {
            self.features.push((feature_type.base(), value));
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn clear(&mut self) {
        self.features.clear();
    }

    /// Iterate over the `(type base, value)` pairs in extraction order
    pub fn iter(&self) -> impl Iterator<Item = (usize, FeatureValue)> + '_ {
        self.features.iter().copied()
    }

    /// Value of the first feature with the given type base
    pub fn value(&self, base: usize) -> Option<FeatureValue> {
        self.features
            .iter()
            .find(|&&(b, _)| b == base)
            .map(|&(_, value)| value)
    }
}

/// A compiled feature template
///
/// Owns the feature functions instantiated from the template and aggregates
/// their types. Lifecycle: [`parse`](Self::parse), [`setup`](Self::setup),
/// [`init`](Self::init).
pub struct GenericFeatureExtractor<F: ?Sized> {
    descriptor: FeatureExtractorDescriptor,
    functions: Vec<Box<F>>,
    num_feature_types: usize,
}

impl<F: ?Sized> Default for GenericFeatureExtractor<F> {
    fn default() -> Self {
        Self {
            descriptor: FeatureExtractorDescriptor::default(),
            functions: Vec::new(),
            num_feature_types: 0,
        }
    }
}

impl<F> GenericFeatureExtractor<F>
where
    F: ?Sized + GenericFeatureFunction + FeatureFunctionFactory,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a feature template and instantiate its functions
    pub fn parse(&mut self, source: &str) -> Result<()> {
        let descriptor = fml::parse(source)?;
        self.set_descriptor(descriptor)
    }

    /// Instantiate the functions of an already parsed template
    pub fn set_descriptor(&mut self, descriptor: FeatureExtractorDescriptor) -> Result<()> {
        self.functions = descriptor
            .features
            .iter()
            .map(|d| F::create(d, ""))
            .collect::<Result<_>>()?;
        self.descriptor = descriptor;
        self.num_feature_types = 0;
        Ok(())
    }

    pub fn setup(&mut self, context: &mut TaskContext) {
        for function in self.functions.iter_mut() {
            function.setup(context);
        }
    }

    /// Initialize all functions, then number and validate the feature types
    pub fn init(&mut self, context: &TaskContext) -> Result<()> {
        for function in self.functions.iter_mut() {
            function.init(context)?;
        }
        self.initialize_feature_types()
    }

    fn initialize_feature_types(&mut self) -> Result<()> {
        let mut types: Vec<&mut FeatureType> = Vec::new();
        for function in self.functions.iter_mut() {
            function.feature_types_mut(&mut types);
        }
        for (base, feature_type) in types.iter_mut().enumerate() {
            feature_type.set_base(base);
            let domain_size = feature_type.domain_size();
            log::debug!(
                "feature type {} has base {} and domain size {}",
                feature_type.name(),
                base,
                domain_size
            );
            if domain_size < 0 {
                log::error!(
                    "feature type {} has negative domain size {}",
                    feature_type.name(),
                    domain_size
                );
                return Err(Error::config(format!(
                    "feature type '{}' has negative domain size {}",
                    feature_type.name(),
                    domain_size
                )));
            }
        }
        let num_types = types.len();

        let names = self.feature_type_names();
        if names.len() != num_types {
            log::error!(
                "{} feature types but {} feature type names: {}",
                num_types,
                names.len(),
                names.join(" ")
            );
            return Err(Error::config(format!(
                "{} feature types registered but {} names reported",
                num_types,
                names.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
            log::error!("duplicate feature type name {}", duplicate);
            return Err(Error::config(format!(
                "duplicate feature type name '{}'",
                duplicate
            )));
        }
        self.num_feature_types = num_types;
        Ok(())
    }

    /// The template this extractor was built from
    pub fn descriptor(&self) -> &FeatureExtractorDescriptor {
        &self.descriptor
    }

    /// The top-level feature functions
    pub fn functions(&self) -> &[Box<F>] {
        &self.functions
    }

    /// All feature types in base order
    pub fn feature_types(&self) -> Vec<&FeatureType> {
        let mut types = Vec::new();
        for function in &self.functions {
            function.feature_types(&mut types);
        }
        types
    }

    /// Number of feature types, 0 before initialization
    pub fn num_feature_types(&self) -> usize {
        self.num_feature_types
    }

    /// Largest domain size of any type times the number of types
    ///
    /// An upper bound on the number of distinct feature values, not a tight
    /// packing.
    pub fn domain_size(&self) -> FeatureValue {
        let types = self.feature_types();
        let max = types.iter().map(|t| t.domain_size()).max().unwrap_or(0);
        max * types.len() as FeatureValue
    }

    /// Names of all feature types in declaration order
    pub fn feature_type_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for function in &self.functions {
            function.feature_type_names(&mut names);
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Leaf with a numeric type of size `size`; `silent` leaves create none
    struct Constant {
        base: FeatureFunctionBase,
    }

    /// Composite reporting the types of its children
    struct Group {
        base: FeatureFunctionBase,
        children: Vec<Box<dyn GenericFeatureFunction>>,
    }

    impl GenericFeatureFunction for Constant {
        fn base(&self) -> &FeatureFunctionBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut FeatureFunctionBase {
            &mut self.base
        }

        fn init(&mut self, _context: &TaskContext) -> Result<()> {
            if self.base.descriptor().type_name != "silent" {
                let size = self.base.get_int_parameter("size", 1);
                let feature_type = FeatureType::numeric(self.name(), size as FeatureValue);
                self.base.set_feature_type(feature_type);
            }
            Ok(())
        }
    }

    impl GenericFeatureFunction for Group {
        fn base(&self) -> &FeatureFunctionBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut FeatureFunctionBase {
            &mut self.base
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

    impl FeatureFunctionFactory for dyn GenericFeatureFunction {
        fn create(descriptor: &FeatureFunctionDescriptor, prefix: &str) -> Result<Box<Self>> {
            let base = FeatureFunctionBase::new(descriptor, prefix);
            match descriptor.type_name.as_str() {
                "constant" | "silent" => Ok(Box::new(Constant { base })),
                "group" => {
                    let children = descriptor
                        .features
                        .iter()
                        .map(|d| Self::create(d, base.name()))
                        .collect::<Result<_>>()?;
                    Ok(Box::new(Group { base, children }))
                }
                other => Err(Error::config(format!("unknown feature function '{}'", other))),
            }
        }
    }

    type Extractor = GenericFeatureExtractor<dyn GenericFeatureFunction>;

    fn build(source: &str) -> Result<Extractor> {
        let mut extractor = Extractor::new();
        extractor.parse(source)?;
        let mut context = TaskContext::new();
        extractor.setup(&mut context);
        extractor.init(&context)?;
        Ok(extractor)
    }

    #[test]
    fn test_parameters() {
        let descriptor = FeatureFunctionDescriptor::new("constant")
            .with_parameter("stride", "2")
            .with_parameter("stride", "3")
            .with_parameter("name", "two")
            .with_parameter("padded", " 4 ");
        let base = FeatureFunctionBase::new(&descriptor, "");
        assert_eq!(base.get_parameter("stride"), "2");
        assert_eq!(base.get_parameter("missing"), "");
        assert_eq!(base.get_int_parameter("stride", 1), 2);
        assert_eq!(base.get_int_parameter("missing", 5), 5);
        assert_eq!(base.get_int_parameter("name", 7), 7);
        assert_eq!(base.get_int_parameter("padded", 0), 4);
    }

    #[test]
    fn test_function_names() {
        let descriptor = FeatureFunctionDescriptor::new("constant").with_argument(2);
        assert_eq!(FeatureFunctionBase::new(&descriptor, "").name(), "constant(2)");
        assert_eq!(
            FeatureFunctionBase::new(&descriptor, "group").name(),
            "group.constant(2)"
        );
        let aliased = descriptor.with_name("c2");
        let base = FeatureFunctionBase::new(&aliased, "group");
        assert_eq!(base.name(), "c2");
        assert_eq!(base.prefix(), "group");
        assert_eq!(base.argument(), 2);
    }

    #[test]
    fn test_bases_and_domain_size() {
        let extractor =
            build("constant(size=3) group { constant(1,size=7) constant(2,size=2) }").unwrap();
        assert_eq!(extractor.num_feature_types(), 3);
        let types = extractor.feature_types();
        let bases: Vec<usize> = types.iter().map(|t| t.base()).collect();
        assert_eq!(bases, vec![0, 1, 2]);
        assert_eq!(extractor.domain_size(), 21);
        assert_eq!(
            extractor.feature_type_names(),
            vec!["constant(size=3)", "group.constant(1,size=7)", "group.constant(2,size=2)"]
        );
        let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
        assert_eq!(names, extractor.feature_type_names());
    }

    #[test]
    fn test_single_feature_type() {
        let extractor = build("constant group { constant:a constant:b } group").unwrap();
        let functions = extractor.functions();
        assert!(functions[0].feature_type().is_some());
        assert!(functions[1].feature_type().is_none());
        assert!(functions[2].feature_type().is_none());
        assert_eq!(extractor.domain_size(), 3);
    }

    #[test]
    fn test_empty_extractor() {
        let extractor = build("").unwrap();
        assert_eq!(extractor.num_feature_types(), 0);
        assert_eq!(extractor.domain_size(), 0);
        assert!(extractor.feature_type_names().is_empty());

        let unused = build("constant(size=0)").unwrap();
        assert_eq!(unused.domain_size(), 0);
    }

    #[test]
    fn test_negative_domain_size() {
        let err = build("constant:ok constant(size=-1):broken").err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_name_count_mismatch() {
        let err = build("constant silent").err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_names() {
        let err = build("constant:x group { constant:x }").err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_unknown_function() {
        let mut extractor = Extractor::new();
        let err = extractor.parse("constant bogus").unwrap_err();
        assert!(err.is_configuration());
        assert!(extractor.parse("constant(").is_err());
    }

    #[test]
    fn test_feature_vector() {
        let mut a = FeatureType::numeric("a", 3);
        a.set_base(0);
        let mut b = FeatureType::numeric("b", 3);
        b.set_base(1);
        let mut features = FeatureVector::new();
        features.add(&a, 2);
        features.add(&b, NONE);
        features.add(&b, 0);
        assert_eq!(features.len(), 2);
        assert_eq!(features.iter().collect::<Vec<_>>(), vec![(0, 2), (1, 0)]);
        assert_eq!(features.value(1), Some(0));
        features.clear();
        assert!(features.is_empty());
    }
}
