use std::fmt;

/// A named string parameter of a feature function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One node of a parsed feature template
///
/// Renders back to template text through [`Display`](fmt::Display).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFunctionDescriptor {
    /// Registered name of the feature function, e.g. `input`
    pub type_name: String,
    /// Alias replacing the computed function name
    pub name: Option<String>,
    /// Positional argument, 0 if not given
    pub argument: i32,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Nested feature functions
    pub features: Vec<FeatureFunctionDescriptor>,
}

impl FeatureFunctionDescriptor {
    pub fn new<T: Into<String>>(type_name: T) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Set the positional argument (builder pattern)
    pub fn with_argument(mut self, argument: i32) -> Self {
        self.argument = argument;
        self
    }

    /// Append a parameter (builder pattern)
    pub fn with_parameter<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    /// Set the alias (builder pattern)
    pub fn with_name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a nested feature (builder pattern)
    pub fn with_feature(mut self, feature: FeatureFunctionDescriptor) -> Self {
        self.features.push(feature);
        self
    }

    /// The function call part of the template, e.g. `input(1)` or `length(max=5)`
    pub fn spec(&self) -> String {
        let mut args = Vec::new();
        if self.argument != 0 {
            args.push(self.argument.to_string());
        }
        for p in &self.parameters {
            args.push(format!("{}={}", p.name, quote(&p.value)));
        }
        if args.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}({})", self.type_name, args.join(","))
        }
    }
}

/// Quote a parameter value unless it is a plain token
fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| !c.is_whitespace() && !"(),=\"{}:".contains(c));
    if plain {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl fmt::Display for FeatureFunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec())?;
        if let Some(name) = &self.name {
            write!(f, ":{}", name)?;
        }
        match self.features.as_slice() {
            [] => Ok(()),
            [child] => write!(f, ".{}", child),
            children => {
                f.write_str(" {")?;
                for child in children {
                    write!(f, " {}", child)?;
                }
                f.write_str(" }")
            }
        }
    }
}

/// A parsed feature template: the top-level feature functions of an extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureExtractorDescriptor {
    pub features: Vec<FeatureFunctionDescriptor>,
}

impl fmt::Display for FeatureExtractorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, feature) in self.features.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", feature)?;
        }
        Ok(())
    }
}
