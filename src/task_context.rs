use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

/// A named input of a task, backed by one or more files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    /// Logical input name, e.g. `tag-map`
    pub name: String,
    /// Record format of the backing files, e.g. `text` or `cqdb`
    pub record_format: String,
    /// File patterns backing the input
    pub file_patterns: Vec<String>,
}

impl TaskInput {
    /// Create an input without backing files
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            record_format: String::new(),
            file_patterns: Vec::new(),
        }
    }
}

/// Task configuration: named inputs and string parameters
///
/// Transition systems and feature functions declare the inputs they need
/// during setup and resolve them to files during initialization.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    inputs: Vec<TaskInput>,
    parameters: HashMap<String, String>,
}

impl TaskContext {
    /// Create an empty task context
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a task context from its text form
    ///
    /// Each non-empty line is either `input <name>[:<format>] = <path>[,<path>...]`
    /// or `param <name> = <value>`. Text after `#` is ignored.
    pub fn parse(source: &str) -> Result<Self> {
        let mut context = Self::new();
        let mut offset = 0;
        for raw in source.split_inclusive('\n') {
            let position = offset;
            offset += raw.len();
            let line = match raw.find('#') {
                Some(i) => &raw[..i],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let parse_error = |message: &str| Error::Parse {
                position,
                message: message.to_string(),
            };
            let (kind, rest) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| parse_error("expected 'input' or 'param' declaration"))?;
            let (key, value) = rest
                .split_once('=')
                .ok_or_else(|| parse_error("expected '='"))?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(parse_error("missing name"));
            }
            match kind {
                "input" => {
                    let (name, format) = match key.split_once(':') {
                        Some((name, format)) => (name.trim(), format.trim()),
                        None => (key, ""),
                    };
                    let input = context.get_input(name);
                    input.record_format = format.to_string();
                    input.file_patterns = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect();
                }
                "param" => context.set_parameter(key, value),
                _ => return Err(parse_error("expected 'input' or 'param' declaration")),
            }
        }
        Ok(context)
    }

    /// Read and parse a task context file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::parse(&source)
    }

    /// Get an input by name, creating an empty one if it does not exist
    pub fn get_input(&mut self, name: &str) -> &mut TaskInput {
        let index = match self.inputs.iter().position(|input| input.name == name) {
            Some(i) => i,
            None => {
                self.inputs.push(TaskInput::new(name));
                self.inputs.len() - 1
            }
        };
        &mut self.inputs[index]
    }

    /// Get an input by name
    pub fn input(&self, name: &str) -> Option<&TaskInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Register an input backed by a single file
    pub fn add_input<P: AsRef<Path>>(&mut self, name: &str, record_format: &str, path: P) {
        let input = self.get_input(name);
        input.record_format = record_format.to_string();
        input.file_patterns = vec![path.as_ref().to_string_lossy().into_owned()];
    }

    /// Resolve an input to its single backing file
    pub fn input_file(&self, name: &str) -> Result<PathBuf> {
        let input = self
            .input(name)
            .ok_or_else(|| Error::config(format!("no input named '{}'", name)))?;
        match input.file_patterns.as_slice() {
            [path] => Ok(PathBuf::from(path)),
            [] => Err(Error::config(format!("no file for input '{}'", name))),
            _ => Err(Error::config(format!(
                "input '{}' must be backed by a single file",
                name
            ))),
        }
    }

    /// Set a parameter
    pub fn set_parameter(&mut self, name: &str, value: &str) {
        self.parameters.insert(name.to_string(), value.to_string());
    }

    /// Get a parameter, or an empty string if it is not set
    pub fn get_parameter(&self, name: &str) -> &str {
        self.parameters.get(name).map_or("", String::as_str)
    }

    /// Get an integer parameter, or `default` if it is missing or malformed
    pub fn get_int_parameter(&self, name: &str, default: i32) -> i32 {
        self.get_parameter(name).trim().parse().unwrap_or(default)
    }

    /// Get a boolean parameter, or `default` if it is missing or malformed
    pub fn get_bool_parameter(&self, name: &str, default: bool) -> bool {
        match self.get_parameter(name).trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        }
    }
}
