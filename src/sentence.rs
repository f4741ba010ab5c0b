/// A token of an input sentence together with its annotations
///
/// On input, `tag`, `head` and `label` carry the gold annotation if there is
/// one; transition states write their predictions back into the same fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Surface form
    pub word: String,
    /// Part-of-speech tag, empty if unknown
    pub tag: String,
    /// Index of the syntactic head, -1 for the root
    pub head: i32,
    /// Dependency label, empty if unknown
    pub label: String,
}

impl Token {
    /// Create an unannotated token
    pub fn new<T: Into<String>>(word: T) -> Self {
        Self {
            word: word.into(),
            tag: String::new(),
            head: -1,
            label: String::new(),
        }
    }

    /// Set the tag (builder pattern)
    pub fn with_tag<T: Into<String>>(mut self, tag: T) -> Self {
        self.tag = tag.into();
        self
    }

    /// Set the head and dependency label (builder pattern)
    pub fn with_head<T: Into<String>>(mut self, head: i32, label: T) -> Self {
        self.head = head;
        self.label = label.into();
        self
    }
}

impl From<&str> for Token {
    fn from(word: &str) -> Self {
        Self::new(word)
    }
}

impl<W: Into<String>, T: Into<String>> From<(W, T)> for Token {
    fn from((word, tag): (W, T)) -> Self {
        Self::new(word).with_tag(tag)
    }
}

/// A sentence: the token sequence a transition system operates on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<Token>,
}

impl Sentence {
    /// Create a sentence from tokens
    pub fn new<T: Into<Token>, I: IntoIterator<Item = T>>(tokens: I) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if the sentence has no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Space-separated surface forms
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
