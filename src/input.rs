//! Source-side input: a tokenized sentence.
//!
//! The core treats the sentence as read-only. Tokens carry a punctuation
//! flag so the search can enforce the monotone-at-punctuation reordering
//! constraint without re-deriving token classes.

/// A single source token.
#[derive(Debug, Clone)]
pub struct Token {
    /// Surface form of the token
    pub surface: String,
    /// Whether the token is punctuation (reordering barrier when
    /// `monotone_at_punctuation` is enabled)
    pub is_punctuation: bool,
}

impl Token {
    pub fn new(surface: impl Into<String>) -> Self {
        let surface = surface.into();
        let is_punctuation =
            !surface.is_empty() && surface.chars().all(|c| c.is_ascii_punctuation());
        Self {
            surface,
            is_punctuation,
        }
    }
}

/// A tokenized source sentence.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    tokens: Vec<Token>,
}

impl Sentence {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Build a sentence from whitespace-free word strings, classifying
    /// punctuation automatically.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: words.into_iter().map(Token::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, pos: usize) -> &Token {
        &self.tokens[pos]
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Source surfaces over `[start, end]`, space-joined. Used as the
    /// phrase-table lookup key by the in-memory table.
    pub fn surface_range(&self, start: usize, end: usize) -> String {
        self.tokens[start..=end]
            .iter()
            .map(|t| t.surface.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
