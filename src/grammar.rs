//! Incremental JSON grammar state machine.
//!
//! Tracks how far a token-at-a-time output has progressed toward a complete
//! JSON value, and decides whether a candidate next token keeps the output a
//! prefix of some well-formed document. The recursive JSON grammar is
//! flattened into an explicit stack machine: [`GrammarState`] holds the
//! current syntactic [`Mode`] plus a *frontier* — the stack of closing
//! delimiters for every container still open, innermost last.
//!
//! Validity checking and state advancement are two separate operations:
//! [`GrammarState::probe`] is a pure check that returns the successor state
//! without touching the current one (used to evaluate many candidates
//! against the same position), and [`GrammarState::commit`] atomically
//! advances the state for the single chosen token. A rejected token never
//! mutates state.
//!
//! One `GrammarState` is created per generation request and owned
//! exclusively by it; there is no process-wide decoder state.

/// Closing delimiter expected for a currently-open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closer {
    ExpectObjectClose,
    ExpectArrayClose,
}

impl Closer {
    /// The literal closing token this frontier entry matches.
    pub fn token(self) -> &'static str {
        match self {
            Closer::ExpectObjectClose => "}",
            Closer::ExpectArrayClose => "]",
        }
    }
}

/// Syntactic position within the document being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Nothing accepted yet.
    Start,
    /// Directly inside `{`, expecting a key or the closing `}`.
    InObject,
    /// Directly inside `[`, expecting a value or the closing `]`.
    InArray,
    /// An object key was accepted, expecting `:`.
    AfterKey,
    /// A `:` was accepted, expecting a value.
    AfterColon,
    /// A value was completed, expecting `,` or the enclosing closer.
    AfterValue,
    /// Every opened container has been closed; nothing more is accepted.
    Complete,
}

/// Lexical class of a candidate token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    OpenObject,
    CloseObject,
    OpenArray,
    CloseArray,
    Str,
    Literal,
    Number,
    Colon,
    Comma,
}

/// Classify a candidate token, or `None` if it is not a JSON lexeme.
///
/// Model tokenizers attach surrounding whitespace to tokens, so the token is
/// trimmed before classification; JSON permits whitespace between lexemes,
/// which keeps the raw token text safe to append to the output. Strings are
/// recognized by their leading quote (the token model treats a quoted string
/// as one atomic candidate), numbers by a leading digit or `-` digit.
pub fn classify(token: &str) -> Option<TokenClass> {
    let t = token.trim();
    match t {
        "{" => return Some(TokenClass::OpenObject),
        "}" => return Some(TokenClass::CloseObject),
        "[" => return Some(TokenClass::OpenArray),
        "]" => return Some(TokenClass::CloseArray),
        ":" => return Some(TokenClass::Colon),
        "," => return Some(TokenClass::Comma),
        "true" | "false" | "null" => return Some(TokenClass::Literal),
        _ => {}
    }

    let mut chars = t.chars();
    match chars.next() {
        Some('"') => Some(TokenClass::Str),
        Some(c) if c.is_ascii_digit() => Some(TokenClass::Number),
        Some('-') if chars.next().is_some_and(|c| c.is_ascii_digit()) => Some(TokenClass::Number),
        _ => None,
    }
}

/// Position of an in-progress JSON document.
///
/// Fresh states begin at [`Mode::Start`] with an empty frontier. The
/// frontier is empty exactly when the mode is `Start` or `Complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarState {
    mode: Mode,
    frontier: Vec<Closer>,
    has_content: bool,
}

impl Default for GrammarState {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Start,
            frontier: Vec::new(),
            has_content: false,
        }
    }

    #[allow(dead_code)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.frontier.len()
    }

    /// Innermost expected closer, if any container is open.
    pub fn frontier_top(&self) -> Option<Closer> {
        self.frontier.last().copied()
    }

    /// True once any opening delimiter has been accepted.
    pub fn has_content(&self) -> bool {
        self.has_content
    }

    /// True iff at least one container was opened and all have been closed.
    pub fn is_complete(&self) -> bool {
        self.has_content
            && self.frontier.is_empty()
            && matches!(self.mode, Mode::Start | Mode::Complete)
    }

    /// Pure validity probe: the successor state if `token` is grammar-valid
    /// here, `None` otherwise. Never mutates `self`.
    pub fn probe(&self, token: &str) -> Option<GrammarState> {
        let class = classify(token)?;
        self.step(class)
    }

    /// Atomic check-and-advance: applies the transition for `token` iff it
    /// is grammar-valid, returning whether it was accepted. State is
    /// untouched for rejected tokens.
    pub fn commit(&mut self, token: &str) -> bool {
        match self.probe(token) {
            Some(next) => {
                *self = next;
                true
            }
            None => false,
        }
    }

    fn step(&self, class: TokenClass) -> Option<GrammarState> {
        use TokenClass::*;

        let mut next = self.clone();
        match (self.mode, class) {
            (Mode::Start, OpenObject) => next.open(Closer::ExpectObjectClose, Mode::InObject),
            (Mode::Start, OpenArray) => next.open(Closer::ExpectArrayClose, Mode::InArray),

            (Mode::InObject, CloseObject) | (Mode::AfterValue, CloseObject) => {
                next.close(Closer::ExpectObjectClose)?
            }
            (Mode::InArray, CloseArray) | (Mode::AfterValue, CloseArray) => {
                next.close(Closer::ExpectArrayClose)?
            }

            (Mode::InObject, Str) => next.mode = Mode::AfterKey,
            (Mode::AfterKey, Colon) => next.mode = Mode::AfterColon,

            (Mode::InArray, OpenObject) | (Mode::AfterColon, OpenObject) => {
                next.open(Closer::ExpectObjectClose, Mode::InObject)
            }
            (Mode::InArray, OpenArray) | (Mode::AfterColon, OpenArray) => {
                next.open(Closer::ExpectArrayClose, Mode::InArray)
            }
            (Mode::InArray, Str | Literal | Number) | (Mode::AfterColon, Str | Literal | Number) => {
                next.mode = Mode::AfterValue
            }

            (Mode::AfterValue, Comma) => match next.frontier.last() {
                Some(Closer::ExpectObjectClose) => next.mode = Mode::InObject,
                Some(Closer::ExpectArrayClose) => next.mode = Mode::InArray,
                None => return None,
            },

            _ => return None,
        }
        Some(next)
    }

    fn open(&mut self, closer: Closer, mode: Mode) {
        self.frontier.push(closer);
        self.mode = mode;
        self.has_content = true;
    }

    fn close(&mut self, expected: Closer) -> Option<()> {
        if self.frontier.last() != Some(&expected) {
            return None;
        }
        self.frontier.pop();
        self.mode = if self.frontier.is_empty() {
            Mode::Complete
        } else {
            Mode::AfterValue
        };
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept_all(state: &mut GrammarState, tokens: &[&str]) {
        for t in tokens {
            assert!(state.commit(t), "token {:?} rejected in {:?}", t, state);
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("{"), Some(TokenClass::OpenObject));
        assert_eq!(classify(" }"), Some(TokenClass::CloseObject));
        assert_eq!(classify("\"name\""), Some(TokenClass::Str));
        assert_eq!(classify("true"), Some(TokenClass::Literal));
        assert_eq!(classify("42"), Some(TokenClass::Number));
        assert_eq!(classify("3.14"), Some(TokenClass::Number));
        assert_eq!(classify("-12"), Some(TokenClass::Number));
        assert_eq!(classify("-"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("   "), None);
        assert_eq!(classify("foo"), None);
    }

    #[test]
    fn test_empty_object() {
        let mut state = GrammarState::new();
        assert!(!state.is_complete());
        accept_all(&mut state, &["{", "}"]);
        assert!(state.is_complete());
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn test_object_with_pairs() {
        let mut state = GrammarState::new();
        accept_all(
            &mut state,
            &["{", "\"name\"", ":", "\"Ada\"", ",", "\"age\"", ":", "36", "}"],
        );
        assert!(state.is_complete());
    }

    #[test]
    fn test_nested_containers() {
        let mut state = GrammarState::new();
        accept_all(&mut state, &["[", "{", "\"a\""]);
        assert_eq!(state.depth(), 2);
        assert_eq!(state.frontier_top(), Some(Closer::ExpectObjectClose));
        accept_all(&mut state, &[":", "[", "1", ",", "2", "]"]);
        assert_eq!(state.mode(), Mode::AfterValue);
        accept_all(&mut state, &["}", ",", "null", "]"]);
        assert!(state.is_complete());
    }

    #[test]
    fn test_opening_delimiter_enters_container_mode() {
        // `[ {` must expect a key next, not a comma.
        let mut state = GrammarState::new();
        accept_all(&mut state, &["[", "{"]);
        assert_eq!(state.mode(), Mode::InObject);
        assert!(!state.commit(","));
        assert!(state.commit("\"k\""));
    }

    #[test]
    fn test_probe_does_not_mutate() {
        let mut state = GrammarState::new();
        accept_all(&mut state, &["{"]);
        let before = state.clone();
        assert!(state.probe("}").is_some());
        assert!(state.probe("\"key\"").is_some());
        assert!(state.probe(",").is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn test_rejected_commit_leaves_state_untouched() {
        let mut state = GrammarState::new();
        accept_all(&mut state, &["{"]);
        let before = state.clone();
        assert!(!state.commit(","));
        assert!(!state.commit("]"));
        assert!(!state.commit("true"));
        assert_eq!(state, before);
    }

    #[test]
    fn test_rejections() {
        let mut state = GrammarState::new();
        // No scalars or closers at top level.
        assert!(state.probe("true").is_none());
        assert!(state.probe("\"str\"").is_none());
        assert!(state.probe("}").is_none());

        accept_all(&mut state, &["{", "\"k\""]);
        // Key must be followed by a colon.
        assert!(state.probe("}").is_none());
        assert!(state.probe(",").is_none());

        accept_all(&mut state, &[":", "1"]);
        // Mismatched closer.
        assert!(state.probe("]").is_none());
        assert!(state.probe(":").is_none());
    }

    #[test]
    fn test_nothing_accepted_after_complete() {
        let mut state = GrammarState::new();
        accept_all(&mut state, &["[", "]"]);
        assert!(state.is_complete());
        for t in ["{", "[", ",", "\"x\"", "1", "]"] {
            assert!(state.probe(t).is_none(), "token {:?} accepted after complete", t);
        }
    }

    #[test]
    fn test_whitespace_prefixed_tokens() {
        let mut state = GrammarState::new();
        accept_all(&mut state, &[" {", " \"a\"", " :", " 1", " }"]);
        assert!(state.is_complete());
    }

    #[test]
    fn test_frontier_depth_bounded_by_token_count() {
        let tokens = ["{", "\"a\"", ":", "[", "[", "{", "\"b\"", ":", "1", "}", "]", "]", "}"];
        let mut state = GrammarState::new();
        for (i, t) in tokens.iter().enumerate() {
            assert!(state.commit(t));
            assert!(state.depth() <= i + 1);
        }
        assert!(state.is_complete());
    }
}
