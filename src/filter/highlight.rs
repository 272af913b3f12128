//! Stage 3: tokenize fenced code and wrap tokens in classified spans.
//!
//! Looks for `code` elements carrying a `language-<hint>` class (the markdown
//! stage puts them inside `pre`). The text is run through the matching
//! `syntect` grammar and each token that maps to a [`TokenClass`] becomes
//! `span class="token <class>"`; everything else stays plain text.
//!
//! The grammar table is loaded once when the filter is built and only read
//! afterwards, so workers share it without locking. An unknown or missing
//! language hint is not an error: the block passes through untouched (an
//! unknown one is logged at `warn`).

use super::{Filter, FilterError, FilterOutput, PageContext};
use crate::node::{Element, Node, Visit, el};
use std::fmt;
use syntect::easy::ScopeRangeIterator;
use syntect::parsing::{ParseState, ScopeStack, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::warn;

/// Classification attached to a highlighted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Comment,
    String,
    Number,
    Constant,
    Keyword,
    Operator,
    Function,
    Type,
    Tag,
    Attribute,
    Punctuation,
}

impl TokenClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenClass::Comment => "comment",
            TokenClass::String => "string",
            TokenClass::Number => "number",
            TokenClass::Constant => "constant",
            TokenClass::Keyword => "keyword",
            TokenClass::Operator => "operator",
            TokenClass::Function => "function",
            TokenClass::Type => "type",
            TokenClass::Tag => "tag",
            TokenClass::Attribute => "attr-name",
            TokenClass::Punctuation => "punctuation",
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a TextMate scope name (`keyword.control.rust`) to a token class.
///
/// Order matters: the more specific prefixes are checked first.
pub fn classify_scope(scope: &str) -> Option<TokenClass> {
    const RULES: &[(&str, TokenClass)] = &[
        ("comment", TokenClass::Comment),
        ("string", TokenClass::String),
        ("constant.numeric", TokenClass::Number),
        ("constant", TokenClass::Constant),
        ("keyword.operator", TokenClass::Operator),
        ("keyword", TokenClass::Keyword),
        ("storage.type", TokenClass::Keyword),
        ("storage.modifier", TokenClass::Keyword),
        ("entity.name.function", TokenClass::Function),
        ("support.function", TokenClass::Function),
        ("entity.name.tag", TokenClass::Tag),
        ("entity.other.attribute-name", TokenClass::Attribute),
        ("entity.name", TokenClass::Type),
        ("support.type", TokenClass::Type),
        ("support.class", TokenClass::Type),
        ("punctuation", TokenClass::Punctuation),
    ];
    RULES.iter().find_map(|(prefix, class)| {
        let matches = scope == *prefix
            || scope
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.'));
        matches.then_some(*class)
    })
}

pub struct HighlightFilter {
    /// `None` when highlighting is switched off in the config.
    syntaxes: Option<SyntaxSet>,
}

impl HighlightFilter {
    pub fn new(enabled: bool) -> Self {
        Self {
            syntaxes: enabled.then(SyntaxSet::load_defaults_newlines),
        }
    }

    /// The language hint of a `code.language-*` element, if any.
    fn language_of(e: &Element) -> Option<&str> {
        if e.name != "code" {
            return None;
        }
        e.get_attr("class")?
            .split_whitespace()
            .find_map(|c| c.strip_prefix("language-"))
    }

    fn tokenize(syntaxes: &SyntaxSet, lang: &str, code: &str) -> Result<Option<Vec<Node>>, String> {
        let Some(syntax) = syntaxes.find_syntax_by_token(lang) else {
            return Ok(None);
        };

        let mut state = ParseState::new(syntax);
        let mut stack = ScopeStack::new();
        let mut tokens: Vec<(Option<TokenClass>, String)> = Vec::new();

        for line in LinesWithEndings::from(code) {
            let ops = state
                .parse_line(line, syntaxes)
                .map_err(|e| e.to_string())?;
            for (range, op) in ScopeRangeIterator::new(&ops, line) {
                stack.apply(op).map_err(|e| format!("{e:?}"))?;
                if range.is_empty() {
                    continue;
                }
                let class = stack
                    .as_slice()
                    .iter()
                    .rev()
                    .find_map(|scope| classify_scope(&scope.build_string()));
                let text = &line[range];
                match tokens.last_mut() {
                    Some((last, buf)) if *last == class => buf.push_str(text),
                    _ => tokens.push((class, text.to_string())),
                }
            }
        }

        Ok(Some(
            tokens
                .into_iter()
                .map(|(class, text)| match class {
                    Some(class) => el("span")
                        .attr("class", format!("token {class}"))
                        .child(Node::text(text))
                        .into(),
                    None => Node::text(text),
                })
                .collect(),
        ))
    }
}

impl Filter for HighlightFilter {
    fn name(&self) -> &'static str {
        "highlight"
    }

    fn apply(&self, tree: Node, ctx: &mut PageContext) -> Result<FilterOutput, FilterError> {
        let Some(syntaxes) = &self.syntaxes else {
            return Ok(FilterOutput::tree(tree));
        };

        let tree = tree.rewrite(&mut |mut e| {
            let Some(lang) = Self::language_of(&e).map(str::to_string) else {
                return Visit::Descend(e);
            };
            let code = Node::Fragment(e.children.clone()).text_content();
            match Self::tokenize(syntaxes, &lang, &code) {
                Ok(Some(tokens)) => {
                    e.children = tokens;
                    Visit::Replace(e.into())
                }
                Ok(None) => {
                    warn!(page = %ctx.label, lang = %lang, "no grammar for language, left unhighlighted");
                    Visit::Replace(e.into())
                }
                Err(error) => {
                    warn!(page = %ctx.label, lang = %lang, %error, "highlighting failed, left unhighlighted");
                    Visit::Replace(e.into())
                }
            }
        });
        Ok(FilterOutput::tree(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Route;

    fn ctx() -> PageContext {
        PageContext::new(Route::new(["t"]), "T (/t/)")
    }

    fn code_block(lang: Option<&str>, code: &str) -> Node {
        el("pre")
            .child(
                el("code")
                    .attr_opt("class", lang.map(|l| format!("language-{l}")))
                    .child(Node::text(code)),
            )
            .into()
    }

    fn spans(tree: &Node) -> Vec<(String, String)> {
        let mut out = Vec::new();
        tree.walk(&mut |e| {
            if e.name == "span" {
                out.push((
                    e.get_attr("class").unwrap_or_default().to_string(),
                    Node::Element(e.clone()).text_content(),
                ));
            }
        });
        out
    }

    #[test]
    fn classify_prefers_specific_rules() {
        assert_eq!(classify_scope("keyword.operator.rust"), Some(TokenClass::Operator));
        assert_eq!(classify_scope("keyword.control.rust"), Some(TokenClass::Keyword));
        assert_eq!(classify_scope("constant.numeric.integer"), Some(TokenClass::Number));
        assert_eq!(classify_scope("comment"), Some(TokenClass::Comment));
        assert_eq!(classify_scope("stringy"), None);
        assert_eq!(classify_scope("source.rust"), None);
    }

    #[test]
    fn rust_block_gets_keyword_and_string_tokens() {
        let filter = HighlightFilter::new(true);
        let tree = code_block(Some("rust"), "fn main() { let s = \"hi\"; }\n");
        let out = filter.apply(tree, &mut ctx()).unwrap();

        let spans = spans(&out.tree);
        assert!(spans.contains(&("token keyword".to_string(), "fn".to_string())));
        assert!(spans.iter().any(|(c, t)| c == "token string" && t.contains("hi")));
        // Text is preserved exactly, only wrapped.
        assert_eq!(out.tree.text_content(), "fn main() { let s = \"hi\"; }\n");
    }

    #[test]
    fn unknown_language_passes_through() {
        let filter = HighlightFilter::new(true);
        let tree = code_block(Some("no-such-lang"), "x = 1\n");
        let out = filter.apply(tree.clone(), &mut ctx()).unwrap();
        assert_eq!(out.tree, tree);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_language_is_logged_at_warn() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let filter = HighlightFilter::new(true);
            filter
                .apply(code_block(Some("no-such-lang"), "x\n"), &mut ctx())
                .unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("no grammar for language"), "{logs}");
        assert!(logs.contains("no-such-lang"), "{logs}");
    }

    #[test]
    fn missing_hint_passes_through() {
        let filter = HighlightFilter::new(true);
        let tree = code_block(None, "fn main() {}\n");
        let out = filter.apply(tree.clone(), &mut ctx()).unwrap();
        assert_eq!(out.tree, tree);
    }

    #[test]
    fn disabled_filter_is_identity() {
        let filter = HighlightFilter::new(false);
        let tree = code_block(Some("rust"), "fn main() {}\n");
        let out = filter.apply(tree.clone(), &mut ctx()).unwrap();
        assert_eq!(out.tree, tree);
    }

    #[test]
    fn inline_code_is_not_touched() {
        let filter = HighlightFilter::new(true);
        let tree: Node = el("p").child(el("code").child("fn")).into();
        let out = filter.apply(tree.clone(), &mut ctx()).unwrap();
        assert_eq!(out.tree, tree);
    }
}
