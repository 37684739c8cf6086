//! `to` target templates.
//!
//! A target is a local path or an absolute URL. References to captures are
//! written `:name`, `:splat`, or `:1`, `:2`, ... for captures by position.
//! The scheme and authority of an absolute URL are copied verbatim, so a
//! port such as `:8080` is never read as a reference.

use crate::rules::pattern::{is_identifier, Captures, SyntaxError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Named(String),
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTemplate {
    tokens: Vec<Token>,
    absolute: bool,
}

impl TargetTemplate {
    pub fn parse(target: &str) -> Result<Self, SyntaxError> {
        let absolute = is_absolute_url(target);
        if !absolute && !target.starts_with('/') {
            return Err(SyntaxError(
                "target must be a '/'-rooted path or an http(s) URL".into(),
            ));
        }

        let body_start = if absolute { authority_end(target) } else { 0 };
        let mut tokens = Vec::new();
        let mut literal = target[..body_start].to_string();

        let body = &target[body_start..];
        let mut rest = body;
        while let Some(colon) = rest.find(':') {
            literal.push_str(&rest[..colon]);
            let after = &rest[colon + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];

            if is_identifier(name) {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(match name.parse::<usize>() {
                    Ok(position) if position > 0 => Token::Position(position),
                    Ok(_) => return Err(SyntaxError("positions start at :1".into())),
                    Err(_) => Token::Named(name.to_string()),
                });
            } else {
                literal.push(':');
            }
            rest = &after[name_len..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self { tokens, absolute })
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Substitute captures. Unknown references render empty; the compiler
    /// rejects them before a template is ever rendered.
    pub fn render(&self, captures: &Captures) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Named(name) => out.push_str(captures.get(name).unwrap_or_default()),
                Token::Position(position) => {
                    out.push_str(captures.nth(*position).unwrap_or_default())
                }
            }
        }
        out
    }
}

pub fn is_absolute_url(target: &str) -> bool {
    let lower = target.get(..8).unwrap_or(target).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Byte offset where the path of an absolute URL begins.
pub(crate) fn authority_end(url: &str) -> usize {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    url[after_scheme..]
        .find(['/', '?', '#'])
        .map(|i| after_scheme + i)
        .unwrap_or(url.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(pairs: &[(&str, &str)]) -> Captures {
        let mut c = Captures::default();
        for (k, v) in pairs {
            c.push(*k, *v);
        }
        c
    }

    #[test]
    fn test_plain_path() {
        let t = TargetTemplate::parse("/ping").unwrap();
        assert_eq!(t.tokens(), &[Token::Literal("/ping".into())]);
        assert_eq!(t.render(&Captures::default()), "/ping");
    }

    #[test]
    fn test_named_and_splat() {
        let t = TargetTemplate::parse("/new/:year/:splat").unwrap();
        let out = t.render(&captures(&[("year", "2024"), ("splat", "a/b/c")]));
        assert_eq!(out, "/new/2024/a/b/c");
    }

    #[test]
    fn test_positional() {
        let t = TargetTemplate::parse("/x/:2/:1").unwrap();
        assert_eq!(t.render(&captures(&[("a", "one"), ("b", "two")])), "/x/two/one");
        assert!(TargetTemplate::parse("/x/:0").is_err());
    }

    #[test]
    fn test_absolute_url_port_is_literal() {
        let t = TargetTemplate::parse("http://localhost:8080/api/:splat").unwrap();
        assert!(t.is_absolute());
        assert_eq!(
            t.tokens(),
            &[
                Token::Literal("http://localhost:8080/api/".into()),
                Token::Named("splat".into())
            ]
        );
    }

    #[test]
    fn test_bare_colon_is_literal() {
        let t = TargetTemplate::parse("/time/12:/x").unwrap();
        assert_eq!(t.render(&Captures::default()), "/time/12:/x");
    }

    #[test]
    fn test_query_references() {
        let t = TargetTemplate::parse("/item?id=:id").unwrap();
        assert_eq!(t.render(&captures(&[("id", "9")])), "/item?id=9");
    }

    #[test]
    fn test_rejects_relative_target() {
        assert!(TargetTemplate::parse("relative/path").is_err());
        assert!(TargetTemplate::parse("").is_err());
    }
}
