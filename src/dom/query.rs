//! A CSS selector subset: what captured selectors and the built-in
//! heuristics need, matched right-to-left against any [`Document`].
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `~=`, `^=`, `$=`, `*=`), `:nth-child(N)`,
//! `:nth-of-type(N)`, `:first-child`, `:last-child`, the descendant and `>`
//! combinators, and comma-separated lists.

use super::{document_order, Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unexpected '{found}' at offset {offset} in selector '{selector}'")]
    Unexpected {
        selector: String,
        found: char,
        offset: usize,
    },
    #[error("Unexpected end of selector '{0}'")]
    UnexpectedEnd(String),
    #[error("Unsupported pseudo-class ':{0}'")]
    UnsupportedPseudo(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Id(String),
    Class(String),
    Attr { name: String, op: AttrOp, value: String },
    NthChild(usize),
    NthOfType(usize),
    LastChild,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    // combinators[i] joins compounds[i] and compounds[i + 1]
    combinators: Vec<Combinator>,
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(Vec<Complex>);

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        Parser::new(selector).parse_list()
    }

    pub fn matches<D: Document + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        self.0
            .iter()
            .any(|c| matches_complex(doc, node, c, c.compounds.len() - 1))
    }

    /// All matching elements in document order, without duplicates.
    pub fn select_all<D: Document + ?Sized>(&self, doc: &D) -> Vec<NodeId> {
        document_order(doc)
            .into_iter()
            .filter(|n| self.matches(doc, *n))
            .collect()
    }
}

/// Escape an identifier for use after `#` or `.`, in the manner of `CSS.escape`.
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, c) in ident.chars().enumerate() {
        let leading_digit = c.is_ascii_digit()
            && (i == 0 || (i == 1 && ident.starts_with('-')));
        if leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

// ── Matching ────────────────────────────────────────────────────────────

fn matches_complex<D: Document + ?Sized>(
    doc: &D,
    node: NodeId,
    complex: &Complex,
    idx: usize,
) -> bool {
    if !matches_compound(doc, node, &complex.compounds[idx]) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match complex.combinators[idx - 1] {
        Combinator::Child => doc
            .parent(node)
            .is_some_and(|p| matches_complex(doc, p, complex, idx - 1)),
        Combinator::Descendant => {
            let mut current = doc.parent(node);
            while let Some(p) = current {
                if matches_complex(doc, p, complex, idx - 1) {
                    return true;
                }
                current = doc.parent(p);
            }
            false
        }
    }
}

fn matches_compound<D: Document + ?Sized>(doc: &D, node: NodeId, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if doc.tag_name(node) != tag {
            return false;
        }
    }
    compound.filters.iter().all(|f| matches_filter(doc, node, f))
}

fn matches_filter<D: Document + ?Sized>(doc: &D, node: NodeId, filter: &Filter) -> bool {
    match filter {
        Filter::Id(id) => doc.attribute(node, "id") == Some(id.as_str()),
        Filter::Class(class) => doc.class_list(node).contains(&class.as_str()),
        Filter::Attr { name, op, value } => {
            let Some(actual) = doc.attribute(node, name) else {
                return false;
            };
            match op {
                AttrOp::Exists => true,
                AttrOp::Equals => actual == value,
                AttrOp::Includes => actual.split_whitespace().any(|t| t == value),
                AttrOp::Prefix => !value.is_empty() && actual.starts_with(value.as_str()),
                AttrOp::Suffix => !value.is_empty() && actual.ends_with(value.as_str()),
                AttrOp::Substring => !value.is_empty() && actual.contains(value.as_str()),
            }
        }
        Filter::NthChild(n) => sibling_position(doc, node, false) == Some(*n),
        Filter::NthOfType(n) => sibling_position(doc, node, true) == Some(*n),
        Filter::LastChild => doc
            .parent(node)
            .is_some_and(|p| doc.children(p).last() == Some(&node)),
    }
}

/// 1-based position among the parent's children (optionally only same-tag ones).
pub(crate) fn sibling_position<D: Document + ?Sized>(
    doc: &D,
    node: NodeId,
    same_tag: bool,
) -> Option<usize> {
    let parent = doc.parent(node)?;
    let tag = doc.tag_name(node);
    doc.children(parent)
        .into_iter()
        .filter(|c| !same_tag || doc.tag_name(*c) == tag)
        .position(|c| c == node)
        .map(|i| i + 1)
}

// ── Parsing ─────────────────────────────────────────────────────────────

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                selector: self.source.to_string(),
                found,
                offset: self.pos,
            },
            None => SelectorError::UnexpectedEnd(self.source.to_string()),
        }
    }

    fn expect(&mut self, want: char) -> Result<(), SelectorError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_list(mut self) -> Result<SelectorList, SelectorError> {
        if self.source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut list = Vec::new();
        loop {
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                }
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(SelectorList(list))
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        self.skip_ws();
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut any = false;
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                any = true;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
                any = true;
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.filters.push(Filter::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    compound.filters.push(Filter::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    compound.filters.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.filters.push(self.parse_pseudo()?);
                }
                _ => break,
            }
            any = true;
        }
        if any {
            Ok(compound)
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.parse_escape()?);
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.unexpected())
        } else {
            Ok(out)
        }
    }

    // Called with the backslash already consumed.
    fn parse_escape(&mut self) -> Result<char, SelectorError> {
        let Some(first) = self.peek() else {
            return Err(self.unexpected());
        };
        if !first.is_ascii_hexdigit() {
            self.pos += 1;
            return Ok(first);
        }
        let mut hex = String::new();
        while hex.len() < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            hex.push(self.bump().unwrap_or_default());
        }
        if self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.unexpected())
    }

    fn parse_attr(&mut self) -> Result<Filter, SelectorError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(Filter::Attr {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some('~') => AttrOp::Includes,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            self.expect('=')?;
        }
        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.parse_quoted(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(Filter::Attr { name, op, value })
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(SelectorError::UnexpectedEnd(self.source.to_string())),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_pseudo(&mut self) -> Result<Filter, SelectorError> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Filter::NthChild(1)),
            "last-child" => Ok(Filter::LastChild),
            "nth-child" | "nth-of-type" => {
                self.expect('(')?;
                self.skip_ws();
                let mut digits = String::new();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    digits.push(self.bump().unwrap_or_default());
                }
                self.skip_ws();
                let n = match digits.parse::<usize>() {
                    Ok(n) if self.peek() == Some(')') => n,
                    _ => return Err(SelectorError::UnsupportedPseudo(format!("{}(...)", name))),
                };
                self.pos += 1;
                if name == "nth-child" {
                    Ok(Filter::NthChild(n))
                } else {
                    Ok(Filter::NthOfType(n))
                }
            }
            _ => Err(SelectorError::UnsupportedPseudo(name)),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, Element};
    use crate::geometry::Size;

    fn sample() -> (DomTree, Vec<NodeId>) {
        let mut tree = DomTree::new(Size::new(1024.0, 768.0));
        let body = tree.body_id();
        let form = tree.append(body, Element::new("form").id("signup").class("card wide"));
        let input = tree.append(form, Element::new("input").attr("type", "email"));
        let submit = tree.append(
            form,
            Element::new("button")
                .attr("type", "submit")
                .class("btn btn-primary"),
        );
        let cancel = tree.append(form, Element::new("button").class("btn"));
        (tree, vec![form, input, submit, cancel])
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(SelectorList::parse("  "), Err(SelectorError::Empty));
        assert!(SelectorList::parse("div >").is_err());
        assert!(SelectorList::parse("[type=").is_err());
        assert!(SelectorList::parse("a:hover").is_err());
        assert!(SelectorList::parse("li:nth-child(2n+1)").is_err());
    }

    #[test]
    fn test_compound_and_combinators() {
        let (tree, n) = sample();
        let q = |s: &str| SelectorList::parse(s).unwrap().select_all(&tree);
        assert_eq!(q("#signup"), vec![n[0]]);
        assert_eq!(q("form.card > button.btn-primary"), vec![n[2]]);
        assert_eq!(q("body button"), vec![n[2], n[3]]);
        assert_eq!(q("button[type=\"submit\"]"), vec![n[2]]);
        assert_eq!(q("[class*=primary]"), vec![n[2]]);
        assert_eq!(q("[class~=btn]"), vec![n[2], n[3]]);
        assert_eq!(q("form > :nth-child(2)"), vec![n[2]]);
        assert_eq!(q("button:nth-of-type(2)"), vec![n[3]]);
        assert_eq!(q("form > :last-child"), vec![n[3]]);
        assert_eq!(q("input, #signup"), vec![n[0], n[1]]);
    }

    #[test]
    fn test_child_combinator_is_strict() {
        let (tree, _) = sample();
        let hits = SelectorList::parse("body > button").unwrap().select_all(&tree);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_escape_round_trip() {
        let mut tree = DomTree::new(Size::new(800.0, 600.0));
        let body = tree.body_id();
        let el = tree.append(body, Element::new("div").class("w-1/2 md:flex").id("1st"));
        let by_class = format!(".{}", css_escape("w-1/2"));
        let by_id = format!("#{}", css_escape("1st"));
        assert_eq!(tree.query_selector(&by_class).unwrap(), Some(el));
        assert_eq!(tree.query_selector(&by_id).unwrap(), Some(el));
        let variant = format!(".{}", css_escape("md:flex"));
        assert_eq!(tree.query_selector(&variant).unwrap(), Some(el));
    }
}
