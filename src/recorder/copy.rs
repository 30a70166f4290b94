//! Step copy for discovered elements: keyword rules first, tag templates last.

use std::sync::OnceLock;

use regex::Regex;

use crate::dom::{Document, NodeId};

/// One keyword rule. The first rule with any keyword appearing as a whole
/// word (or phrase) in the lower-cased label wins.
#[derive(Debug, Clone, Copy)]
pub struct CopyRule {
    pub keywords: &'static [&'static str],
    pub title: &'static str,
    pub content: &'static str,
}

pub const COPY_RULES: &[CopyRule] = &[
    CopyRule {
        keywords: &["pricing", "plans", "upgrade"],
        title: "Find the right plan",
        content: "Compare plans and pick the one that fits your team.",
    },
    CopyRule {
        keywords: &["sign up", "signup", "get started", "register", "create account"],
        title: "Get started",
        content: "Create your account in a few seconds.",
    },
    CopyRule {
        keywords: &["log in", "login", "sign in", "signin"],
        title: "Welcome back",
        content: "Sign in to pick up where you left off.",
    },
    CopyRule {
        keywords: &["search"],
        title: "Search",
        content: "Type here to find anything quickly.",
    },
    CopyRule {
        keywords: &["settings", "preferences", "account"],
        title: "Your settings",
        content: "Adjust your preferences and account details here.",
    },
    CopyRule {
        keywords: &["new", "create", "add"],
        title: "Create something new",
        content: "Start here to add a new item.",
    },
    CopyRule {
        keywords: &["help", "support", "docs", "contact"],
        title: "Need help?",
        content: "Reach our docs and support team from here.",
    },
    CopyRule {
        keywords: &["save", "submit", "send"],
        title: "Save your work",
        content: "Click here when you're ready to submit.",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCopy {
    pub title: String,
    pub content: String,
}

/// Visible label: innerText, then `aria-label`, `title`, `placeholder`.
pub fn element_label<D: Document + ?Sized>(doc: &D, node: NodeId) -> Option<String> {
    let text = doc.inner_text(node);
    let text = text.trim();
    if !text.is_empty() {
        return Some(text.to_string());
    }
    ["aria-label", "title", "placeholder"]
        .into_iter()
        .filter_map(|attr| doc.attribute(node, attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn copy_for<D: Document + ?Sized>(doc: &D, node: NodeId) -> StepCopy {
    let label = element_label(doc, node);
    copy_for_label(doc.tag_name(node), label.as_deref())
}

/// One `\b(?:kw|...)\b` matcher per entry in [`COPY_RULES`].
fn rule_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        COPY_RULES
            .iter()
            .map(|rule| {
                let words: Vec<_> = rule.keywords.iter().map(|k| regex::escape(k)).collect();
                Regex::new(&format!(r"\b(?:{})\b", words.join("|"))).expect("static regex")
            })
            .collect()
    })
}

pub fn copy_for_label(tag: &str, label: Option<&str>) -> StepCopy {
    if let Some(label) = label {
        let lower = label.to_lowercase();
        let hit = COPY_RULES
            .iter()
            .zip(rule_patterns())
            .find(|(_, re)| re.is_match(&lower));
        if let Some((rule, _)) = hit {
            return StepCopy {
                title: rule.title.to_string(),
                content: rule.content.to_string(),
            };
        }
    }
    template(tag, label)
}

fn template(tag: &str, label: Option<&str>) -> StepCopy {
    let (title, content) = match (tag, label) {
        ("a", Some(l)) => (l.to_string(), format!("Follow this link to open {}.", l)),
        ("a", None) => ("Explore".to_string(), "Follow this link to learn more.".to_string()),
        ("input" | "textarea" | "select", Some(l)) => {
            (l.to_string(), format!("Fill in {} here.", l.to_lowercase()))
        }
        ("input" | "textarea" | "select", None) => (
            "Enter details".to_string(),
            "Fill in this field to continue.".to_string(),
        ),
        (_, Some(l)) => (l.to_string(), format!("Click \"{}\" to continue.", l)),
        (_, None) => ("Take action".to_string(), "Click this button to continue.".to_string()),
    };
    StepCopy { title, content }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, Element};
    use crate::geometry::Size;

    #[test]
    fn test_keyword_rules_in_order() {
        let copy = copy_for_label("a", Some("See Pricing"));
        assert_eq!(copy.title, "Find the right plan");
        // "sign up" is checked before "login"
        let copy = copy_for_label("button", Some("Sign up or log in"));
        assert_eq!(copy.title, "Get started");
        let copy = copy_for_label("button", Some("LOGIN"));
        assert_eq!(copy.title, "Welcome back");
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        // "address" holds "add", "newsletter" holds "new"
        assert_eq!(copy_for_label("input", Some("Email address")).title, "Email address");
        assert_eq!(copy_for_label("a", Some("Newsletter")).title, "Newsletter");
        assert_eq!(copy_for_label("button", Some("Accountant view")).title, "Accountant view");
        assert_eq!(copy_for_label("button", Some("Add item")).title, "Create something new");
        assert_eq!(copy_for_label("button", Some("New project")).title, "Create something new");
        assert_eq!(copy_for_label("a", Some("My account")).title, "Your settings");
    }

    #[test]
    fn test_tag_templates() {
        assert_eq!(
            copy_for_label("button", Some("Export")).content,
            "Click \"Export\" to continue."
        );
        assert_eq!(copy_for_label("a", Some("Blog")).title, "Blog");
        assert_eq!(copy_for_label("input", Some("Email")).content, "Fill in email here.");
        assert_eq!(copy_for_label("button", None).title, "Take action");
    }

    #[test]
    fn test_label_fallback_chain() {
        let mut tree = DomTree::new(Size::new(800.0, 600.0));
        let body = tree.body_id();
        let icon = tree.append(body, Element::new("button").attr("aria-label", "Close"));
        let field = tree.append(
            body,
            Element::new("input").attr("title", " ").attr("placeholder", "Your name"),
        );
        let bare = tree.append(body, Element::new("a"));
        assert_eq!(element_label(&tree, icon).as_deref(), Some("Close"));
        assert_eq!(element_label(&tree, field).as_deref(), Some("Your name"));
        assert_eq!(element_label(&tree, bare), None);
        assert_eq!(copy_for(&tree, field).title, "Your name");
    }
}
