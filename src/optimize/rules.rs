//! Declarative rewrite rules
//!
//! Each rule pairs a CSS selector with an action and the lowest tier it
//! belongs to. Full-tier runs apply every rule; shallow-tier runs apply only
//! the shallow rules. HTML comments are dropped in both tiers.

use super::{OptimizeError, OptimizeMode};
use lol_html::{doc_comments, element, rewrite_str, RewriteStrSettings};

/// What to do with a matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Remove the element and everything inside it
    StripElement,
    /// Remove one attribute, keep the element
    StripAttribute(&'static str),
    /// Remove the element's tags but keep its children in place
    CollapseWrapper,
}

/// One entry of the rule table
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub selector: &'static str,
    pub action: RuleAction,
    pub tier: OptimizeMode,
}

impl Rule {
    const fn shallow(selector: &'static str, action: RuleAction) -> Self {
        Self {
            selector,
            action,
            tier: OptimizeMode::Shallow,
        }
    }

    const fn full(selector: &'static str, action: RuleAction) -> Self {
        Self {
            selector,
            action,
            tier: OptimizeMode::Full,
        }
    }

    /// Returns true if this rule runs for `mode`
    pub fn applies_to(&self, mode: OptimizeMode) -> bool {
        match self.tier {
            OptimizeMode::Shallow => true,
            OptimizeMode::Full => mode == OptimizeMode::Full,
        }
    }
}

use RuleAction::{CollapseWrapper, StripAttribute, StripElement};

/// The rule catalogue
pub const RULES: &[Rule] = &[
    // Structured data stays; crawlers read it.
    Rule::shallow(r#"script:not([type="application/ld+json"])"#, StripElement),
    Rule::shallow("noscript", StripElement),
    Rule::shallow("style", StripElement),
    Rule::shallow(r#"link[rel="prefetch"]"#, StripElement),
    Rule::shallow(r#"link[rel="preload"]"#, StripElement),
    Rule::shallow(r#"link[rel="dns-prefetch"]"#, StripElement),
    Rule::shallow(r#"link[rel="modulepreload"]"#, StripElement),
    Rule::shallow(r#"iframe[src*="googletagmanager"]"#, StripElement),
    Rule::shallow(r#"iframe[src*="google-analytics"]"#, StripElement),
    Rule::shallow(r#"iframe[src*="doubleclick"]"#, StripElement),
    Rule::shallow(r#"iframe[src*="facebook.com/tr"]"#, StripElement),
    Rule::full("form", StripElement),
    Rule::full(
        r#"input:not([type="button"]):not([type="submit"])"#,
        StripElement,
    ),
    Rule::full("textarea", StripElement),
    Rule::full("select", StripElement),
    Rule::full("audio:not([data-seo-preserve])", StripElement),
    Rule::full("video:not([data-seo-preserve])", StripElement),
    Rule::full("svg", StripElement),
    Rule::full(r#"i[class*="icon"]"#, StripElement),
    Rule::full(r#"i[class*="fa-"]"#, StripElement),
    Rule::full(r#"span[class*="material-icons"]"#, StripElement),
    Rule::full("[style]", StripAttribute("style")),
    Rule::full("[class]", StripAttribute("class")),
    Rule::full("div:not([id])", CollapseWrapper),
    Rule::full("span:not([id])", CollapseWrapper),
];

/// Rules that run for `mode`, in table order
pub fn rules_for(mode: OptimizeMode) -> impl Iterator<Item = &'static Rule> {
    RULES.iter().filter(move |rule| rule.applies_to(mode))
}

/// Rewrites `html` with every rule of the given tier
///
/// # Errors
///
/// Returns `OptimizeError::Rewrite` if the document cannot be streamed
/// through the rewriter.
pub fn apply_rules(html: &str, mode: OptimizeMode) -> Result<String, OptimizeError> {
    let mut element_content_handlers = Vec::new();
    for rule in rules_for(mode) {
        let action = rule.action;
        element_content_handlers.push(element!(rule.selector, move |el| {
            match action {
                StripElement => el.remove(),
                StripAttribute(name) => el.remove_attribute(name),
                CollapseWrapper => el.remove_and_keep_content(),
            }
            Ok(())
        }));
    }

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers,
            document_content_handlers: vec![doc_comments!(|comment| {
                comment.remove();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| OptimizeError::Rewrite(err.to_string()))
}
