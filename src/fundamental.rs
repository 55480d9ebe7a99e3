//! Fundamental redirects.
//!
//! A small, fixed table of URI rewrites for whole legacy sections that were
//! moved wholesale (e.g. `DOM/*` to `Web/API/*`). They apply independently
//! of the document store and take precedence over anything the redirect
//! graph would otherwise resolve to.

use regex::Regex;

struct Rule {
    pattern: Regex,
    target: &'static str,
}

/// Ordered rewrite table; the first matching rule wins.
pub struct FundamentalRedirects {
    rules: Vec<Rule>,
}

const RULES: &[(&str, &str)] = &[
    (
        r"^/(?P<locale>[^/]+)/docs/Core_JavaScript_1\.5_(?P<area>Reference|Guide)(?P<rest>/.*)?$",
        "/$locale/docs/Web/JavaScript/$area$rest",
    ),
    (
        r"^/(?P<locale>[^/]+)/docs/DOM(?P<rest>/.*)?$",
        "/$locale/docs/Web/API$rest",
    ),
    (
        r"^/(?P<locale>[^/]+)/docs/(?P<area>HTML|CSS|SVG|JavaScript|HTTP)(?P<rest>/.*)?$",
        "/$locale/docs/Web/$area$rest",
    ),
    (
        r"^/(?P<locale>[^/]+)/docs/AJAX(?P<rest>/.*)?$",
        "/$locale/docs/Web/Guide/AJAX$rest",
    ),
    (
        r"^/(?P<locale>[^/]+)/docs/Web/API/(?P<iface>[A-Za-z]+)/on(?P<event>[a-z]+)$",
        "/$locale/docs/Web/API/$iface/${event}_event",
    ),
];

impl Default for FundamentalRedirects {
    fn default() -> Self {
        Self::new()
    }
}

impl FundamentalRedirects {
    pub fn new() -> Self {
        let rules = RULES
            .iter()
            .map(|(pattern, target)| Rule {
                pattern: Regex::new(pattern).expect("fundamental redirect pattern compiles"),
                target,
            })
            .collect();
        Self { rules }
    }

    /// The fundamental rewrite of `uri`, if any rule applies.
    pub fn resolve(&self, uri: &str) -> Option<String> {
        self.rules.iter().find_map(|rule| {
            rule.pattern
                .is_match(uri)
                .then(|| rule.pattern.replace(uri, rule.target).into_owned())
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_sections_move_under_web() {
        let f = FundamentalRedirects::new();
        assert_eq!(
            f.resolve("/en-US/docs/DOM/window").as_deref(),
            Some("/en-US/docs/Web/API/window")
        );
        assert_eq!(
            f.resolve("/fr/docs/HTML/Element/div").as_deref(),
            Some("/fr/docs/Web/HTML/Element/div")
        );
        assert_eq!(f.resolve("/de/docs/CSS").as_deref(), Some("/de/docs/Web/CSS"));
        assert_eq!(
            f.resolve("/en-US/docs/Core_JavaScript_1.5_Reference/Global_Objects").as_deref(),
            Some("/en-US/docs/Web/JavaScript/Reference/Global_Objects")
        );
    }

    #[test]
    fn event_handler_pages_become_event_pages() {
        let f = FundamentalRedirects::new();
        assert_eq!(
            f.resolve("/en-US/docs/Web/API/Window/onload").as_deref(),
            Some("/en-US/docs/Web/API/Window/load_event")
        );
    }

    #[test]
    fn modern_paths_are_untouched() {
        let f = FundamentalRedirects::new();
        assert_eq!(f.resolve("/en-US/docs/Web/API/Window"), None);
        assert_eq!(f.resolve("/en-US/docs/HTMLElement"), None);
        assert_eq!(f.resolve("/en-US/docs/Learn"), None);
    }
}
