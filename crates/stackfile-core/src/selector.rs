//! Label selectors
//!
//! A selector is a list of independent groups. Each group is a comma separated
//! list of `key=value` / `key!=value` expressions that must all hold
//! (conjunction); a release is selected when at least one group holds
//! (disjunction). An empty selector selects everything.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::{CoreError, Result};

static LABEL_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_./-]+)(!=|=)([A-Za-z0-9_./-]+)$").expect("label regex is valid")
});

/// One group of label expressions, all of which must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    pub positive: Vec<(String, String)>,
    pub negative: Vec<(String, String)>,
}

impl LabelFilter {
    /// Parse `k=v,k2!=v2`
    pub fn parse(group: &str) -> Result<Self> {
        let mut filter = Self::default();

        for expr in group.split(',') {
            let expr = expr.trim();
            let caps = LABEL_EXPR
                .captures(expr)
                .ok_or_else(|| CoreError::MalformedLabel {
                    expr: expr.to_string(),
                })?;

            let pair = (caps[1].to_string(), caps[3].to_string());
            if &caps[2] == "=" {
                filter.positive.push(pair);
            } else {
                filter.negative.push(pair);
            }
        }

        Ok(filter)
    }

    pub fn matches(&self, labels: &IndexMap<String, String>) -> bool {
        let positive = self
            .positive
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v));
        let negative = self
            .negative
            .iter()
            .all(|(k, v)| labels.get(k).is_none_or(|actual| actual != v));
        positive && negative
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exprs: Vec<String> = self
            .positive
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .chain(self.negative.iter().map(|(k, v)| format!("{}!={}", k, v)))
            .collect();
        write!(f, "{}", exprs.join(","))
    }
}

/// A parsed selector: any-of over label filter groups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<LabelFilter>,
}

impl Selector {
    /// Parse selector groups as given on the command line or in an inclusion
    pub fn parse<S: AsRef<str>>(groups: &[S]) -> Result<Self> {
        let groups = groups
            .iter()
            .map(|g| LabelFilter::parse(g.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { groups })
    }

    /// Selects every release
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[LabelFilter] {
        &self.groups
    }

    pub fn matches(&self, labels: &IndexMap<String, String>) -> bool {
        self.groups.is_empty() || self.groups.iter().any(|g| g.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self.groups.iter().map(|g| g.to_string()).collect();
        write!(f, "{}", groups.join(" "))
    }
}

/// How nested inclusions without their own selectors are filtered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectorInheritance {
    /// No own selectors: inherit the parent's active selectors
    #[default]
    Legacy,
    /// No own selectors: run unfiltered unless `selectorsInherited: true`
    Explicit,
}

impl SelectorInheritance {
    /// Active selector groups for a nested inclusion
    ///
    /// Selectors declared on the inclusion, even an empty list, are always
    /// used verbatim.
    pub fn resolve(
        &self,
        parent: &[String],
        own: Option<&[String]>,
        selectors_inherited: bool,
    ) -> Vec<String> {
        match (own, self) {
            (Some(own), _) => own.to_vec(),
            (None, Self::Legacy) => parent.to_vec(),
            (None, Self::Explicit) if selectors_inherited => parent.to_vec(),
            (None, Self::Explicit) => Vec::new(),
        }
    }
}
