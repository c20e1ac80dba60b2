//! Registry of named core rules.
//!
//! Parameterised rule names such as "Melta 2" or "Anti-Infantry 4+" are
//! matched against a static table of patterns and expanded into a
//! human-readable explanation. The table is compiled once and never mutated.

use std::sync::OnceLock;

use regex::Regex;

/// A named rule pattern and its explanation template.
///
/// Templates reference named capture groups as `${n}` and `${kw}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedPattern {
    /// Stable key of the rule (e.g. "sustained_hits").
    pub key: &'static str,
    /// Case-insensitive pattern matched against the whole name.
    pub pattern: &'static str,
    /// Explanation template.
    pub template: &'static str,
}

/// Static table of core rule patterns.
pub const NAMED_PATTERNS: &[NamedPattern] = &[
    NamedPattern {
        key: "sustained_hits",
        pattern: r"^sustained hits (?P<n>(?:\d*d)?\d+(?:\+\d+)?)$",
        template: "Each Critical Hit scores ${n} additional hit(s).",
    },
    NamedPattern {
        key: "lethal_hits",
        pattern: r"^lethal hits$",
        template: "Critical Hits automatically wound the target.",
    },
    NamedPattern {
        key: "devastating_wounds",
        pattern: r"^devastating wounds$",
        template: "Critical Wounds cannot be saved against, not even with an invulnerable save.",
    },
    NamedPattern {
        key: "anti",
        pattern: r"^anti-(?P<kw>[a-z][a-z -]*?) (?P<n>[2-6])\+$",
        template: "An unmodified wound roll of ${n}+ against a ${kw} target is a Critical Wound.",
    },
    NamedPattern {
        key: "melta",
        pattern: r"^melta (?P<n>\d+)$",
        template: "Within half range, each attack's Damage is increased by ${n}.",
    },
    NamedPattern {
        key: "rapid_fire",
        pattern: r"^rapid fire (?P<n>\d+)$",
        template: "Within half range, the Attacks characteristic is increased by ${n}.",
    },
    NamedPattern {
        key: "blast",
        pattern: r"^blast$",
        template: "Add 1 to the Attacks characteristic for every five models in the target unit.",
    },
    NamedPattern {
        key: "twin_linked",
        pattern: r"^twin[- ]linked$",
        template: "Failed wound rolls may be re-rolled.",
    },
    NamedPattern {
        key: "ignores_cover",
        pattern: r"^ignores cover$",
        template: "The target cannot claim the Benefit of Cover.",
    },
    NamedPattern {
        key: "torrent",
        pattern: r"^torrent$",
        template: "Attacks automatically hit the target.",
    },
    NamedPattern {
        key: "heavy",
        pattern: r"^heavy$",
        template: "Add 1 to hit rolls if the bearer's unit Remained Stationary this turn.",
    },
    NamedPattern {
        key: "lance",
        pattern: r"^lance$",
        template: "Add 1 to wound rolls if the bearer's unit made a Charge move this turn.",
    },
    NamedPattern {
        key: "indirect_fire",
        pattern: r"^indirect fire$",
        template: "Can target units that are not visible; if it does, subtract 1 from hit rolls and the target has the Benefit of Cover.",
    },
    NamedPattern {
        key: "assault",
        pattern: r"^assault$",
        template: "Can be shot even if the bearer's unit Advanced this turn.",
    },
    NamedPattern {
        key: "pistol",
        pattern: r"^pistol$",
        template: "Can be shot while the bearer's unit is within Engagement Range of enemy units.",
    },
    NamedPattern {
        key: "precision",
        pattern: r"^precision$",
        template: "Attacks can be allocated to a visible Character model in an attached unit.",
    },
    NamedPattern {
        key: "hazardous",
        pattern: r"^hazardous$",
        template: "After the bearer's unit uses this weapon, roll one D6 per use: on a 1 the bearer suffers 3 mortal wounds.",
    },
    NamedPattern {
        key: "feel_no_pain",
        pattern: r"^feel no pain (?P<n>[2-6])\+$",
        template: "Each time this model would lose a wound, roll one D6: on a ${n}+ that wound is not lost.",
    },
    NamedPattern {
        key: "stealth",
        pattern: r"^stealth$",
        template: "Subtract 1 from hit rolls of ranged attacks targeting this unit.",
    },
    NamedPattern {
        key: "lone_operative",
        pattern: r"^lone operative$",
        template: "Can only be targeted by ranged attacks from within 12\".",
    },
    NamedPattern {
        key: "deep_strike",
        pattern: r"^deep strike$",
        template: "Can be set up in Reserves and arrive anywhere more than 9\" from enemy models.",
    },
];

/// A successful registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMatch {
    /// Key of the matched pattern.
    pub key: &'static str,
    /// Numeric or dice parameter (the `n` capture), if the rule has one.
    pub value: Option<String>,
    /// Keyword parameter (the `kw` capture), if the rule has one.
    pub keyword: Option<String>,
    /// Expanded explanation.
    pub description: String,
}

fn compiled() -> &'static [(Regex, NamedPattern)] {
    static COMPILED: OnceLock<Vec<(Regex, NamedPattern)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        NAMED_PATTERNS
            .iter()
            .filter_map(|p| {
                let regex = Regex::new(&format!("(?i){}", p.pattern));
                if let Err(e) = &regex {
                    tracing::error!(key = p.key, error = %e, "Invalid named rule pattern");
                }
                regex.ok().map(|re| (re, *p))
            })
            .collect()
    })
}

/// Match a rule name against the registry.
#[must_use]
pub fn lookup(name: &str) -> Option<NamedMatch> {
    let name = name.trim();
    compiled().iter().find_map(|(re, pattern)| {
        let caps = re.captures(name)?;
        let mut description = String::new();
        caps.expand(pattern.template, &mut description);
        Some(NamedMatch {
            key: pattern.key,
            value: caps.name("n").map(|m| m.as_str().to_string()),
            keyword: caps.name("kw").map(|m| m.as_str().to_string()),
            description,
        })
    })
}

/// Explain a named core rule, or `None` if the name is not a core rule.
#[must_use]
pub fn describe(name: &str) -> Option<String> {
    lookup(name).map(|m| m.description)
}
