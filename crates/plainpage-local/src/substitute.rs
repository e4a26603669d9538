//! Offline word-substitution fallback.
//!
//! The last tier of the ladder: no network, cannot fail. Whole-word,
//! case-insensitive complex-to-simple replacement, plus sentence trimming at
//! the stronger levels.

use once_cell::sync::Lazy;
use plainpage_core::Level;
use std::collections::HashMap;

/// Synthetic summary returned by this tier (there is no model to write one).
pub const OFFLINE_SUMMARY: &str = "Content simplified using offline word substitution";

#[rustfmt::skip]
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("utilize", "use"), ("commence", "start"), ("terminate", "end"),
    ("subsequently", "later"), ("approximately", "about"), ("demonstrate", "show"),
    ("establish", "set up"), ("fundamental", "basic"), ("significant", "important"),
    ("consequence", "result"), ("therefore", "so"), ("however", "but"),
    ("furthermore", "also"), ("nevertheless", "but"), ("consequently", "so"),
    ("accordingly", "so"), ("specifically", "exactly"), ("particularly", "especially"),
    ("essentially", "basically"), ("primarily", "mainly"), ("initially", "first"),
    ("ultimately", "finally"), ("comprehensive", "complete"), ("substantial", "large"),
    ("adequate", "enough"), ("sufficient", "enough"), ("exceptional", "special"),
    ("considerable", "large"), ("numerous", "many"), ("various", "different"),
    ("alternative", "other"), ("additional", "more"), ("particular", "special"),
    ("individual", "single"), ("specific", "exact"), ("general", "basic"),
    ("typical", "normal"), ("standard", "normal"), ("traditional", "old"),
    ("contemporary", "modern"), ("previous", "last"), ("subsequent", "next"),
    ("preceding", "before"), ("following", "after"), ("adjacent", "next to"),
    ("equivalent", "equal"), ("similar", "like"), ("identical", "same"),
    ("opposite", "reverse"), ("contrary", "opposite"), ("consistent", "steady"),
    ("constant", "steady"), ("variable", "changing"), ("temporary", "short"),
    ("permanent", "lasting"), ("immediate", "instant"), ("gradual", "slow"),
    ("rapid", "fast"), ("accelerate", "speed up"), ("decelerate", "slow down"),
    ("maintain", "keep"), ("preserve", "keep"), ("eliminate", "remove"),
    ("reduce", "lower"), ("increase", "raise"), ("enhance", "improve"),
    ("minimize", "reduce"), ("maximize", "increase"), ("optimize", "improve"),
    ("facilitate", "help"), ("accommodate", "fit"), ("implement", "use"),
    ("execute", "do"), ("perform", "do"), ("conduct", "do"),
    ("accomplish", "finish"), ("achieve", "reach"), ("obtain", "get"),
    ("acquire", "get"), ("receive", "get"), ("provide", "give"),
    ("supply", "give"), ("deliver", "bring"), ("transmit", "send"),
    ("communicate", "talk"), ("indicate", "show"), ("reveal", "show"),
    ("display", "show"), ("illustrate", "show"), ("represent", "show"),
    ("constitute", "make up"), ("comprise", "include"), ("contain", "have"),
    ("possess", "have"), ("retain", "keep"), ("sustain", "keep up"),
    ("assist", "help"), ("contribute", "help"), ("participate", "join"),
    ("collaborate", "work together"), ("cooperate", "work together"),
    ("coordinate", "organize"), ("organize", "set up"), ("arrange", "set up"),
    ("prepare", "get ready"), ("anticipate", "expect"), ("predict", "guess"),
    ("estimate", "guess"), ("calculate", "figure out"), ("determine", "find out"),
    ("investigate", "look into"), ("examine", "check"), ("analyze", "study"),
    ("evaluate", "judge"), ("assess", "check"), ("consider", "think about"),
    ("contemplate", "think about"), ("deliberate", "think carefully"),
    ("conclude", "decide"), ("resolve", "solve"), ("address", "deal with"),
    ("approach", "method"), ("strategy", "plan"), ("technique", "way"),
    ("procedure", "steps"), ("mechanism", "way"), ("phenomenon", "thing"),
    ("occurrence", "event"), ("situation", "case"), ("circumstance", "case"),
    ("condition", "state"), ("requirement", "need"), ("necessity", "need"),
    ("obligation", "duty"), ("responsibility", "job"), ("opportunity", "chance"),
    ("possibility", "chance"), ("probability", "chance"), ("likelihood", "chance"),
    ("potential", "possible"), ("capacity", "ability"), ("capability", "ability"),
    ("competence", "skill"), ("proficiency", "skill"), ("expertise", "skill"),
    ("knowledge", "facts"), ("information", "facts"), ("comprehension", "understanding"),
    ("awareness", "knowing"), ("recognition", "knowing"), ("identification", "naming"),
    ("classification", "grouping"), ("categorization", "grouping"),
    ("organization", "group"), ("structure", "setup"), ("arrangement", "order"),
    ("configuration", "setup"), ("formation", "making"), ("construction", "building"),
    ("development", "growth"), ("evolution", "change"), ("transformation", "change"),
    ("modification", "change"), ("alteration", "change"), ("adjustment", "change"),
    ("adaptation", "change"), ("advancement", "progress"), ("achievement", "success"),
    ("accomplishment", "success"), ("difficulty", "problem"), ("challenge", "problem"),
    ("obstacle", "block"), ("barrier", "block"), ("impediment", "block"),
    ("restriction", "limit"), ("limitation", "limit"), ("constraint", "limit"),
    ("boundary", "edge"), ("perimeter", "edge"), ("vicinity", "area"),
    ("proximity", "nearness"), ("location", "place"), ("position", "place"),
    ("destination", "target"), ("origin", "start"), ("beginning", "start"),
    ("commencement", "start"), ("initiation", "start"), ("conclusion", "end"),
    ("termination", "end"), ("completion", "finish"), ("finalization", "finish"),
];

static SUBSTITUTION_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| SUBSTITUTIONS.iter().copied().collect());

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace whole words case-insensitively through `map`.
fn replace_words(text: &str, map: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();

    let mut flush = |word: &mut String, out: &mut String| {
        if word.is_empty() {
            return;
        }
        let key = word.to_ascii_lowercase();
        match map.get(key.as_str()) {
            Some(simple) => out.push_str(simple),
            None => out.push_str(word),
        }
        word.clear();
    };

    for ch in text.chars() {
        if ch.is_alphabetic() || ch == '\'' {
            word.push(ch);
        } else {
            flush(&mut word, &mut out);
            out.push(ch);
        }
    }
    flush(&mut word, &mut out);
    out
}

/// Keep only the first `n` sentences (terminal-punctuation split).
fn take_sentences(text: &str, n: usize) -> String {
    let mut out = String::new();
    let mut kept = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        out.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let at_break = chars.peek().map(|c| c.is_whitespace()).unwrap_or(true);
            if at_break {
                kept += 1;
                if kept >= n {
                    break;
                }
            }
        }
    }
    out
}

static CASUAL_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("this", "this thing"),
        ("that", "this thing"),
        ("these", "this thing"),
        ("those", "this thing"),
        ("complex", "hard"),
        ("complicated", "hard"),
        ("simple", "easy"),
    ]
    .into_iter()
    .collect()
});

/// Offline simplification of one item's text. Infallible by construction.
pub fn simplify_offline(text: &str, level: Level) -> String {
    let mut simplified = replace_words(text, &SUBSTITUTION_MAP);

    match level {
        Level::Light => {}
        Level::Balanced => {
            simplified = take_sentences(&simplified, 3);
        }
        Level::Strong => {
            simplified = take_sentences(&simplified, 2);
            simplified = replace_words(&simplified, &CASUAL_MAP);
        }
    }

    norm_ws(&simplified)
}
