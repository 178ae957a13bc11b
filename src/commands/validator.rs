use std::collections::HashSet;

use crate::transport::CommandFields;

/// Actions the browser extension understands.
pub const KNOWN_ACTIONS: &[&str] = &[
    "click",
    "type",
    "navigate",
    "screenshot",
    "ocr",
    "clickAtCoordinates",
    "getHtml",
    "setHtml",
    "executeScript",
];

/// Advisory checks on a command before it is sent.
///
/// The service is the authority on what an action needs, so nothing here rejects a
/// command; it only explains why the service is likely to.
#[derive(Debug, Clone)]
pub struct ActionValidator {
    known: HashSet<&'static str>,
}

impl Default for ActionValidator {
    fn default() -> Self {
        Self {
            known: KNOWN_ACTIONS.iter().copied().collect(),
        }
    }
}

impl ActionValidator {
    pub fn is_known(&self, action: &str) -> bool {
        self.known.contains(action)
    }

    pub fn review(&self, action: &str, fields: &CommandFields) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.is_known(action) {
            warnings.push(format!("unknown action '{}', forwarding as-is", action));
            return warnings;
        }

        let missing = |what: &str| format!("{} usually requires {}", action, what);
        match action {
            "navigate" if fields.url.is_none() => warnings.push(missing("url")),
            "type" if fields.text.is_none() => warnings.push(missing("text")),
            "click" if fields.xpath.is_none() && fields.selector.is_none() => {
                warnings.push(missing("xpath or selector"))
            }
            "clickAtCoordinates" if fields.x.is_none() || fields.y.is_none() => {
                warnings.push(missing("x and y"))
            }
            "setHtml" if fields.html.is_none() => warnings.push(missing("html")),
            "executeScript" if fields.script.is_none() => warnings.push(missing("script")),
            _ => {}
        }
        warnings
    }
}
