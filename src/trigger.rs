//! Client-side trigger descriptors
//!
//! A trigger tells the client runtime when to fire a bound call: an event
//! name, an ordered list of modifiers, and an optional filter expression.
//! Triggers are pure values and stringify deterministically as
//! `event[filter] modifier modifier...`.

use std::fmt;

/// Event that fires a bound call.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    Click,
    Submit,
    Change,
    MouseOver,
    MouseEnter,
    Load,
    Intersect,
    Revealed,
    KeyUp,
    Search,
    Every,
    /// Any other DOM event name, passed through verbatim.
    Custom(String),
}

impl TriggerEvent {
    pub fn as_str(&self) -> &str {
        match self {
            TriggerEvent::Click => "click",
            TriggerEvent::Submit => "submit",
            TriggerEvent::Change => "change",
            TriggerEvent::MouseOver => "mouseover",
            TriggerEvent::MouseEnter => "mouseenter",
            TriggerEvent::Load => "load",
            TriggerEvent::Intersect => "intersect",
            TriggerEvent::Revealed => "revealed",
            TriggerEvent::KeyUp => "keyup",
            TriggerEvent::Search => "search",
            TriggerEvent::Every => "every",
            TriggerEvent::Custom(name) => name,
        }
    }
}

/// Modifier argument: a delay, a selector, or a numeric threshold.
#[derive(Debug, Clone, PartialEq)]
enum ModifierArg {
    None,
    Millis(u64),
    Selector(String),
    Threshold(f64),
}

/// A single trigger modifier, e.g. `delay:100ms` or `from:#list`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerModifier {
    name: &'static str,
    arg: ModifierArg,
}

impl TriggerModifier {
    pub fn once() -> Self {
        TriggerModifier {
            name: "once",
            arg: ModifierArg::None,
        }
    }

    pub fn changed() -> Self {
        TriggerModifier {
            name: "changed",
            arg: ModifierArg::None,
        }
    }

    pub fn delay(milliseconds: u64) -> Self {
        TriggerModifier {
            name: "delay",
            arg: ModifierArg::Millis(milliseconds),
        }
    }

    pub fn throttle(milliseconds: u64) -> Self {
        TriggerModifier {
            name: "throttle",
            arg: ModifierArg::Millis(milliseconds),
        }
    }

    /// Listen for the event on another element.
    pub fn from_selector(selector: impl Into<String>) -> Self {
        TriggerModifier {
            name: "from",
            arg: ModifierArg::Selector(selector.into()),
        }
    }

    /// Intersection root for `intersect` triggers.
    pub fn root(selector: impl Into<String>) -> Self {
        TriggerModifier {
            name: "root",
            arg: ModifierArg::Selector(selector.into()),
        }
    }

    /// Intersection threshold for `intersect` triggers.
    pub fn threshold(threshold: f64) -> Self {
        TriggerModifier {
            name: "threshold",
            arg: ModifierArg::Threshold(threshold),
        }
    }
}

impl fmt::Display for TriggerModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            ModifierArg::None => write!(f, "{}", self.name),
            ModifierArg::Millis(ms) => write!(f, "{}:{}ms", self.name, ms),
            ModifierArg::Selector(selector) => write!(f, "{}:{}", self.name, selector),
            ModifierArg::Threshold(threshold) => write!(f, "{}:{}", self.name, threshold),
        }
    }
}

/// A complete trigger descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    event: TriggerEvent,
    modifiers: Vec<TriggerModifier>,
    filter: Option<String>,
}

impl Trigger {
    pub fn new(event: TriggerEvent) -> Self {
        Trigger {
            event,
            modifiers: Vec::new(),
            filter: None,
        }
    }

    /// Append a modifier; modifiers render in insertion order.
    pub fn modifier(mut self, modifier: TriggerModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Set the bracketed filter expression.
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter = Some(expression.into());
        self
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event.as_str())?;
        if let Some(filter) = &self.filter {
            write!(f, "[{filter}]")?;
        }
        for modifier in &self.modifiers {
            write!(f, " {modifier}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_trigger() {
        assert_eq!(Trigger::new(TriggerEvent::Click).to_string(), "click");
    }

    #[test]
    fn test_trigger_with_filter() {
        assert_eq!(
            Trigger::new(TriggerEvent::Click)
                .filter("ctrlKey")
                .to_string(),
            "click[ctrlKey]"
        );
    }

    #[test]
    fn test_trigger_with_modifier() {
        assert_eq!(
            Trigger::new(TriggerEvent::Click)
                .modifier(TriggerModifier::delay(100))
                .to_string(),
            "click delay:100ms"
        );
    }

    #[test]
    fn test_trigger_with_filter_and_modifiers() {
        assert_eq!(
            Trigger::new(TriggerEvent::KeyUp)
                .filter("key=='Enter'")
                .modifier(TriggerModifier::changed())
                .modifier(TriggerModifier::throttle(500))
                .to_string(),
            "keyup[key=='Enter'] changed throttle:500ms"
        );
    }

    #[test]
    fn test_modifier_table() {
        assert_eq!(TriggerModifier::once().to_string(), "once");
        assert_eq!(TriggerModifier::changed().to_string(), "changed");
        assert_eq!(TriggerModifier::delay(100).to_string(), "delay:100ms");
        assert_eq!(TriggerModifier::throttle(100).to_string(), "throttle:100ms");
        assert_eq!(
            TriggerModifier::from_selector("#list").to_string(),
            "from:#list"
        );
        assert_eq!(TriggerModifier::root("#viewport").to_string(), "root:#viewport");
        assert_eq!(TriggerModifier::threshold(0.5).to_string(), "threshold:0.5");
    }

    #[test]
    fn test_custom_event() {
        assert_eq!(
            Trigger::new(TriggerEvent::Custom("sse:update".to_string())).to_string(),
            "sse:update"
        );
    }
}
