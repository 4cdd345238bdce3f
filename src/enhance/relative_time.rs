//! Relative timestamps (`5m`, `3h`, `in 2d`)

use std::rc::Rc;

use super::{Enhancement, EnhancementScope, SetupContext};
use crate::cache::{Clock, SystemClock};
use crate::dom::{Document, EventTarget, NodeId};

const MINUTE: f64 = 60.0;
const HOUR: f64 = MINUTE * 60.0;
const DAY: f64 = HOUR * 24.0;
const MONTH: f64 = DAY * 30.4;
const YEAR: f64 = DAY * 365.0;

/// Format the distance between `timestamp` and `now` (both unix seconds).
/// Anything under a minute reads as `1m`.
pub fn timestamp_to_relative_time(timestamp: f64, now: f64) -> String {
    let mut delta = (now - timestamp).round();
    let mut prefix = "";

    if delta < 0.0 {
        delta = -delta;
        prefix = "in ";
    }

    let (amount, unit) = if delta < MINUTE {
        (1.0, "m")
    } else if delta < HOUR {
        ((delta / MINUTE).floor(), "m")
    } else if delta < DAY {
        ((delta / HOUR).floor(), "h")
    } else if delta < MONTH {
        ((delta / DAY).floor(), "d")
    } else if delta < YEAR {
        ((delta / MONTH).floor(), "mo")
    } else {
        ((delta / YEAR).floor(), "y")
    };

    format!("{}{}{}", prefix, amount as i64, unit)
}

/// Rewrite the text of every element carrying a parsable
/// `data-dynamic-relative-time`
pub fn update_relative_time(doc: &mut Document, elements: &[NodeId], now: f64) {
    for &element in elements {
        let Some(timestamp) = doc
            .attr(element, "data-dynamic-relative-time")
            .and_then(|v| v.trim().parse::<f64>().ok())
        else {
            continue;
        };
        doc.set_text_content(element, &timestamp_to_relative_time(timestamp, now));
    }
}

/// `[data-dynamic-relative-time]` → relative text, refreshed whenever the
/// document becomes visible again
pub struct RelativeTime {
    clock: Rc<dyn Clock>,
}

impl RelativeTime {
    pub fn new() -> Self {
        Self {
            clock: Rc::new(SystemClock),
        }
    }

    #[cfg(test)]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Rc::new(clock),
        }
    }
}

impl Default for RelativeTime {
    fn default() -> Self {
        Self::new()
    }
}

fn now_seconds(clock: &dyn Clock) -> f64 {
    clock.now_millis() as f64 / 1000.0
}

impl Enhancement for RelativeTime {
    fn name(&self) -> &'static str {
        "relative-time"
    }

    fn scope(&self) -> EnhancementScope {
        EnhancementScope::Subtree
    }

    fn setup(&self, ctx: &mut SetupContext<'_>) -> anyhow::Result<()> {
        let elements = ctx.query_all(|d, n| d.has_attr(n, "data-dynamic-relative-time"));
        if elements.is_empty() {
            return Ok(());
        }

        update_relative_time(ctx.doc, &elements, now_seconds(self.clock.as_ref()));

        let clock = Rc::clone(&self.clock);
        ctx.listen(
            EventTarget::Document,
            "visibilitychange",
            Rc::new(move |doc: &mut Document| {
                update_relative_time(doc, &elements, now_seconds(clock.as_ref()))
            }),
        );

        Ok(())
    }
}
