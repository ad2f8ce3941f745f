//! English message templates for the reminder notification.

pub const APP_NAME: &str = "RxDroid";
pub const TITLE_DOSES: &str = "Doses";
pub const TITLE_LOW_SUPPLIES: &str = "Low supplies";
pub const TICKER: &str = "New notification";
pub const ACTION_TAKE_ALL: &str = "Take all";
pub const ACTION_REMIND_TOMORROW: &str = "Remind tomorrow";

pub fn due_doses(count: usize) -> String {
    format!("{count} due")
}

pub fn missed_doses(count: usize) -> String {
    format!("{count} missed")
}

/// Low-supply message naming the first one or two affected drugs.
pub fn low_supply(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => format!("{only} is running low"),
        [first, second] => format!("{first} and {second} are running low"),
        [first, second, rest @ ..] => {
            let others = rest.len();
            let noun = if others == 1 { "other" } else { "others" };
            format!("{first}, {second} and {others} {noun} are running low")
        }
    }
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
