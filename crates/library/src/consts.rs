use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $pattern:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).unwrap());
    };
}

// "Part 2", "part_02", "PART-3", "Part2"; the digits are captured.
regex!(PART_TOKEN, r"(?i)part[\s_-]?(\d+)");
regex!(REPEATED_UNDERSCORES, r"_{2,}");
