use std::path::Path;

use crate::types::Category;

/// Keywords checked against the uppercased file name; first match wins.
const RULES: [(&str, Category); 4] = [
    ("PORTFOLIO", Category::Portfolio),
    ("PROJECT", Category::Project),
    ("SESSION", Category::Session),
    ("CONTINUITY", Category::Theory),
];

pub fn classify(filename: &str) -> Category {
    let name = filename.to_uppercase();
    RULES
        .iter()
        .find(|(keyword, _)| name.contains(keyword))
        .map_or(Category::General, |(_, category)| *category)
}

/// Classify by the final component of `path` only.
pub fn classify_path(path: &Path) -> Category {
    path.file_name()
        .map_or(Category::General, |name| classify(&name.to_string_lossy()))
}
