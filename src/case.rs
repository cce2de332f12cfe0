//! Case conversion for the API: query keys arrive camelCase, columns are snake_case.

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "project_id" -> "projectId", "create_time" -> "createTime"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// Acronym suffixes collapse: "projectID" -> "project_id".
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if i > 0 && (!prev_upper || next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_to_camel() {
        assert_eq!(to_camel_case("create_time"), "createTime");
        assert_eq!(to_camel_case("name"), "name");
    }

    #[test]
    fn camel_to_snake() {
        assert_eq!(to_snake_case("createTime"), "create_time");
        assert_eq!(to_snake_case("projectID"), "project_id");
        assert_eq!(to_snake_case("enableFinOps"), "enable_fin_ops");
        assert_eq!(to_snake_case("project_id"), "project_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
    }
}
