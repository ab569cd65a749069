//! Matching of incoming (method, path) pairs against registered descriptors.
//!
//! Matching is pure: it reads registered descriptors through [`RouteLookup`]
//! and never mutates anything.
//!
//! 1. Strip one trailing (and leading) slash.
//! 2. Try the exact static path.
//! 3. Otherwise treat the first segment as a webhook id and look up dynamic
//!    templates with the same number of remaining segments.
//! 4. Bind `:name` template segments to the request's remainder segments.

use std::collections::HashMap;

use testhook_types::webhook::{
    path_segments, trim_slashes, HttpMethod, RouteKey, WebhookDescriptor, PATH_PARAM_MARKER,
};

/// Read access to registered descriptors, keyed by route.
///
/// Candidates are returned oldest registration first.
pub trait RouteLookup {
    fn candidates(&self, key: &RouteKey) -> Vec<&WebhookDescriptor>;
}

/// A successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub descriptor: WebhookDescriptor,
    /// Path parameters keyed by marker-stripped name.
    pub params: HashMap<String, String>,
}

/// Match a request against registered descriptors.
pub fn find_route(
    lookup: &impl RouteLookup,
    method: HttpMethod,
    path: &str,
) -> Option<RouteMatch> {
    let path = trim_slashes(path);

    if let Some(descriptor) = lookup.candidates(&RouteKey::fixed(method, path)).last() {
        return Some(RouteMatch {
            descriptor: (*descriptor).clone(),
            params: HashMap::new(),
        });
    }

    let mut segments = path_segments(path);
    let webhook_id = segments.next()?;
    let remainder: Vec<&str> = segments.collect();
    if remainder.is_empty() {
        return None;
    }

    let key = RouteKey::dynamic(method, webhook_id, remainder.len());
    let descriptor = best_dynamic_candidate(lookup.candidates(&key), &remainder)?;
    let params = extract_params(&descriptor.path, &remainder);

    Some(RouteMatch {
        descriptor: descriptor.clone(),
        params,
    })
}

/// Pick the template whose static segments all line up with the request and
/// that has the most of them. Later registrations win ties.
fn best_dynamic_candidate<'a>(
    candidates: Vec<&'a WebhookDescriptor>,
    remainder: &[&str],
) -> Option<&'a WebhookDescriptor> {
    let mut best: Option<(usize, &WebhookDescriptor)> = None;

    for candidate in candidates {
        let mut static_count = 0;
        let mut fits = true;
        for (template, actual) in path_segments(&candidate.path).zip(remainder) {
            if template.starts_with(PATH_PARAM_MARKER) {
                continue;
            }
            if template != *actual {
                fits = false;
                break;
            }
            static_count += 1;
        }
        if !fits {
            continue;
        }
        match best {
            Some((count, _)) if count > static_count => {}
            _ => best = Some((static_count, candidate)),
        }
    }

    best.map(|(_, d)| d)
}

/// Bind template parameters to request segments, in template order.
pub fn extract_params(template: &str, remainder: &[&str]) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (segment, value) in path_segments(template).zip(remainder) {
        if let Some(name) = segment.strip_prefix(PATH_PARAM_MARKER) {
            params.insert(name.to_string(), (*value).to_string());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Default)]
    struct Table(HashMap<RouteKey, Vec<WebhookDescriptor>>);

    impl Table {
        fn add(&mut self, d: WebhookDescriptor) {
            self.0.entry(d.route_key()).or_default().push(d);
        }
    }

    impl RouteLookup for Table {
        fn candidates(&self, key: &RouteKey) -> Vec<&WebhookDescriptor> {
            self.0.get(key).map(|v| v.iter().collect()).unwrap_or_default()
        }
    }

    fn descriptor(method: HttpMethod, path: &str, webhook_id: Option<&str>) -> WebhookDescriptor {
        WebhookDescriptor {
            http_method: method,
            path: path.to_string(),
            webhook_id: webhook_id.map(str::to_string),
            workflow_id: Uuid::now_v7(),
            node_name: "Webhook".to_string(),
            allowed_origins: None,
        }
    }

    #[test]
    fn test_static_match() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Post, "orders/new", None));

        let m = find_route(&table, HttpMethod::Post, "orders/new").unwrap();
        assert_eq!(m.descriptor.path, "orders/new");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Get, "hook", None));

        assert!(find_route(&table, HttpMethod::Get, "/hook/").is_some());
        assert!(find_route(&table, HttpMethod::Get, "hook/").is_some());
    }

    #[test]
    fn test_method_must_match() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Get, "hook", None));

        assert!(find_route(&table, HttpMethod::Post, "hook").is_none());
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let table = Table::default();
        assert!(find_route(&table, HttpMethod::Get, "nothing/here").is_none());
        assert!(find_route(&table, HttpMethod::Get, "").is_none());
    }

    #[test]
    fn test_dynamic_match_extracts_params() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Get, ":a/:b", Some("W")));

        let m = find_route(&table, HttpMethod::Get, "/W/x/y").unwrap();
        assert_eq!(m.params.get("a").map(String::as_str), Some("x"));
        assert_eq!(m.params.get("b").map(String::as_str), Some("y"));
        assert_eq!(m.params.len(), 2);
    }

    #[test]
    fn test_dynamic_match_requires_same_segment_count() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Get, ":a/:b", Some("W")));

        assert!(find_route(&table, HttpMethod::Get, "W/x").is_none());
        assert!(find_route(&table, HttpMethod::Get, "W/x/y/z").is_none());
        assert!(find_route(&table, HttpMethod::Get, "W").is_none());
    }

    #[test]
    fn test_dynamic_prefers_most_static_segments() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Get, ":kind/:id", Some("W")));
        table.add(descriptor(HttpMethod::Get, "users/:id", Some("W")));

        let m = find_route(&table, HttpMethod::Get, "W/users/7").unwrap();
        assert_eq!(m.descriptor.path, "users/:id");
        assert_eq!(m.params.get("id").map(String::as_str), Some("7"));

        let m = find_route(&table, HttpMethod::Get, "W/teams/7").unwrap();
        assert_eq!(m.descriptor.path, ":kind/:id");
        assert_eq!(m.params.get("kind").map(String::as_str), Some("teams"));
    }

    #[test]
    fn test_dynamic_static_segment_mismatch_is_not_found() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Get, "users/:id", Some("W")));

        assert!(find_route(&table, HttpMethod::Get, "W/teams/7").is_none());
    }

    #[test]
    fn test_static_collision_latest_wins() {
        let mut table = Table::default();
        let first = descriptor(HttpMethod::Post, "hook", None);
        let second = descriptor(HttpMethod::Post, "hook", None);
        table.add(first);
        table.add(second.clone());

        let m = find_route(&table, HttpMethod::Post, "hook").unwrap();
        assert_eq!(m.descriptor.workflow_id, second.workflow_id);
    }

    #[test]
    fn test_static_match_takes_precedence_over_dynamic() {
        let mut table = Table::default();
        table.add(descriptor(HttpMethod::Get, "W/x", None));
        table.add(descriptor(HttpMethod::Get, ":a", Some("W")));

        let m = find_route(&table, HttpMethod::Get, "W/x").unwrap();
        assert!(m.params.is_empty());
        assert_eq!(m.descriptor.path, "W/x");
    }

    #[test]
    fn test_extract_params_duplicate_name_later_wins() {
        let params = extract_params(":id/:id", &["1", "2"]);
        assert_eq!(params.get("id").map(String::as_str), Some("2"));
    }
}
