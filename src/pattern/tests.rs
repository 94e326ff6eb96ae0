use super::*;
use crate::error::{ConfigurationError, PatternError, UrlError};
use crate::sum::{SumType, SumTypeRegistry};
use regex::Regex;

fn sums() -> SumTypeRegistry {
    let mut registry = SumTypeRegistry::new();
    registry
        .declare(
            SumType::builder("solo.apps.accounts.AuthProvider")
                .variant("GITHUB", "github")
                .variant("FACEBOOK", "facebook")
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

#[test]
fn test_prefix_join_normalizes_slashes() {
    assert_eq!(join_prefix("", ""), "/");
    assert_eq!(join_prefix("/", "/"), "/");
    assert_eq!(join_prefix("/api/", "/users"), "/api/users");
    assert_eq!(join_prefix("/api", "users"), "/api/users");
    assert_eq!(join_prefix("", "/hello"), "/hello");
}

#[test]
fn test_plain_placeholder() {
    let compiled = compile("/users/{id}", "", &sums()).unwrap();
    assert_eq!(compiled.pattern(), "/users/{id}");
    assert!(compiled.rules().is_empty());
    assert_eq!(compiled.placeholders().collect::<Vec<_>>(), vec!["id"]);
    assert_eq!(render_runtime_pattern(&compiled), "^/users/(?P<id>[^/]+)$");
}

#[test]
fn test_regex_rule_with_nested_braces() {
    let compiled = compile("/items/{id:\\d{1,3}}/raw", "", &sums()).unwrap();
    assert_eq!(compiled.pattern(), "/items/{id}/raw");
    let re = Regex::new(&render_runtime_pattern(&compiled)).unwrap();
    assert_eq!(&re.captures("/items/123/raw").unwrap()["id"], "123");
    assert!(!re.is_match("/items/1234/raw"));
}

#[test]
fn test_sum_type_rule_renders_alternation() {
    let compiled = compile(
        "/login/{provider:<solo.apps.accounts.AuthProvider>}",
        "",
        &sums(),
    )
    .unwrap();
    assert!(matches!(compiled.rule("provider"), Some(Rule::SumType(_))));
    assert_eq!(
        render_runtime_pattern(&compiled),
        "^/login/(?P<provider>(?:github|facebook))$"
    );
    let re = Regex::new(&render_runtime_pattern(&compiled)).unwrap();
    assert!(re.is_match("/login/github"));
    assert!(!re.is_match("/login/twitter"));
}

#[test]
fn test_unterminated_brace_reports_fragment() {
    let err = compile("/users/{id", "", &sums()).unwrap_err();
    match err {
        ConfigurationError::Pattern(PatternError::UnexpectedEnd { fragment }) => {
            assert_eq!(fragment, "{id");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err_message("/users/{id:\\d{2}").starts_with("Unexpected end of a route definition"));
}

fn err_message(pattern: &str) -> String {
    compile(pattern, "", &sums()).unwrap_err().to_string()
}

#[test]
fn test_stray_close_and_bad_names_are_rejected() {
    assert!(matches!(
        compile("/users/id}", "", &sums()),
        Err(ConfigurationError::Pattern(PatternError::UnbalancedClose { .. }))
    ));
    assert!(matches!(
        compile("/users/{1id}", "", &sums()),
        Err(ConfigurationError::Pattern(PatternError::InvalidName { .. }))
    ));
    assert!(matches!(
        compile("/users/{}", "", &sums()),
        Err(ConfigurationError::Pattern(PatternError::InvalidName { .. }))
    ));
    assert!(matches!(
        compile("/{id}/{id}", "", &sums()),
        Err(ConfigurationError::Pattern(PatternError::DuplicateName { .. }))
    ));
}

#[test]
fn test_unknown_sum_type_and_bad_regex() {
    assert!(matches!(
        compile("/login/{p:<solo.Missing>}", "", &sums()),
        Err(ConfigurationError::UnresolvedSumType { .. })
    ));
    assert!(matches!(
        compile("/x/{p:(}", "", &sums()),
        Err(ConfigurationError::InvalidRule { .. })
    ));
}

#[test]
fn test_prefix_is_part_of_pattern() {
    let compiled = compile("/{name}", "/hello/", &sums()).unwrap();
    assert_eq!(compiled.pattern(), "/hello/{name}");
    assert_eq!(
        compiled.segments(),
        &[
            Segment::Literal("/hello/".to_string()),
            Segment::Placeholder("name".to_string())
        ]
    );
}

#[test]
fn test_literal_text_is_escaped() {
    let compiled = compile("/files/report.v1+{ext}", "", &sums()).unwrap();
    let re = Regex::new(&render_runtime_pattern(&compiled)).unwrap();
    assert!(re.is_match("/files/report.v1+pdf"));
    assert!(!re.is_match("/files/reportXv1+pdf"));
}

#[test]
fn test_round_trip_recovers_substituted_values() {
    let compiled = compile(
        "/orgs/{org:[a-z]+}/login/{provider:<solo.apps.accounts.AuthProvider>}/{rest}",
        "/api",
        &sums(),
    )
    .unwrap();
    let re = Regex::new(&render_runtime_pattern(&compiled)).unwrap();
    for (org, provider, rest) in [("acme", "github", "x"), ("z", "facebook", "a-b.c")] {
        let url = compiled
            .expand(&[("org", org), ("provider", provider), ("rest", rest)])
            .unwrap();
        let caps = re.captures(&url).unwrap();
        assert_eq!(&caps["org"], org);
        assert_eq!(&caps["provider"], provider);
        assert_eq!(&caps["rest"], rest);
    }
}

#[test]
fn test_expand_validates_rules() {
    let compiled = compile(
        "/login/{provider:<solo.apps.accounts.AuthProvider>}",
        "",
        &sums(),
    )
    .unwrap();
    assert_eq!(
        compiled.expand(&[("provider", "github")]).unwrap(),
        "/login/github"
    );
    assert_eq!(
        compiled.expand(&[("provider", "twitter")]),
        Err(UrlError::RuleViolation {
            segment: "provider".to_string(),
            value: "twitter".to_string()
        })
    );
    assert_eq!(
        compiled.expand(&[]),
        Err(UrlError::MissingParam("provider".to_string()))
    );
}
