use super::*;
use crate::error::ConfigurationError;
use std::sync::Arc;

fn provider() -> Arc<SumType> {
    SumType::builder("solo.apps.accounts.AuthProvider")
        .variant("GITHUB", "github")
        .variant("FACEBOOK", "facebook")
        .contract(["auth_provider_impl"])
        .build()
        .unwrap()
}

#[derive(Debug, PartialEq)]
struct Token(String);

#[test]
fn test_match_literal_values() {
    let sum = provider();
    assert_eq!(sum.match_value("github").unwrap().name(), "GITHUB");
    assert_eq!(sum.match_value("facebook").unwrap().name(), "FACEBOOK");
}

#[test]
fn test_mismatch_lists_known_values() {
    let sum = provider();
    let err = sum.match_value("twitter").unwrap_err();
    assert!(err.is_mismatch());
    let msg = err.to_string();
    assert!(msg.contains("\"twitter\""));
    assert!(msg.contains("\"github\" => GITHUB"));
    assert!(msg.contains("\"facebook\" => FACEBOOK"));
}

#[test]
fn test_strict_primitive_equality() {
    let sum = SumType::builder("demo.Level")
        .variant("ONE", 1)
        .variant("ON", true)
        .variant("HALF", 0.5)
        .build()
        .unwrap();
    assert_eq!(sum.match_value(1).unwrap().name(), "ONE");
    assert_eq!(sum.match_value(true).unwrap().name(), "ON");
    assert_eq!(sum.match_value(0.5).unwrap().name(), "HALF");
    assert!(sum.match_value("1").is_err());
    assert!(sum.match_value(false).is_err());
}

#[test]
fn test_match_segment_uses_text_form() {
    let sum = SumType::builder("demo.Page")
        .variant("FIRST", 1)
        .variant("LAST", "last")
        .build()
        .unwrap();
    assert_eq!(sum.match_segment("1").unwrap().name(), "FIRST");
    assert_eq!(sum.match_segment("last").unwrap().name(), "LAST");
    assert!(sum.match_segment("2").unwrap_err().is_mismatch());
}

#[test]
fn test_float_segments_keep_fraction() {
    let sum = SumType::builder("demo.Ratio")
        .variant("ONE", 1)
        .variant("WHOLE", 1.0)
        .variant("HALF", 0.5)
        .build()
        .unwrap();
    assert_eq!(sum.match_segment("1").unwrap().name(), "ONE");
    assert_eq!(sum.match_segment("1.0").unwrap().name(), "WHOLE");
    assert_eq!(sum.match_segment("0.5").unwrap().name(), "HALF");
    assert_eq!(
        sum.literal_texts(),
        vec!["1".to_string(), "1.0".to_string(), "0.5".to_string()]
    );
}

#[test]
fn test_unit_variant_uses_lowercase_name() {
    let sum = SumType::builder("demo.Color").unit("RED").unit("DARK_BLUE").build().unwrap();
    assert_eq!(sum.match_value("red").unwrap().name(), "RED");
    assert_eq!(sum.match_value("dark_blue").unwrap().name(), "DARK_BLUE");
}

#[test]
fn test_payload_variant_matches_by_type() {
    let sum = SumType::builder("demo.Credential")
        .unit("ANONYMOUS")
        .carrying::<Token>("TOKEN")
        .build()
        .unwrap();
    let token = sum.variant("TOKEN").unwrap();
    let instance = token.instance(Token("abc".into())).unwrap();
    assert_eq!(sum.match_value(&instance).unwrap().name(), "TOKEN");
    assert_eq!(instance.data::<Token>(), Some(&Token("abc".into())));

    let raw = Token("xyz".into());
    assert_eq!(sum.match_value(Scrutinee::object(&raw)).unwrap().name(), "TOKEN");
    assert!(sum.match_value(Scrutinee::object(&42u8)).is_err());

    let wrong = token.instance(7u32).unwrap_err();
    assert!(matches!(wrong, SumError::PayloadType { .. }));
    assert!(sum.variant("ANONYMOUS").unwrap().instance(Token("a".into())).is_err());
}

#[test]
fn test_first_declared_variant_wins_on_type_tags() {
    let sum = SumType::builder("demo.Twice")
        .carrying::<Token>("PRIMARY")
        .carrying::<Token>("SECONDARY")
        .build()
        .unwrap();
    let raw = Token("t".into());
    assert_eq!(sum.match_value(Scrutinee::object(&raw)).unwrap().name(), "PRIMARY");
}

#[test]
fn test_builder_rejects_invalid_declarations() {
    assert!(SumType::builder("demo.Bad").variant("lower", "x").build().is_err());
    assert!(SumType::builder("demo.Bad").variant("_X", "x").build().is_err());
    assert!(SumType::builder("demo.Bad").build().is_err());
    assert!(SumType::builder("not a path").unit("A").build().is_err());
    assert!(SumType::builder("demo.Bad")
        .variant("A", "x")
        .variant("B", "x")
        .build()
        .is_err());
    assert!(SumType::builder("demo.Bad").unit("A").unit("A").build().is_err());
    assert!(SumType::builder("demo.Bad")
        .unit("A")
        .contract(["term", "term"])
        .build()
        .is_err());
}

#[test]
fn test_inline_match_dispatches() {
    let sum = provider();
    let matcher = sum
        .inline_match([("GITHUB", "gh"), ("FACEBOOK", "fb")])
        .unwrap();
    assert_eq!(*matcher.resolve("github").unwrap(), "gh");
    assert_eq!(*matcher.resolve("facebook").unwrap(), "fb");
    assert!(matcher.resolve("twitter").unwrap_err().is_mismatch());

    let facebook = sum.variant("FACEBOOK").unwrap();
    assert_eq!(matcher.arm(facebook), Some(&"fb"));
}

#[test]
fn test_inline_match_requires_exhaustive_cases() {
    let sum = provider();
    let err = sum.inline_match([("GITHUB", 1)]).err().unwrap();
    match err {
        SumError::Pattern {
            fault: PatternFault::NonExhaustive(missing),
            ..
        } => assert_eq!(missing, vec!["FACEBOOK".to_string()]),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_inline_match_rejects_unknown_and_duplicate_cases() {
    let sum = provider();
    let err = sum
        .inline_match([("GITHUB", 1), ("FACEBOOK", 2), ("TWITTER", 3)])
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SumError::Pattern {
            fault: PatternFault::UnknownVariant(_),
            ..
        }
    ));

    let err = sum
        .inline_match([("GITHUB", 1), ("GITHUB", 2), ("FACEBOOK", 3)])
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SumError::Pattern {
            fault: PatternFault::DuplicateCase(_),
            ..
        }
    ));
}

#[test]
fn test_registry_binding_is_idempotent() {
    let mut registry = SumTypeRegistry::new();
    registry.declare(provider()).unwrap();
    let path = "solo.apps.accounts.AuthProvider";

    let binding = ContractBinding::new(
        path,
        "GITHUB",
        "auth_provider_impl",
        Implementation::new("github_impl", 1u8),
    );
    registry.bind(binding.clone()).unwrap();
    registry.bind(binding).unwrap();

    let conflicting = ContractBinding::new(
        path,
        "GITHUB",
        "auth_provider_impl",
        Implementation::new("other_impl", 2u8),
    );
    assert!(matches!(
        registry.bind(conflicting),
        Err(ConfigurationError::ConflictingBinding { .. })
    ));
}

#[test]
fn test_registry_consistency_names_missing_term() {
    let mut registry = SumTypeRegistry::new();
    let sum = provider();
    registry.declare(Arc::clone(&sum)).unwrap();
    registry
        .bind(ContractBinding::new(
            sum.path(),
            "GITHUB",
            "auth_provider_impl",
            Implementation::new("gh", "github"),
        ))
        .unwrap();

    match registry.check_consistency() {
        Err(ConfigurationError::UnboundContractTerm { variant, term, .. }) => {
            assert_eq!(variant, "FACEBOOK");
            assert_eq!(term, "auth_provider_impl");
        }
        other => panic!("unexpected result {other:?}"),
    }

    registry
        .bind(ContractBinding::new(
            sum.path(),
            "FACEBOOK",
            "auth_provider_impl",
            Implementation::new("fb", "facebook"),
        ))
        .unwrap();
    registry.check_consistency().unwrap();

    let github = sum.variant("GITHUB").unwrap();
    assert_eq!(
        registry.implementation_as::<&str>(github, "auth_provider_impl"),
        Some(&"github")
    );
}

#[test]
fn test_registry_consistency_ignores_binding_order() {
    let sum = SumType::builder("demo.Transport")
        .variant("CAR", "car")
        .variant("TRAIN", "train")
        .variant("PLANE", "plane")
        .contract(["speed", "label"])
        .build()
        .unwrap();
    let mut registry = SumTypeRegistry::new();
    registry.declare(Arc::clone(&sum)).unwrap();

    // reverse declaration order, label before speed
    let mut pairs = Vec::new();
    for variant in ["PLANE", "TRAIN", "CAR"] {
        for term in ["label", "speed"] {
            pairs.push((variant, term));
        }
    }
    let (last, rest) = pairs.split_last().unwrap();
    for (variant, term) in rest {
        registry
            .bind(ContractBinding::new(
                sum.path(),
                *variant,
                *term,
                Implementation::new(format!("{variant}.{term}"), 0u32),
            ))
            .unwrap();
    }

    match registry.check_consistency() {
        Err(ConfigurationError::UnboundContractTerm { variant, term, .. }) => {
            assert_eq!((variant.as_str(), term.as_str()), *last);
        }
        other => panic!("unexpected result {other:?}"),
    }

    let (variant, term) = *last;
    registry
        .bind(ContractBinding::new(
            sum.path(),
            variant,
            term,
            Implementation::new(format!("{variant}.{term}"), 0u32),
        ))
        .unwrap();
    registry.check_consistency().unwrap();
}

#[test]
fn test_registry_rejects_unknown_targets() {
    let mut registry = SumTypeRegistry::new();
    registry.declare(provider()).unwrap();
    let imp = || Implementation::new("x", ());
    assert!(matches!(
        registry.bind(ContractBinding::new("nope.Type", "GITHUB", "auth_provider_impl", imp())),
        Err(ConfigurationError::UnknownSumType(_))
    ));
    assert!(matches!(
        registry.bind(ContractBinding::new(
            "solo.apps.accounts.AuthProvider",
            "TWITTER",
            "auth_provider_impl",
            imp()
        )),
        Err(ConfigurationError::UnknownVariant { .. })
    ));
    assert!(matches!(
        registry.bind(ContractBinding::new(
            "solo.apps.accounts.AuthProvider",
            "GITHUB",
            "nope",
            imp()
        )),
        Err(ConfigurationError::UnknownContractTerm { .. })
    ));
}

#[test]
fn test_redeclaring_same_type_is_noop() {
    let mut registry = SumTypeRegistry::new();
    let sum = provider();
    registry.declare(Arc::clone(&sum)).unwrap();
    registry.declare(Arc::clone(&sum)).unwrap();
    assert_eq!(registry.types().len(), 1);
    assert!(matches!(
        registry.declare(provider()),
        Err(ConfigurationError::DuplicateSumType(_))
    ));
}
