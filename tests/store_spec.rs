use featureflags::db::Database;
use featureflags::models::*;
use featureflags::{Entity, FlagError, Stores};
use serde_json::json;
use speculate2::speculate;

fn strategy(name: &str, kind: &str, key: &str, value: &str) -> Strategy {
    Strategy {
        name: name.to_string(),
        description: format!("{} strategy", name),
        kind: StrategyType::from(kind),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn seed(stores: &Stores) {
    stores
        .strategies
        .define(strategy("prod-only", "exact-match", "env", "prod"))
        .expect("Failed to define strategy");
    stores
        .strategies
        .define(strategy("beta-users", "regex-match", "user", "^beta-.*"))
        .expect("Failed to define strategy");
    stores
        .groups
        .define(
            Group::new("beta").with_strategy("beta-users").enabled(true),
            &stores.strategies,
        )
        .expect("Failed to define group");
    stores
        .groups
        .define(Group::new("staff").enabled(true), &stores.strategies)
        .expect("Failed to define group");
}

speculate! {
    before {
        let stores = Stores::in_memory().expect("Failed to open stores");
    }

    describe "strategy registry" {
        it "resolves what it defined" {
            let defined = strategy("prod-only", "exact-match", "env", "prod");
            stores.strategies.define(defined.clone()).expect("Failed to define");

            let resolved = stores.strategies.resolve("prod-only").expect("Failed to resolve");
            assert_eq!(resolved, defined);
        }

        it "rejects duplicate names" {
            stores.strategies.define(strategy("s", "exact-match", "k", "v")).unwrap();
            let err = stores.strategies.define(strategy("s", "regex-match", "k", "v")).unwrap_err();
            assert!(matches!(err, FlagError::DuplicateName { entity: Entity::Strategy, .. }));
        }

        it "rejects unsupported types" {
            let err = stores.strategies.define(strategy("s", "percentage", "k", "10")).unwrap_err();
            assert!(matches!(err, FlagError::UnsupportedStrategyType(t) if t == "percentage"));
            assert!(stores.strategies.is_empty());
        }

        it "rejects empty keys and values" {
            let err = stores.strategies.define(strategy("s", "exact-match", " ", "v")).unwrap_err();
            assert!(matches!(err, FlagError::InvalidDefinition { .. }));
            let err = stores.strategies.define(strategy("s", "exact-match", "k", "")).unwrap_err();
            assert!(matches!(err, FlagError::InvalidDefinition { .. }));
        }

        it "rejects patterns that do not compile" {
            let err = stores.strategies.define(strategy("s", "regex-match", "k", "[a-")).unwrap_err();
            assert_eq!(err.status_code(), 400);
        }

        it "updates under the given name" {
            stores.strategies.define(strategy("s", "exact-match", "env", "prod")).unwrap();

            let updated = stores
                .strategies
                .update("s", strategy("renamed", "regex-match", "env", "^pro"))
                .expect("Failed to update");

            assert_eq!(updated.name, "s");
            assert_eq!(stores.strategies.resolve("s").unwrap().kind, StrategyType::RegexMatch);
            assert!(stores.strategies.resolve("renamed").unwrap_err().is_not_found());
        }

        it "fails to update a missing strategy" {
            let err = stores
                .strategies
                .update("ghost", strategy("ghost", "exact-match", "k", "v"))
                .unwrap_err();
            assert!(err.is_not_found());
        }

        it "reports a missing strategy before a bad body" {
            let err = stores
                .strategies
                .update("ghost", strategy("ghost", "regex-match", "k", "(unclosed"))
                .unwrap_err();
            assert!(err.is_not_found());

            let err = stores
                .strategies
                .update("ghost", strategy("ghost", "percentage", "k", "10"))
                .unwrap_err();
            assert!(err.is_not_found());
        }

        it "removes and then no longer resolves" {
            stores.strategies.define(strategy("s", "exact-match", "k", "v")).unwrap();
            stores.strategies.remove("s", &stores.groups, &stores.features).expect("Failed to remove");

            assert!(stores.strategies.resolve("s").unwrap_err().is_not_found());
            let err = stores.strategies.remove("s", &stores.groups, &stores.features).unwrap_err();
            assert!(err.is_not_found());
        }

        it "refuses to remove a strategy still in use" {
            seed(&stores);
            stores
                .features
                .define(Feature::new("f").with_strategy("prod-only"), &stores.strategies, &stores.groups)
                .unwrap();

            let err = stores.strategies.remove("prod-only", &stores.groups, &stores.features).unwrap_err();
            assert!(matches!(err, FlagError::InUse { entity: Entity::Strategy, .. }));
            assert_eq!(err.status_code(), 409);

            let err = stores.strategies.remove("beta-users", &stores.groups, &stores.features).unwrap_err();
            assert!(err.to_string().contains("group 'beta'"));
        }

        it "lists in name order and can be listed again" {
            stores.strategies.define(strategy("b", "exact-match", "k", "v")).unwrap();
            stores.strategies.define(strategy("a", "exact-match", "k", "v")).unwrap();

            let first: Vec<_> = stores.strategies.list().map(|s| s.name).collect();
            let second: Vec<_> = stores.strategies.list().map(|s| s.name).collect();
            assert_eq!(first, vec!["a", "b"]);
            assert_eq!(first, second);
        }
    }

    describe "group store" {
        it "rejects an unknown strategy reference" {
            seed(&stores);
            let err = stores
                .groups
                .define(Group::new("g").with_strategy("nope"), &stores.strategies)
                .unwrap_err();
            assert!(matches!(
                err,
                FlagError::UnknownReference { target: Entity::Strategy, .. }
            ));
            assert!(!stores.groups.contains("g"));
        }

        it "rejects an empty name" {
            seed(&stores);
            let err = stores.groups.define(Group::new(""), &stores.strategies).unwrap_err();
            assert!(matches!(err, FlagError::InvalidDefinition { entity: Entity::Group, .. }));
        }

        it "updates properties and strategy" {
            seed(&stores);
            let updated = stores
                .groups
                .update(
                    "staff",
                    Group::new("staff").with_strategy("prod-only").with_property("env", json!("prod")),
                    &stores.strategies,
                )
                .expect("Failed to update");

            assert_eq!(updated.strategy.as_deref(), Some("prod-only"));
            assert!(!stores.groups.resolve("staff").unwrap().enabled);
        }

        it "reports a missing group before a bad strategy reference" {
            seed(&stores);
            let err = stores
                .groups
                .update("ghost", Group::new("ghost").with_strategy("nowhere"), &stores.strategies)
                .unwrap_err();
            assert!(err.is_not_found());
        }

        it "refuses to remove a group a feature lists" {
            seed(&stores);
            stores
                .features
                .define(Feature::new("f").with_group("staff"), &stores.strategies, &stores.groups)
                .unwrap();

            let err = stores.groups.remove("staff", &stores.features).unwrap_err();
            assert!(matches!(err, FlagError::InUse { entity: Entity::Group, .. }));

            stores.features.remove("f").unwrap();
            stores.groups.remove("staff", &stores.features).expect("Failed to remove");
            assert!(!stores.groups.contains("staff"));
        }

        it "projects groups by strategy" {
            seed(&stores);
            let names: Vec<_> = stores.groups.by_strategy("beta-users").map(|g| g.name).collect();
            assert_eq!(names, vec!["beta"]);
            assert_eq!(stores.groups.by_strategy("prod-only").count(), 0);
        }

        describe "is_enabled_for" {
            it "is false when the group is disabled" {
                seed(&stores);
                let group = Group::new("off").enabled(false);
                let ctx = EvalContext::new();
                assert!(!stores.groups.is_enabled_for(&group, &ctx, &stores.strategies).unwrap());
            }

            it "is true for an enabled group without strategy" {
                seed(&stores);
                let group = stores.groups.resolve("staff").unwrap();
                let ctx = EvalContext::new();
                assert!(stores.groups.is_enabled_for(&group, &ctx, &stores.strategies).unwrap());
            }

            it "follows the group's strategy" {
                seed(&stores);
                let group = stores.groups.resolve("beta").unwrap();
                let yes = EvalContext::new().with("user", "beta-user42");
                let no = EvalContext::new().with("user", "prod-user1");
                assert!(stores.groups.is_enabled_for(&group, &yes, &stores.strategies).unwrap());
                assert!(!stores.groups.is_enabled_for(&group, &no, &stores.strategies).unwrap());
            }

            it "uses group properties as context defaults" {
                seed(&stores);
                let group = Group::new("eu-prod")
                    .with_strategy("prod-only")
                    .enabled(true)
                    .with_property("env", json!("prod"));

                assert!(stores.groups.is_enabled_for(&group, &EvalContext::new(), &stores.strategies).unwrap());

                let overridden = EvalContext::new().with("env", "dev");
                assert!(!stores.groups.is_enabled_for(&group, &overridden, &stores.strategies).unwrap());
            }

            it "treats a missing strategy as unsatisfied" {
                seed(&stores);
                let group = Group::new("dangling").with_strategy("gone").enabled(true);
                assert!(!stores.groups.is_enabled_for(&group, &EvalContext::new(), &stores.strategies).unwrap());
            }
        }
    }

    describe "feature store" {
        it "rejects a nonexistent group" {
            seed(&stores);
            let err = stores
                .features
                .define(Feature::new("f").with_group("staff").with_group("ghosts"), &stores.strategies, &stores.groups)
                .unwrap_err();
            match err {
                FlagError::UnknownReference { entity, target, reference, .. } => {
                    assert_eq!(entity, Entity::Feature);
                    assert_eq!(target, Entity::Group);
                    assert_eq!(reference, "ghosts");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(stores.features.is_empty());
        }

        it "rejects a nonexistent strategy" {
            seed(&stores);
            let err = stores
                .features
                .define(Feature::new("f").with_strategy("ghost"), &stores.strategies, &stores.groups)
                .unwrap_err();
            assert!(matches!(err, FlagError::UnknownReference { target: Entity::Strategy, .. }));
        }

        it "rejects duplicate names" {
            seed(&stores);
            stores.features.define(Feature::new("f"), &stores.strategies, &stores.groups).unwrap();
            let err = stores.features.define(Feature::new("f"), &stores.strategies, &stores.groups).unwrap_err();
            assert!(matches!(err, FlagError::DuplicateName { entity: Entity::Feature, .. }));
        }

        it "updates memberships and validates them" {
            seed(&stores);
            stores
                .features
                .define(Feature::new("f").with_group("beta"), &stores.strategies, &stores.groups)
                .unwrap();

            let updated = stores
                .features
                .update("f", Feature::new("f").with_group("staff").enabled(true), &stores.strategies, &stores.groups)
                .unwrap();
            assert!(updated.in_group("staff"));
            assert!(!updated.in_group("beta"));

            let err = stores
                .features
                .update("f", Feature::new("f").with_group("ghosts"), &stores.strategies, &stores.groups)
                .unwrap_err();
            assert!(matches!(err, FlagError::UnknownReference { .. }));
            assert!(stores.features.resolve("f").unwrap().in_group("staff"));
        }

        it "reports a missing feature before bad references" {
            seed(&stores);
            let err = stores
                .features
                .update(
                    "ghost",
                    Feature::new("ghost").with_strategy("nowhere").with_group("ghosts"),
                    &stores.strategies,
                    &stores.groups,
                )
                .unwrap_err();
            assert!(err.is_not_found());
        }

        it "toggles the master switch" {
            seed(&stores);
            stores
                .features
                .define(Feature::new("f").with_strategy("prod-only"), &stores.strategies, &stores.groups)
                .unwrap();

            let enabled = stores.features.set_enabled("f", true).unwrap();
            assert!(enabled.enabled);
            assert_eq!(enabled.strategy.as_deref(), Some("prod-only"));

            assert!(stores.features.set_enabled("ghost", true).unwrap_err().is_not_found());
        }

        it "projects by strategy and by group" {
            seed(&stores);
            stores.features.define(Feature::new("a").with_strategy("prod-only"), &stores.strategies, &stores.groups).unwrap();
            stores.features.define(Feature::new("b").with_group("beta"), &stores.strategies, &stores.groups).unwrap();
            stores.features.define(Feature::new("c").with_group("beta").with_group("staff"), &stores.strategies, &stores.groups).unwrap();

            let by_strategy: Vec<_> = stores.features.by_strategy("prod-only").map(|f| f.name).collect();
            let by_group: Vec<_> = stores.features.by_group("beta").map(|f| f.name).collect();
            assert_eq!(by_strategy, vec!["a"]);
            assert_eq!(by_group, vec!["b", "c"]);
        }

        it "lists features in the envelope" {
            seed(&stores);
            stores.features.define(Feature::new("f").enabled(true), &stores.strategies, &stores.groups).unwrap();

            let listing = Listing::new(ResourceKind::Features, stores.features.list());
            let json = serde_json::to_value(&listing).unwrap();
            assert_eq!(json["apiVersion"], 1);
            assert_eq!(json["kind"], "features");
            assert_eq!(json["items"][0]["name"], "f");
        }
    }

    describe "persistence" {
        it "reloads every store from the same database file" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("flags.db");

            {
                let stores = Stores::open(Database::open(path.clone()).unwrap()).unwrap();
                seed(&stores);
                stores
                    .features
                    .define(
                        Feature::new("checkout").with_group("beta").enabled(true).with_property("owner", json!("payments")),
                        &stores.strategies,
                        &stores.groups,
                    )
                    .unwrap();
            }

            let reopened = Stores::open(Database::open(path).unwrap()).unwrap();
            assert_eq!(reopened.strategies.len(), 2);
            assert_eq!(reopened.groups.len(), 2);

            let feature = reopened.features.resolve("checkout").unwrap();
            assert!(feature.in_group("beta"));
            assert_eq!(feature.properties["owner"], json!("payments"));
        }
    }
}
